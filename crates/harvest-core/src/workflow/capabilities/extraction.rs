//! Extraction (schema-guided content extraction) capability client.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::ServiceClient;
use crate::workflow::capability::{Capability, StepError, StepOutput};
use crate::workflow::schema::CapabilityKind;

/// Calls `POST {base}/extract`; output is an object keyed by the schema's
/// field names.
#[derive(Debug, Clone)]
pub struct ExtractionClient {
    service: ServiceClient,
}

enum Source {
    Url(String),
    Document(String),
}

struct ExtractionRequest {
    source: Source,
    schema: Map<String, Value>,
}

impl ExtractionClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            service: ServiceClient::new("Extraction", base_url),
        }
    }
}

fn non_empty_str(input: &Value, key: &str) -> Result<Option<String>, StepError> {
    match input.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if !s.trim().is_empty() => Ok(Some(s.clone())),
        Some(_) => Err(StepError::invalid_input(format!(
            "'{}' must be a non-empty string",
            key
        ))),
    }
}

impl ExtractionRequest {
    fn parse(input: &Value) -> Result<Self, StepError> {
        let url = non_empty_str(input, "url")?;
        let document = non_empty_str(input, "document")?;

        let source = match (url, document) {
            (Some(url), None) => Source::Url(url),
            (None, Some(doc)) => Source::Document(doc),
            (Some(_), Some(_)) => {
                return Err(StepError::invalid_input(
                    "extraction takes either 'url' or 'document', not both",
                ))
            }
            (None, None) => {
                return Err(StepError::invalid_input(
                    "extraction requires a 'url' or a 'document'",
                ))
            }
        };

        let schema = input
            .get("schema")
            .and_then(Value::as_object)
            .cloned()
            .ok_or_else(|| StepError::invalid_input("extraction requires a 'schema' object"))?;

        Ok(Self { source, schema })
    }

    /// `schema.properties` keys when present, otherwise the schema's own keys.
    fn field_names(&self) -> Vec<String> {
        match self.schema.get("properties").and_then(Value::as_object) {
            Some(props) => props.keys().cloned().collect(),
            None => self.schema.keys().cloned().collect(),
        }
    }

    fn body(&self) -> Value {
        let mut body = json!({ "schema": self.schema });
        match &self.source {
            Source::Url(url) => body["url"] = Value::String(url.clone()),
            Source::Document(doc) => body["document"] = Value::String(doc.clone()),
        }
        body
    }
}

fn normalise(request: &ExtractionRequest, data: Value) -> Result<Value, StepError> {
    let Value::Object(mut fields) = data else {
        return Err(StepError::upstream("extraction payload is not an object"));
    };

    let mut out = Map::new();
    for name in request.field_names() {
        let value = fields.remove(&name).unwrap_or(Value::Null);
        out.insert(name, value);
    }
    Ok(Value::Object(out))
}

#[async_trait]
impl Capability for ExtractionClient {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Extraction
    }

    async fn invoke(&self, input: Value) -> Result<StepOutput, StepError> {
        let request = ExtractionRequest::parse(&input)?;
        let data = self.service.post_json("/extract", &request.body()).await?;
        normalise(&request, data).map(StepOutput)
    }

    async fn health_check(&self) -> Result<(), StepError> {
        self.service.health().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::capability::StepErrorCode;

    #[test]
    fn requires_exactly_one_source() {
        let schema = json!({ "title": {} });
        for input in [
            json!({ "schema": schema }),
            json!({ "url": "https://a", "document": "<p/>", "schema": schema }),
            json!({ "url": "", "schema": schema }),
            json!({ "url": "https://a", "schema": "title" }),
        ] {
            assert_eq!(
                ExtractionRequest::parse(&input).err().map(|e| e.code),
                Some(StepErrorCode::InvalidInput),
                "input: {}",
                input
            );
        }
    }

    #[test]
    fn field_names_prefer_properties() {
        let req = ExtractionRequest::parse(&json!({
            "document": "<p>hi</p>",
            "schema": { "type": "object", "properties": { "price": {}, "title": {} } }
        }))
        .unwrap();
        assert_eq!(req.field_names(), vec!["price", "title"]);

        let req = ExtractionRequest::parse(&json!({
            "document": "<p>hi</p>",
            "schema": { "title": "string" }
        }))
        .unwrap();
        assert_eq!(req.field_names(), vec!["title"]);
    }

    #[tokio::test]
    async fn invoke_keeps_only_schema_fields() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/extract")
            .match_body(mockito::Matcher::PartialJson(json!({ "url": "https://shop.example/p/1" })))
            .with_body(
                json!({
                    "success": true,
                    "data": { "title": "Keyboard", "extra": "dropped" }
                })
                .to_string(),
            )
            .create_async()
            .await;

        let client = ExtractionClient::new(&server.url());
        let out = client
            .invoke(json!({
                "url": "https://shop.example/p/1",
                "schema": { "properties": { "title": {}, "price": {} } }
            }))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(out, json!({ "title": "Keyboard", "price": null }));
    }

    #[tokio::test]
    async fn non_object_payload_is_upstream_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/extract")
            .with_body(r#"{"success": true, "data": "plain text"}"#)
            .create_async()
            .await;

        let client = ExtractionClient::new(&server.url());
        let err = client
            .invoke(json!({ "document": "<p/>", "schema": { "title": {} } }))
            .await
            .unwrap_err();
        assert_eq!(err.code, StepErrorCode::UpstreamError);
    }
}
