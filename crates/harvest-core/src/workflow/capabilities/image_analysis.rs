//! Image-analysis (vision model) capability client.

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::{result_list, string_field, ServiceClient};
use crate::workflow::capability::{Capability, StepError, StepOutput};
use crate::workflow::schema::CapabilityKind;

/// Calls `POST {base}/analyze`; output is one `{image, description?, answer?}`
/// entry per image.
#[derive(Debug, Clone)]
pub struct ImageAnalysisClient {
    service: ServiceClient,
}

#[derive(Debug, PartialEq)]
struct AnalysisRequest {
    images: Vec<String>,
    prompt: String,
}

impl ImageAnalysisClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            service: ServiceClient::new("Vision", base_url),
        }
    }
}

impl AnalysisRequest {
    fn parse(input: &Value) -> Result<Self, StepError> {
        let images: Vec<String> = match (input.get("images"), input.get("image")) {
            (Some(Value::Array(items)), _) => items
                .iter()
                .map(|i| {
                    i.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| StepError::invalid_input("'images' must be a list of strings"))
                })
                .collect::<Result<_, _>>()?,
            (None, Some(Value::String(single))) => vec![single.clone()],
            (Some(_), _) => return Err(StepError::invalid_input("'images' must be a list of strings")),
            _ => Vec::new(),
        };

        if images.is_empty() || images.iter().any(|i| i.trim().is_empty()) {
            return Err(StepError::invalid_input(
                "image analysis requires at least one non-empty image reference",
            ));
        }

        let prompt = input
            .get("prompt")
            .and_then(Value::as_str)
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| StepError::invalid_input("image analysis requires a 'prompt'"))?
            .to_string();

        Ok(Self { images, prompt })
    }
}

fn normalise(request: &AnalysisRequest, data: Value) -> Result<Value, StepError> {
    let items = match data {
        single @ Value::Object(_) if single.get("results").is_none() => vec![single],
        other => result_list(other)
            .ok_or_else(|| StepError::upstream("image analysis payload is not a result list"))?,
    };

    let entries = items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            let mut entry = Map::new();
            let image = string_field(item, "image")
                .or_else(|| request.images.get(i).cloned())
                .unwrap_or_default();
            entry.insert("image".into(), Value::String(image));
            for key in ["description", "answer"] {
                if let Some(text) = string_field(item, key) {
                    entry.insert(key.into(), Value::String(text));
                }
            }
            Value::Object(entry)
        })
        .collect();

    Ok(Value::Array(entries))
}

#[async_trait]
impl Capability for ImageAnalysisClient {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::ImageAnalysis
    }

    async fn invoke(&self, input: Value) -> Result<StepOutput, StepError> {
        let request = AnalysisRequest::parse(&input)?;
        let body = json!({ "images": request.images, "prompt": request.prompt });
        let data = self.service.post_json("/analyze", &body).await?;
        normalise(&request, data).map(StepOutput)
    }

    async fn health_check(&self) -> Result<(), StepError> {
        self.service.health().await
    }
}
