//! Discovery (web search) capability client.

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{result_list, string_field, ServiceClient};
use crate::workflow::capability::{Capability, StepError, StepOutput};
use crate::workflow::schema::CapabilityKind;

const DEFAULT_LIMIT: u64 = 10;

/// Calls `POST {base}/discover` and normalises hits to
/// `[{url, title, snippet}]`.
#[derive(Debug, Clone)]
pub struct DiscoveryClient {
    service: ServiceClient,
}

#[derive(Debug, PartialEq)]
struct DiscoveryRequest {
    query: String,
    limit: u64,
    domains: Vec<String>,
}

impl DiscoveryClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            service: ServiceClient::new("Discovery", base_url),
        }
    }
}

impl DiscoveryRequest {
    fn parse(input: &Value) -> Result<Self, StepError> {
        let query = input
            .get("query")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| StepError::invalid_input("discovery requires a non-empty 'query'"))?
            .to_string();

        let limit = match input.get("limit") {
            None | Some(Value::Null) => DEFAULT_LIMIT,
            Some(v) => v
                .as_u64()
                .filter(|n| *n > 0)
                .ok_or_else(|| StepError::invalid_input("'limit' must be a positive integer"))?,
        };

        let domains = match input.get("domains") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|d| {
                    d.as_str()
                        .map(|s| s.trim().to_ascii_lowercase())
                        .ok_or_else(|| StepError::invalid_input("'domains' must be a list of strings"))
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => return Err(StepError::invalid_input("'domains' must be a list of strings")),
        };

        Ok(Self {
            query,
            limit,
            domains,
        })
    }

    fn body(&self) -> Value {
        json!({
            "query": self.query,
            "limit": self.limit,
            "domains": self.domains,
        })
    }

    fn allows(&self, url: &str) -> bool {
        if self.domains.is_empty() {
            return true;
        }
        let Some(host) = reqwest::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
        else {
            return false;
        };
        self.domains
            .iter()
            .any(|d| host == *d || host.ends_with(&format!(".{}", d)))
    }
}

fn normalise(request: &DiscoveryRequest, data: Value) -> Result<Value, StepError> {
    let items = result_list(data)
        .ok_or_else(|| StepError::upstream("discovery payload is not a result list"))?;

    let hits: Vec<Value> = items
        .iter()
        .filter_map(|item| {
            let url = string_field(item, "url")?;
            request.allows(&url).then(|| {
                json!({
                    "url": url,
                    "title": string_field(item, "title").unwrap_or_default(),
                    "snippet": string_field(item, "snippet")
                        .or_else(|| string_field(item, "content"))
                        .unwrap_or_default(),
                })
            })
        })
        .take(request.limit as usize)
        .collect();

    Ok(Value::Array(hits))
}

#[async_trait]
impl Capability for DiscoveryClient {
    fn kind(&self) -> CapabilityKind {
        CapabilityKind::Discovery
    }

    async fn invoke(&self, input: Value) -> Result<StepOutput, StepError> {
        let request = DiscoveryRequest::parse(&input)?;
        let data = self.service.post_json("/discover", &request.body()).await?;
        normalise(&request, data).map(StepOutput)
    }

    async fn health_check(&self) -> Result<(), StepError> {
        self.service.health().await
    }
}
