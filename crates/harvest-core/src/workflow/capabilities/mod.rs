//! HTTP clients for the capability services.
//!
//! Every service speaks the same envelope:
//!
//! ```json
//! { "success": true, "data": <payload> }
//! { "success": false, "error": { "code": "invalid-input", "message": "..." } }
//! ```
//!
//! [`ServiceClient`] owns the transport and envelope handling; the per-kind
//! clients validate their input locally, build the request body and
//! normalise the payload into a [`StepOutput`](super::capability::StepOutput).

mod discovery;
mod extraction;
mod image_analysis;

pub use discovery::DiscoveryClient;
pub use extraction::ExtractionClient;
pub use image_analysis::ImageAnalysisClient;

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

use super::capability::{StepError, StepErrorCode};

/// Health probes are not bounded by a step timeout, so they carry their own.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    error: Option<EnvelopeError>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

/// Thin JSON client for one capability service.
///
/// Capability calls carry no client-side deadline: the dispatcher bounds
/// each one with the step's effective timeout.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    name: &'static str,
    base_url: String,
    client: reqwest::Client,
}

impl ServiceClient {
    pub fn new(name: &'static str, base_url: &str) -> Self {
        Self {
            name,
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `POST {base_url}{path}` and unwrap the envelope's `data`.
    pub async fn post_json(&self, path: &str, body: &Value) -> Result<Value, StepError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("[{}] POST {}", self.name, url);

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| self.transport_error(e))?;

        if status.is_client_error() {
            return Err(StepError::invalid_input(format!(
                "{} rejected request ({}): {}",
                self.name,
                status,
                truncate(&text)
            )));
        }
        if !status.is_success() {
            return Err(StepError::upstream(format!(
                "{} returned {}: {}",
                self.name,
                status,
                truncate(&text)
            )));
        }

        let envelope: Envelope = serde_json::from_str(&text).map_err(|e| {
            StepError::upstream(format!("{} returned an undecodable body: {}", self.name, e))
        })?;

        if envelope.success {
            return Ok(envelope.data);
        }

        Err(match envelope.error {
            Some(err) => StepError::new(
                StepErrorCode::from_wire(&err.code),
                if err.message.is_empty() {
                    format!("{} reported failure", self.name)
                } else {
                    err.message
                },
            ),
            None => StepError::upstream(format!("{} reported failure without detail", self.name)),
        })
    }

    /// `GET {base_url}/health`; any 2xx counts as healthy.
    pub async fn health(&self) -> Result<(), StepError> {
        let url = format!("{}/health", self.base_url);
        let response = self
            .client
            .get(&url)
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(StepError::upstream(format!(
                "{} health returned {}",
                self.name,
                response.status()
            )))
        }
    }

    fn transport_error(&self, err: reqwest::Error) -> StepError {
        if err.is_timeout() {
            StepError::timeout(format!("{} timed out: {}", self.name, err))
        } else if err.is_connect() {
            StepError::unreachable(format!("{} unreachable at {}: {}", self.name, self.base_url, err))
        } else if err.is_decode() || err.is_body() {
            StepError::upstream(format!("{} response could not be read: {}", self.name, err))
        } else {
            StepError::unreachable(format!("{} request failed: {}", self.name, err))
        }
    }
}

fn truncate(text: &str) -> &str {
    const MAX: usize = 200;
    if text.len() <= MAX {
        return text;
    }
    let mut end = MAX;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

/// Payloads are either a bare list or an object wrapping it under `results`.
pub(crate) fn result_list(data: Value) -> Option<Vec<Value>> {
    match data {
        Value::Array(items) => Some(items),
        Value::Object(mut map) => match map.remove("results") {
            Some(Value::Array(items)) => Some(items),
            _ => None,
        },
        _ => None,
    }
}

pub(crate) fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}
