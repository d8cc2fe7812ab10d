//! Capability seam: the trait every step kind implements, the uniform
//! output/error shapes, and the closed registry the dispatcher consults.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::capabilities::{DiscoveryClient, ExtractionClient, ImageAnalysisClient};
use super::schema::CapabilityKind;
use crate::config::CapabilityEndpoints;

/// Captured output of a successful step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepOutput(pub Value);

impl StepOutput {
    pub fn into_inner(self) -> Value {
        self.0
    }
}

/// Machine-readable failure category for a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StepErrorCode {
    Unreachable,
    InvalidInput,
    Timeout,
    UpstreamError,
    Internal,
}

impl StepErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepErrorCode::Unreachable => "unreachable",
            StepErrorCode::InvalidInput => "invalid-input",
            StepErrorCode::Timeout => "timeout",
            StepErrorCode::UpstreamError => "upstream-error",
            StepErrorCode::Internal => "internal",
        }
    }

    /// Map an error code reported by a capability service. Unrecognised
    /// codes are treated as upstream errors.
    pub fn from_wire(code: &str) -> Self {
        match code.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "unreachable" => StepErrorCode::Unreachable,
            "invalid-input" => StepErrorCode::InvalidInput,
            "timeout" => StepErrorCode::Timeout,
            "internal" => StepErrorCode::Internal,
            _ => StepErrorCode::UpstreamError,
        }
    }
}

impl fmt::Display for StepErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Step-level failure. Recorded on the step run, never propagated past the
/// scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{code}: {message}")]
pub struct StepError {
    pub code: StepErrorCode,
    pub message: String,
}

impl StepError {
    pub fn new(code: StepErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::new(StepErrorCode::Unreachable, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(StepErrorCode::InvalidInput, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(StepErrorCode::Timeout, message)
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(StepErrorCode::UpstreamError, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StepErrorCode::Internal, message)
    }
}

/// One step kind's implementation.
#[async_trait]
pub trait Capability: Send + Sync {
    fn kind(&self) -> CapabilityKind;

    /// Execute with an already-resolved input.
    async fn invoke(&self, input: Value) -> Result<StepOutput, StepError>;

    /// Liveness probe for the backing service.
    async fn health_check(&self) -> Result<(), StepError> {
        Ok(())
    }
}

/// Fixed set of capability implementations, keyed by kind.
#[derive(Clone, Default)]
pub struct CapabilityRegistry {
    capabilities: HashMap<CapabilityKind, Arc<dyn Capability>>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry backed by the HTTP capability services.
    pub fn from_endpoints(endpoints: &CapabilityEndpoints) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(DiscoveryClient::new(&endpoints.discovery_url)));
        registry.register(Arc::new(ExtractionClient::new(&endpoints.extraction_url)));
        registry.register(Arc::new(ImageAnalysisClient::new(&endpoints.vision_url)));
        registry
    }

    /// Register `capability` under its own kind, replacing any previous one.
    pub fn register(&mut self, capability: Arc<dyn Capability>) {
        self.capabilities.insert(capability.kind(), capability);
    }

    pub fn get(&self, kind: CapabilityKind) -> Option<Arc<dyn Capability>> {
        self.capabilities.get(&kind).cloned()
    }

    pub fn contains(&self, kind: CapabilityKind) -> bool {
        self.capabilities.contains_key(&kind)
    }

    /// Registered kinds, sorted.
    pub fn kinds(&self) -> Vec<CapabilityKind> {
        let mut kinds: Vec<_> = self.capabilities.keys().copied().collect();
        kinds.sort();
        kinds
    }

    /// Probe every registered capability.
    pub async fn health(&self) -> HealthReport {
        let mut capabilities = BTreeMap::new();
        for kind in self.kinds() {
            let Some(capability) = self.get(kind) else {
                continue;
            };
            let status = match capability.health_check().await {
                Ok(()) => "ok",
                Err(e) => {
                    tracing::warn!("[Capabilities] {} health check failed: {}", kind, e);
                    "error"
                }
            };
            capabilities.insert(kind, status);
        }
        HealthReport::from_probes(capabilities)
    }
}

/// Result of probing every registered capability: `healthy` only when every
/// probe succeeded, otherwise `degraded`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub capabilities: BTreeMap<CapabilityKind, &'static str>,
}

impl HealthReport {
    fn from_probes(capabilities: BTreeMap<CapabilityKind, &'static str>) -> Self {
        let status = if capabilities.values().all(|s| *s == "ok") {
            "healthy"
        } else {
            "degraded"
        };
        Self {
            status,
            capabilities,
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }

    /// Kinds whose probe failed, sorted.
    pub fn unhealthy(&self) -> Vec<CapabilityKind> {
        self.capabilities
            .iter()
            .filter(|(_, s)| **s != "ok")
            .map(|(k, _)| *k)
            .collect()
    }
}

impl fmt::Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
