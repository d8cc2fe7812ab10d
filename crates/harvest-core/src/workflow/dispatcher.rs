//! Capability dispatcher: placeholder resolution, registry lookup and the
//! per-dispatch timeout.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use super::capability::{CapabilityRegistry, StepError, StepOutput};
use super::graph::StepNode;
use super::placeholder;

/// Routes steps to their capability. Cheap to clone; one clone is moved
/// into every spawned step task.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    registry: Arc<CapabilityRegistry>,
    default_timeout: Duration,
}

impl Dispatcher {
    pub fn new(registry: Arc<CapabilityRegistry>, default_timeout: Duration) -> Self {
        Self {
            registry,
            default_timeout,
        }
    }

    /// Effective timeout for `step`: its own override, else the default.
    pub fn timeout_for(&self, step: &StepNode) -> Duration {
        step.timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout)
    }

    /// Substitute `${steps.X.output...}` placeholders in the step input using
    /// the outputs captured so far. An unresolvable reference is an
    /// `invalid-input` step error.
    pub fn prepare_input(
        &self,
        step: &StepNode,
        outputs: &HashMap<String, Value>,
    ) -> Result<Value, StepError> {
        let resolved = placeholder::resolve(&step.input, outputs)
            .map_err(|e| StepError::invalid_input(e.to_string()))?;
        tracing::debug!("[Dispatcher] Resolved input for '{}': {}", step.name, resolved);
        Ok(resolved)
    }

    /// Forward a resolved input to the step's capability, bounded by the
    /// step timeout.
    pub async fn dispatch(&self, step: &StepNode, input: Value) -> Result<StepOutput, StepError> {
        let capability = self.registry.get(step.kind).ok_or_else(|| {
            StepError::internal(format!("no capability registered for kind '{}'", step.kind))
        })?;

        let limit = self.timeout_for(step);
        match tokio::time::timeout(limit, capability.invoke(input)).await {
            Ok(result) => result,
            Err(_) => Err(StepError::timeout(format!(
                "step '{}' exceeded {}s",
                step.name,
                limit.as_secs_f64()
            ))),
        }
    }
}
