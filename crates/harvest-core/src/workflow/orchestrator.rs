//! Workflow orchestrator: the single public entry point.
//!
//! `execute(definition)` validates the definition into a [`StepGraph`],
//! drives the [`Scheduler`] over it, which records every terminal step into
//! the [`ResultAggregator`], and optionally hands the finished result to a
//! [`WorkflowResultStore`].

use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use super::aggregator::ResultAggregator;
use super::capability::CapabilityRegistry;
use super::dispatcher::Dispatcher;
use super::graph::{StepGraph, ValidationError};
use super::run::WorkflowResult;
use super::scheduler::Scheduler;
use super::schema::WorkflowDefinition;
use crate::config::DEFAULT_STEP_TIMEOUT_SECS;
use crate::store::WorkflowResultStore;

#[derive(Clone)]
pub struct WorkflowOrchestrator {
    registry: Arc<CapabilityRegistry>,
    default_timeout: Duration,
    store: Option<Arc<dyn WorkflowResultStore>>,
}

impl WorkflowOrchestrator {
    pub fn new(registry: Arc<CapabilityRegistry>) -> Self {
        Self {
            registry,
            default_timeout: Duration::from_secs(DEFAULT_STEP_TIMEOUT_SECS),
            store: None,
        }
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_store(mut self, store: Arc<dyn WorkflowResultStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn registry(&self) -> &Arc<CapabilityRegistry> {
        &self.registry
    }

    /// Validate without running anything.
    pub fn validate(&self, definition: &WorkflowDefinition) -> Result<StepGraph, ValidationError> {
        StepGraph::build(definition, &self.registry.kinds())
    }

    /// Execute a workflow to completion.
    ///
    /// Returns a validation error before any step is dispatched, or a result
    /// accounting for every declared step. Step failures never surface as
    /// `Err`.
    pub async fn execute(
        &self,
        definition: &WorkflowDefinition,
    ) -> Result<WorkflowResult, ValidationError> {
        let graph = self.validate(definition).map_err(|e| {
            tracing::warn!(
                "[Orchestrator] Rejected workflow '{}': {}",
                definition.display_name(),
                e
            );
            e
        })?;

        let workflow_id = Uuid::new_v4().to_string();
        tracing::info!(
            "[Orchestrator] Starting workflow '{}' ({}) with {} step(s), parallel={}",
            definition.display_name(),
            workflow_id,
            graph.len(),
            definition.allow_parallel
        );

        let mut aggregator = ResultAggregator::new(workflow_id, definition.name.clone(), &graph);
        let scheduler = Scheduler::new(Dispatcher::new(
            self.registry.clone(),
            self.default_timeout,
        ));
        scheduler
            .run(&graph, definition.allow_parallel, &mut aggregator)
            .await;

        let result = aggregator.finalize();
        tracing::info!(
            "[Orchestrator] Workflow {} finished: {} succeeded, {} failed, {} skipped",
            result.workflow_id,
            result.counts.succeeded,
            result.counts.failed,
            result.counts.skipped
        );

        if definition.persist {
            self.persist(&result).await;
        }

        Ok(result)
    }

    async fn persist(&self, result: &WorkflowResult) {
        let Some(store) = &self.store else {
            tracing::warn!(
                "[Orchestrator] persist requested for {} but no store is configured",
                result.workflow_id
            );
            return;
        };
        if let Err(e) = store.save(result).await {
            tracing::warn!(
                "[Orchestrator] Failed to persist workflow {}: {}",
                result.workflow_id,
                e
            );
        }
    }
}
