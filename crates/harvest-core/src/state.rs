//! Shared application state for the axum server and the CLI.

use std::sync::Arc;

use crate::config::OrchestratorConfig;
use crate::db::Database;
use crate::store::{WorkflowResultStore, WorkflowRunStore};
use crate::workflow::{CapabilityRegistry, WorkflowOrchestrator};

/// Shared state accessible by all API handlers.
pub struct AppStateInner {
    pub db: Database,
    pub run_store: WorkflowRunStore,
    pub orchestrator: WorkflowOrchestrator,
}

pub type AppState = Arc<AppStateInner>;

impl AppStateInner {
    /// State backed by the HTTP capability services named in `config`.
    pub fn new(db: Database, config: &OrchestratorConfig) -> Self {
        let registry = CapabilityRegistry::from_endpoints(&config.endpoints);
        Self::with_registry(db, registry, config)
    }

    /// State with a caller-supplied capability registry.
    pub fn with_registry(
        db: Database,
        registry: CapabilityRegistry,
        config: &OrchestratorConfig,
    ) -> Self {
        let run_store = WorkflowRunStore::new(db.clone());
        let store: Arc<dyn WorkflowResultStore> = Arc::new(run_store.clone());
        let orchestrator = WorkflowOrchestrator::new(Arc::new(registry))
            .with_default_timeout(config.step_timeout)
            .with_store(store);
        Self {
            db,
            run_store,
            orchestrator,
        }
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        self.orchestrator.registry()
    }
}
