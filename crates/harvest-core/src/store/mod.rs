//! Storage collaborators for finished workflow results.

pub mod workflow_run_store;

pub use workflow_run_store::WorkflowRunStore;

use async_trait::async_trait;

use crate::error::ServerError;
use crate::workflow::WorkflowResult;

/// Where finished workflow results go when `persist` is set.
#[async_trait]
pub trait WorkflowResultStore: Send + Sync {
    /// Insert or replace the result keyed by its workflow id.
    async fn save(&self, result: &WorkflowResult) -> Result<(), ServerError>;

    /// Most recent results first.
    async fn list(&self, limit: usize) -> Result<Vec<WorkflowResult>, ServerError>;

    async fn get(&self, workflow_id: &str) -> Result<Option<WorkflowResult>, ServerError>;
}
