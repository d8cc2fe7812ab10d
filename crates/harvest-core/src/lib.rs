//! Harvest Core — transport-agnostic workflow orchestration.
//!
//! This crate contains the workflow engine (graph validation, scheduling,
//! capability dispatch, result aggregation), the HTTP clients for the
//! capability services, and the SQLite run history. It has **no HTTP
//! framework dependency** by default, making it suitable for use in:
//!
//! - HTTP servers (via `harvest-server`)
//! - CLI tools (via `harvest-cli`)
//! - Embedding with in-process capabilities
//!
//! # Feature Flags
//!
//! - `axum` — Enables `IntoResponse` impl on `ServerError` for use in axum handlers.

pub mod config;
pub mod db;
pub mod error;
pub mod state;
pub mod store;
pub mod workflow;

// Convenience re-exports
pub use config::{CapabilityEndpoints, OrchestratorConfig};
pub use db::Database;
pub use error::ServerError;
pub use state::{AppState, AppStateInner};
pub use store::{WorkflowResultStore, WorkflowRunStore};
pub use workflow::{WorkflowDefinition, WorkflowOrchestrator, WorkflowResult};
