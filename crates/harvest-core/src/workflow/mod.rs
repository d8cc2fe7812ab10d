//! Workflow engine — dependency-graph execution over capability services.
//!
//! A workflow is a list of named steps, each dispatched to one capability
//! (discovery, extraction, image analysis). Steps declare which other steps
//! they depend on and may reference their outputs with
//! `${steps.<name>.output...}` placeholders. A few ready-made workflows ship
//! as [`templates`].
//!
//! # Architecture
//!
//! ```text
//! workflow.yaml ──► WorkflowDefinition ──► WorkflowOrchestrator
//!                                              │
//!                                         StepGraph (validate)
//!                                              │
//!                                         Scheduler ──► Dispatcher ──► CapabilityRegistry
//!                                              │                             │
//!                                         ResultAggregator          Discovery / Extraction / Vision
//!                                              │
//!                                         WorkflowResult ──► WorkflowResultStore
//! ```

pub mod aggregator;
pub mod capabilities;
pub mod capability;
pub mod dispatcher;
pub mod graph;
pub mod orchestrator;
pub mod placeholder;
pub mod run;
pub mod scheduler;
pub mod schema;
pub mod templates;

pub use aggregator::ResultAggregator;
pub use capability::{
    Capability, CapabilityRegistry, HealthReport, StepError, StepErrorCode, StepOutput,
};
pub use dispatcher::Dispatcher;
pub use graph::{StepGraph, StepNode, ValidationError};
pub use orchestrator::WorkflowOrchestrator;
pub use run::{StepCounts, StepRun, StepState, WorkflowResult};
pub use scheduler::Scheduler;
pub use schema::{CapabilityKind, StepDeclaration, WorkflowDefinition};
pub use templates::{TemplateError, WorkflowTemplate};
