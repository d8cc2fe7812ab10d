use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use std::collections::HashMap;

use serde::Deserialize;

use crate::error::ServerError;
use crate::state::AppState;
use crate::store::WorkflowResultStore;
use crate::workflow::{templates, WorkflowDefinition, WorkflowResult};

const DEFAULT_RUN_LIMIT: usize = 50;
const MAX_RUN_LIMIT: usize = 500;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/execute", post(execute_workflow))
        .route("/validate", post(validate_workflow))
        .route("/runs", get(list_runs))
        .route("/runs/{id}", get(get_run))
        .route("/templates", get(list_templates))
        .route("/templates/{name}/execute", post(execute_template))
}

/// POST /api/workflows/execute — Run a workflow to completion
async fn execute_workflow(
    State(state): State<AppState>,
    Json(definition): Json<WorkflowDefinition>,
) -> Result<Json<WorkflowResult>, ServerError> {
    let result = state.orchestrator.execute(&definition).await?;
    Ok(Json(result))
}

/// POST /api/workflows/validate — Check a definition without running it
async fn validate_workflow(
    State(state): State<AppState>,
    Json(definition): Json<WorkflowDefinition>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let graph = state.orchestrator.validate(&definition)?;
    let order: Vec<&str> = graph
        .topological_order()
        .into_iter()
        .map(|i| graph.node(i).name.as_str())
        .collect();
    Ok(Json(serde_json::json!({
        "valid": true,
        "steps": graph.len(),
        "order": order,
    })))
}

/// GET /api/workflows/templates — Built-in workflow templates
async fn list_templates() -> Result<Json<serde_json::Value>, ServerError> {
    let templates = templates::summaries()?;
    Ok(Json(serde_json::json!({ "templates": templates })))
}

#[derive(Debug, Deserialize)]
struct TemplateRunRequest {
    #[serde(default)]
    params: HashMap<String, String>,
    #[serde(default)]
    allow_parallel: Option<bool>,
    #[serde(default)]
    persist: bool,
}

/// POST /api/workflows/templates/{name}/execute — Fill in a template and run it
async fn execute_template(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(req): Json<TemplateRunRequest>,
) -> Result<Json<WorkflowResult>, ServerError> {
    let mut definition = templates::find(&name)?.instantiate(&req.params)?;
    if let Some(parallel) = req.allow_parallel {
        definition.allow_parallel = parallel;
    }
    definition.persist |= req.persist;

    let result = state.orchestrator.execute(&definition).await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    limit: Option<usize>,
}

async fn list_runs(
    State(state): State<AppState>,
    Query(q): Query<ListQuery>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let limit = q.limit.unwrap_or(DEFAULT_RUN_LIMIT).clamp(1, MAX_RUN_LIMIT);
    let runs = state.run_store.list(limit).await?;
    Ok(Json(serde_json::json!({ "runs": runs })))
}

async fn get_run(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<WorkflowResult>, ServerError> {
    match state.run_store.get(&id).await? {
        Some(run) => Ok(Json(run)),
        None => Err(ServerError::NotFound(format!("Workflow run {} not found", id))),
    }
}
