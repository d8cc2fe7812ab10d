use axum::{extract::State, routing::get, Json, Router};

use crate::error::ServerError;
use crate::state::AppState;
use crate::workflow::HealthReport;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_capabilities))
        .route("/health", get(capability_health))
}

/// GET /api/capabilities — Registered capability kinds
async fn list_capabilities(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let kinds: Vec<&str> = state.registry().kinds().iter().map(|k| k.as_str()).collect();
    Ok(Json(serde_json::json!({ "capabilities": kinds })))
}

/// GET /api/capabilities/health — Probe every capability service
async fn capability_health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(state.registry().health().await)
}
