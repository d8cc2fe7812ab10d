//! Core error type for the Harvest platform.
//!
//! `ServerError` is used by the stores and the outer adapters. Workflow
//! validation failures carry their own [`ValidationError`] and are wrapped
//! here when they cross into an API handler. When the `axum` feature is
//! enabled, `ServerError` also implements `IntoResponse` so it can be used
//! directly as an axum handler error type.

use crate::workflow::{TemplateError, ValidationError};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Invalid workflow: {0}")]
    Validation(#[from] ValidationError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<TemplateError> for ServerError {
    fn from(err: TemplateError) -> Self {
        match err {
            TemplateError::UnknownTemplate(_) => ServerError::NotFound(err.to_string()),
            TemplateError::MissingParameter { .. } => ServerError::BadRequest(err.to_string()),
            TemplateError::Malformed { .. } => ServerError::Internal(err.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// axum integration (opt-in via feature flag)
// ---------------------------------------------------------------------------

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let (status, body) = match &self {
            ServerError::Database(msg) | ServerError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({ "error": msg }),
            ),
            ServerError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, serde_json::json!({ "error": msg }))
            }
            ServerError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, serde_json::json!({ "error": msg }))
            }
            ServerError::Validation(err) => (
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "error": err.to_string(), "kind": err.kind() }),
            ),
        };

        (status, axum::Json(body)).into_response()
    }
}
