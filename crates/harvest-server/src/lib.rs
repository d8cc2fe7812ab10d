//! Harvest Server - workflow orchestration over HTTP
//!
//! A thin axum adapter over `harvest-core`, providing:
//! - `POST /api/workflows/execute` and `/validate`
//! - run history backed by SQLite
//! - capability listing and health probes
//!
//! This crate can be used standalone (via `harvest server`) or embedded
//! with a pre-built [`AppState`].

pub mod api;

pub use harvest_core::{db, error, state, store, workflow};

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use harvest_core::{Database, OrchestratorConfig};

use self::state::{AppState, AppStateInner};

/// Configuration for the Harvest HTTP server.
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub orchestrator: OrchestratorConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8000,
            orchestrator: OrchestratorConfig::default(),
        }
    }
}

/// Create a shared `AppState`: open the run database and register the HTTP
/// capability clients.
pub fn create_app_state(config: &OrchestratorConfig) -> Result<AppState, String> {
    let db = Database::open(&config.db_path)
        .map_err(|e| format!("Failed to open database: {}", e))?;

    tracing::info!(
        "Capabilities: discovery={} extraction={} vision={}",
        config.endpoints.discovery_url,
        config.endpoints.extraction_url,
        config.endpoints.vision_url
    );

    Ok(Arc::new(AppStateInner::new(db, config)))
}

/// Start the Harvest HTTP server.
///
/// Returns the actual address the server is listening on.
pub async fn start_server(config: ServerConfig) -> Result<SocketAddr, String> {
    // Initialize tracing (no-op if the host binary already did)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "harvest_core=info,harvest_server=info,tower_http=info".into()),
        )
        .try_init();

    tracing::info!(
        "Starting Harvest server on {}:{}",
        config.host,
        config.port
    );

    let state = create_app_state(&config.orchestrator)?;

    start_server_with_state(config, state).await
}

/// Build the full application router for `state`.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api::api_router())
        .route("/api/health", axum::routing::get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server with a pre-built `AppState`.
pub async fn start_server_with_state(
    config: ServerConfig,
    state: AppState,
) -> Result<SocketAddr, String> {
    let app = app(state);

    // Bind and serve
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| format!("Invalid address: {}", e))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind to {}: {}", addr, e))?;

    let local_addr = listener
        .local_addr()
        .map_err(|e| format!("Failed to get local address: {}", e))?;

    tracing::info!("Harvest server listening on {}", local_addr);

    // Spawn the server in a background task
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok(local_addr)
}

async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "server": "harvest-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
