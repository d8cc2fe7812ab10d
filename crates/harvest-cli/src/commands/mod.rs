//! CLI command implementations.
//!
//! Each submodule corresponds to a top-level CLI command and reuses
//! the harvest-core domain logic through `AppState`.

pub mod capabilities;
pub mod runs;
pub mod server;
pub mod workflow;

use harvest_core::state::{AppState, AppStateInner};
use harvest_core::{Database, OrchestratorConfig};
use std::sync::Arc;

/// Initialize a shared `AppState` from the given SQLite database path and
/// the capability endpoints in the environment.
pub fn init_state(db_path: &str) -> Result<AppState, String> {
    let config = OrchestratorConfig::from_env().with_db_path(db_path);
    let db = Database::open(&config.db_path)
        .map_err(|e| format!("Failed to open database '{}': {}", db_path, e))?;
    Ok(Arc::new(AppStateInner::new(db, &config)))
}

/// Pretty-print a JSON value to stdout.
pub fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
    );
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let head: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", head)
    }
}
