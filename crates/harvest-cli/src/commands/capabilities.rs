//! `harvest capabilities` — List registered capabilities, optionally probing them.

use harvest_core::state::AppState;

use super::print_json;

pub async fn run(state: &AppState, health: bool) -> Result<(), String> {
    let registry = state.registry();

    if !health {
        let kinds: Vec<&str> = registry.kinds().iter().map(|k| k.as_str()).collect();
        print_json(&serde_json::json!({ "capabilities": kinds }));
        return Ok(());
    }

    let report = registry.health().await;
    let value = serde_json::to_value(&report).map_err(|e| e.to_string())?;
    print_json(&value);

    if report.is_healthy() {
        Ok(())
    } else {
        let down: Vec<&str> = report.unhealthy().iter().map(|k| k.as_str()).collect();
        Err(format!(
            "Capabilities {}: {} unhealthy",
            report.status,
            down.join(", ")
        ))
    }
}
