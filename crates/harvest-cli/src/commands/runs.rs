//! `harvest runs` — Inspect stored workflow results.

use harvest_core::state::AppState;
use harvest_core::WorkflowResultStore;

use super::{print_json, truncate};

pub async fn list(state: &AppState, limit: usize) -> Result<(), String> {
    let runs = state
        .run_store
        .list(limit)
        .await
        .map_err(|e| e.to_string())?;

    if runs.is_empty() {
        println!("No workflow runs stored.");
        return Ok(());
    }

    println!("┌──────────────────────────────────────┬──────────────────────┬───────┬────┬──────┬─────────┬──────────────────────┐");
    println!("│ ID                                   │ Name                 │ Total │ OK │ Fail │ Skipped │ Completed            │");
    println!("├──────────────────────────────────────┼──────────────────────┼───────┼────┼──────┼─────────┼──────────────────────┤");
    for run in &runs {
        println!(
            "│ {:<36} │ {:<20} │ {:>5} │ {:>2} │ {:>4} │ {:>7} │ {:<20} │",
            run.workflow_id,
            truncate(run.workflow_name.as_deref().unwrap_or("-"), 20),
            run.counts.total,
            run.counts.succeeded,
            run.counts.failed,
            run.counts.skipped,
            run.completed_at.format("%Y-%m-%d %H:%M:%S"),
        );
    }
    println!("└──────────────────────────────────────┴──────────────────────┴───────┴────┴──────┴─────────┴──────────────────────┘");
    Ok(())
}

pub async fn get(state: &AppState, id: &str) -> Result<(), String> {
    match state.run_store.get(id).await.map_err(|e| e.to_string())? {
        Some(run) => {
            let value = serde_json::to_value(&run).map_err(|e| e.to_string())?;
            print_json(&value);
            Ok(())
        }
        None => Err(format!("Workflow run {} not found", id)),
    }
}
