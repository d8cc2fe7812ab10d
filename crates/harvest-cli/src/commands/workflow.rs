//! `harvest workflow` — Run or validate workflow files and built-in templates.

use std::collections::HashMap;

use harvest_core::state::AppState;
use harvest_core::workflow::{templates, StepState, WorkflowDefinition, WorkflowResult};

use super::{print_json, truncate};

/// Run a workflow from a YAML or JSON file.
///
/// `parallel` and `persist` force the corresponding definition flags on.
/// Returns an error when validation fails or any step fails or is skipped.
pub async fn run(
    state: &AppState,
    workflow_file: &str,
    parallel: bool,
    persist: bool,
    json: bool,
) -> Result<WorkflowResult, String> {
    let workflow = WorkflowDefinition::from_file(workflow_file)?;
    execute(state, workflow, workflow_file, parallel, persist, json).await
}

/// List the built-in workflow templates and their parameters.
pub fn list_templates() -> Result<(), String> {
    let summaries = templates::summaries().map_err(|e| e.to_string())?;

    println!("Built-in workflow templates:\n");
    for summary in &summaries {
        println!("  {} ({} steps)", summary.name, summary.steps);
        if let Some(description) = &summary.description {
            println!("    {}", description);
        }
        for param in &summary.parameters {
            match param.default {
                Some(default) => println!("    --param {}=...   (default: {})", param.name, default),
                None => println!("    --param {}=...   (required)", param.name),
            }
        }
        println!();
    }
    Ok(())
}

/// Instantiate a built-in template with `params` and run it like a file.
pub async fn run_template(
    state: &AppState,
    name: &str,
    params: &HashMap<String, String>,
    parallel: bool,
    persist: bool,
    json: bool,
) -> Result<WorkflowResult, String> {
    let workflow = templates::find(name)
        .and_then(|t| t.instantiate(params))
        .map_err(|e| e.to_string())?;
    execute(state, workflow, &format!("template {}", name), parallel, persist, json).await
}

/// Parse repeated `KEY=VALUE` arguments.
pub fn parse_params(raw: &[String]) -> Result<HashMap<String, String>, String> {
    raw.iter()
        .map(|pair| {
            pair.split_once('=')
                .filter(|(key, _)| !key.trim().is_empty())
                .map(|(key, value)| (key.trim().to_string(), value.to_string()))
                .ok_or_else(|| format!("Invalid parameter '{}', expected KEY=VALUE", pair))
        })
        .collect()
}

async fn execute(
    state: &AppState,
    mut workflow: WorkflowDefinition,
    source: &str,
    parallel: bool,
    persist: bool,
    json: bool,
) -> Result<WorkflowResult, String> {
    workflow.allow_parallel |= parallel;
    workflow.persist |= persist;

    if !json {
        println!("📄 Loaded workflow: {} ({})", workflow.display_name(), source);
        println!(
            "   {} step(s), parallel: {}, persist: {}",
            workflow.steps.len(),
            workflow.allow_parallel,
            workflow.persist
        );
        println!();
    }

    let result = state
        .orchestrator
        .execute(&workflow)
        .await
        .map_err(|e| format!("Invalid workflow: {}", e))?;

    if json {
        let value = serde_json::to_value(&result).map_err(|e| e.to_string())?;
        print_json(&value);
    } else {
        print_summary(&result);
    }

    if result.success() {
        if !json {
            println!("\n🎉 Workflow completed successfully!");
        }
        Ok(result)
    } else {
        let broken: Vec<_> = result
            .steps
            .iter()
            .filter(|s| s.state != StepState::Succeeded)
            .map(|s| format!("{} ({})", s.name, s.state.as_str()))
            .collect();
        Err(format!(
            "Workflow did not complete. Unsuccessful steps: {}",
            broken.join(", ")
        ))
    }
}

/// Validate a workflow file without executing it.
pub async fn validate(state: &AppState, workflow_file: &str) -> Result<(), String> {
    let workflow = WorkflowDefinition::from_file(workflow_file)?;
    let graph = state
        .orchestrator
        .validate(&workflow)
        .map_err(|e| format!("Invalid workflow: {}", e))?;

    println!("✅ Workflow '{}' is valid", workflow.display_name());
    println!("   Steps: {}", graph.len());
    println!("   Execution order:");

    for (i, idx) in graph.topological_order().into_iter().enumerate() {
        let node = graph.node(idx);
        if node.depends_on.is_empty() {
            println!("   {}. {} ({})", i + 1, node.name, node.kind);
        } else {
            println!(
                "   {}. {} ({}) ← {}",
                i + 1,
                node.name,
                node.kind,
                node.depends_on.join(", ")
            );
        }
    }

    Ok(())
}

fn print_summary(result: &WorkflowResult) {
    println!("┌──────────────────┬────────────────┬───────────┬──────────────────────────────────────────┐");
    println!("│ Step             │ Kind           │ State     │ Detail                                   │");
    println!("├──────────────────┼────────────────┼───────────┼──────────────────────────────────────────┤");

    for step in &result.steps {
        let detail = match step.state {
            StepState::Failed => step
                .error
                .as_ref()
                .map(|e| e.to_string())
                .unwrap_or_default(),
            StepState::Skipped => step
                .skipped_because
                .as_ref()
                .map(|d| format!("dependency '{}' did not succeed", d))
                .unwrap_or_default(),
            _ => match (step.started_at, step.finished_at) {
                (Some(start), Some(end)) => format!("{} ms", (end - start).num_milliseconds()),
                _ => String::new(),
            },
        };
        println!(
            "│ {:<16} │ {:<14} │ {:<9} │ {:<40} │",
            truncate(&step.name, 16),
            step.kind.as_str(),
            step.state.as_str(),
            truncate(&detail, 40)
        );
    }

    println!("└──────────────────┴────────────────┴───────────┴──────────────────────────────────────────┘");
    println!(
        "   {} total, {} succeeded, {} failed, {} skipped (id: {})",
        result.counts.total,
        result.counts.succeeded,
        result.counts.failed,
        result.counts.skipped,
        result.workflow_id
    );
}
