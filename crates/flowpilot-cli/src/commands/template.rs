//! `flowpilot template` — List and run built-in workflow templates.

use flowpilot_core::state::AppState;
use flowpilot_core::workflow::{Context, WorkflowExecution};
use serde_json::Value;

use super::workflow::execute_definition;
use super::{execution_result, print_execution, print_json};

pub async fn list(state: &AppState) -> Result<(), String> {
    let templates = state.templates.list();

    println!("┌──────────────────┬──────────────────┬──────────────────────────────┐");
    println!("│ ID               │ Name             │ Parameters                   │");
    println!("├──────────────────┼──────────────────┼──────────────────────────────┤");
    for t in &templates {
        let params: Vec<String> = t
            .parameters
            .iter()
            .map(|p| if p.required { format!("{}*", p.name) } else { p.name.clone() })
            .collect();
        println!(
            "│ {:<16} │ {:<16} │ {:<28} │",
            truncate(&t.id, 16),
            truncate(&t.name, 16),
            truncate(&params.join(", "), 28)
        );
    }
    println!("└──────────────────┴──────────────────┴──────────────────────────────┘");
    println!("  * required");
    Ok(())
}

/// Instantiate a template and run the resulting workflow.
pub async fn execute(
    state: &AppState,
    template_id: &str,
    params: &Context,
    user: Option<String>,
) -> Result<WorkflowExecution, String> {
    let definition = state
        .templates
        .instantiate(template_id, params)
        .map_err(|e| e.to_string())?;
    let definition = state
        .workflow_store
        .save(definition)
        .await
        .map_err(|e| e.to_string())?;
    execute_definition(state, definition, Value::Null, Context::new(), user).await
}

pub async fn run(
    state: &AppState,
    template_id: &str,
    params: &Context,
    user: Option<String>,
    json: bool,
) -> Result<(), String> {
    let execution = execute(state, template_id, params, user).await?;
    if json {
        print_json(&serde_json::to_value(&execution).map_err(|e| e.to_string())?);
    } else {
        println!("📄 Template: {} → workflow {}", template_id, execution.workflow_id());
        print_execution(&execution);
    }
    execution_result(&execution)
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(1)).collect();
        format!("{}…", kept)
    }
}
