//! `flowpilot workflow` — Run and validate YAML-defined workflows.

use std::sync::Arc;

use flowpilot_core::state::AppState;
use flowpilot_core::workflow::{Context, WorkflowDefinition, WorkflowExecution};
use serde_json::Value;

use super::{execution_result, print_execution, print_json};

/// Load a workflow file, create an execution and run it to completion.
///
/// Step failures are reported through the returned execution, not as `Err`.
pub async fn execute_file(
    state: &AppState,
    workflow_file: &str,
    input: Value,
    context: Context,
    user: Option<String>,
) -> Result<WorkflowExecution, String> {
    let workflow = WorkflowDefinition::from_file(workflow_file).map_err(|e| e.to_string())?;
    let definition = state
        .workflow_store
        .save(workflow)
        .await
        .map_err(|e| e.to_string())?;
    execute_definition(state, definition, input, context, user).await
}

pub async fn execute_definition(
    state: &AppState,
    definition: Arc<WorkflowDefinition>,
    input: Value,
    context: Context,
    user: Option<String>,
) -> Result<WorkflowExecution, String> {
    let execution = state
        .engine
        .create_execution(definition, input, context, user)
        .await
        .map_err(|e| e.to_string())?;
    state.engine.run(&execution.id).await.map_err(|e| e.to_string())?;
    state
        .engine
        .get_execution(&execution.id)
        .await
        .map_err(|e| e.to_string())
}

/// Run a workflow from a YAML file.
pub async fn run(
    state: &AppState,
    workflow_file: &str,
    input: Value,
    context: Context,
    user: Option<String>,
    json: bool,
) -> Result<(), String> {
    let execution = execute_file(state, workflow_file, input, context, user).await?;

    if json {
        print_json(&serde_json::to_value(&execution).map_err(|e| e.to_string())?);
    } else {
        println!("📄 Workflow: {} ({})", execution.definition.name, workflow_file);
        print_execution(&execution);
        if !execution.results.is_empty() {
            println!();
            print_json(&serde_json::json!({ "results": execution.results }));
        }
    }

    execution_result(&execution)
}

/// Validate a workflow YAML file without executing it.
///
/// Also reports steps whose agent type is not registered, since those fail
/// at run time.
pub fn validate(state: &AppState, workflow_file: &str) -> Result<Vec<String>, String> {
    let workflow = WorkflowDefinition::from_file(workflow_file).map_err(|e| e.to_string())?;

    println!("✅ Workflow '{}' is valid", workflow.name);
    println!("   Id: {}", workflow.id);
    println!("   Steps: {}", workflow.steps.len());

    let mut warnings = Vec::new();
    for (i, step) in workflow.steps.iter().enumerate() {
        println!("   {}. {} (agent: {})", i + 1, step.name, step.agent_type);
        if !state.agent_factory.contains(&step.agent_type) {
            warnings.push(format!(
                "step '{}' uses unregistered agent type '{}'",
                step.id, step.agent_type
            ));
        }
    }
    for warning in &warnings {
        println!("   ⚠️  {}", warning);
    }

    Ok(warnings)
}
