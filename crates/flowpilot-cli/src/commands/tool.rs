//! `flowpilot tool` — Inspect and invoke registered tools.

use flowpilot_core::state::AppState;
use serde_json::Value;

use super::print_json;

pub async fn list(state: &AppState) -> Result<(), String> {
    let tools = state.tool_registry.list();
    print_json(&serde_json::json!({ "tools": tools }));
    Ok(())
}

/// Invoke a tool directly. Registry errors and failed results both exit non-zero.
pub async fn run(state: &AppState, name: &str, input: Value) -> Result<(), String> {
    let result = state
        .tool_registry
        .execute(name, input)
        .await
        .map_err(|e| e.to_string())?;

    print_json(&serde_json::to_value(&result).map_err(|e| e.to_string())?);
    if result.success {
        Ok(())
    } else {
        Err(result.error.unwrap_or_else(|| format!("Tool '{}' failed", name)))
    }
}
