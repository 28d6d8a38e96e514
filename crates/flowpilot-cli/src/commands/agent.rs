//! `flowpilot agent` — Agent type discovery.

use flowpilot_core::agents::factory::MODEL_AGENT_TYPES;
use flowpilot_core::state::AppState;

use super::print_json;

/// Registered agent-type tags, plus the model-backed tags that are only
/// available once a model API key is configured.
pub fn types(state: &AppState) -> serde_json::Value {
    let registered = state.agent_factory.list_registered_types();
    let unavailable: Vec<&str> = MODEL_AGENT_TYPES
        .iter()
        .copied()
        .filter(|tag| !registered.contains(*tag))
        .collect();
    serde_json::json!({
        "types": registered,
        "requiresModel": unavailable,
    })
}

pub async fn list_types(state: &AppState) -> Result<(), String> {
    print_json(&types(state));
    Ok(())
}
