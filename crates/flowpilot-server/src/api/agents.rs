use axum::{extract::State, routing::get, Json, Router};

use flowpilot_core::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/types", get(list_agent_types))
}

/// GET /api/agents/types
async fn list_agent_types(State(state): State<AppState>) -> Json<serde_json::Value> {
    let types = state.agent_factory.list_registered_types();
    Json(serde_json::json!({ "types": types }))
}
