use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;

use flowpilot_core::error::{ServerError, ToolError};
use flowpilot_core::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_tools))
        .route("/{name}/execute", post(execute_tool))
}

/// GET /api/tools
async fn list_tools(State(state): State<AppState>) -> Json<Value> {
    Json(serde_json::json!({ "tools": state.tool_registry.list() }))
}

/// POST /api/tools/{name}/execute — invoke a tool directly with a JSON input
async fn execute_tool(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(input): Json<Value>,
) -> Result<Json<Value>, ServerError> {
    let result = state
        .tool_registry
        .execute(&name, input)
        .await
        .map_err(|e| match e {
            ToolError::NotFound(_) => ServerError::NotFound(e.to_string()),
            ToolError::RateLimited { .. } => ServerError::TooManyRequests(e.to_string()),
            _ => ServerError::BadRequest(e.to_string()),
        })?;
    Ok(Json(serde_json::json!({ "result": result })))
}
