use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;

use flowpilot_core::error::ServerError;
use flowpilot_core::state::AppState;
use flowpilot_core::workflow::Context;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_templates))
        .route("/{id}", get(get_template))
        .route("/{id}/instantiate", post(instantiate_template))
}

/// GET /api/templates — every template with its parameters and the agent
/// types it needs, flagged with whether each type is currently registered.
async fn list_templates(State(state): State<AppState>) -> Json<Value> {
    let templates: Vec<Value> = state
        .templates
        .list()
        .iter()
        .map(|t| {
            let missing: Vec<&str> = t
                .agent_types()
                .into_iter()
                .filter(|tag| !state.agent_factory.contains(tag))
                .collect();
            serde_json::json!({
                "id": t.id,
                "name": t.name,
                "description": t.description,
                "parameters": t.parameters,
                "agentTypes": t.agent_types(),
                "unavailableAgentTypes": missing,
            })
        })
        .collect();
    Json(serde_json::json!({ "templates": templates }))
}

async fn get_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ServerError> {
    let template = state
        .templates
        .get(&id)
        .ok_or_else(|| ServerError::NotFound(format!("Template {} not found", id)))?;
    Ok(Json(serde_json::json!({ "template": &*template })))
}

#[derive(Debug, Default, Deserialize)]
struct InstantiateRequest {
    #[serde(default)]
    params: Context,
}

/// POST /api/templates/{id}/instantiate — expand and store a new workflow
async fn instantiate_template(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Option<Json<InstantiateRequest>>,
) -> Result<(StatusCode, Json<Value>), ServerError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let definition = state.templates.instantiate(&id, &body.params)?;
    let saved = state.workflow_store.save(definition).await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "workflow": &*saved })),
    ))
}
