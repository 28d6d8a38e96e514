use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::Value;

use flowpilot_core::error::ServerError;
use flowpilot_core::state::AppState;
use flowpilot_core::workflow::{Context, StartOutcome, WorkflowDefinition};

use super::caller_identity;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_workflows).post(create_workflow))
        .route("/{id}", get(get_workflow).delete(delete_workflow))
        .route("/{id}/executions", get(list_executions).post(start_execution))
        .route("/{id}/executions/{execution_id}", get(get_execution_status))
        .route("/{id}/executions/{execution_id}/cancel", post(cancel_execution))
}

/// GET /api/workflows
async fn list_workflows(State(state): State<AppState>) -> Json<Value> {
    let workflows: Vec<Value> = state
        .workflow_store
        .list()
        .await
        .iter()
        .map(|def| {
            serde_json::json!({
                "id": def.id,
                "name": def.name,
                "description": def.description,
                "steps": def.steps.len(),
                "createdAt": def.created_at,
            })
        })
        .collect();
    Json(serde_json::json!({ "workflows": workflows }))
}

/// POST /api/workflows — store a JSON workflow definition
async fn create_workflow(
    State(state): State<AppState>,
    Json(definition): Json<WorkflowDefinition>,
) -> Result<(StatusCode, Json<Value>), ServerError> {
    let saved = state.workflow_store.save(definition).await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "workflow": &*saved })),
    ))
}

async fn get_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ServerError> {
    let def = state
        .workflow_store
        .get(&id)
        .await
        .ok_or_else(|| ServerError::NotFound(format!("Workflow {} not found", id)))?;
    Ok(Json(serde_json::json!({ "workflow": &*def })))
}

async fn delete_workflow(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ServerError> {
    state
        .workflow_store
        .remove(&id)
        .await
        .ok_or_else(|| ServerError::NotFound(format!("Workflow {} not found", id)))?;
    Ok(Json(serde_json::json!({ "deleted": true })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartExecutionRequest {
    #[serde(default)]
    input: Value,
    #[serde(default)]
    context: Context,
    /// Run the execution instead of only creating it
    #[serde(default)]
    execute: bool,
    /// With `execute`, return immediately and run in a background task
    #[serde(default)]
    background: bool,
}

/// POST /api/workflows/{id}/executions
async fn start_execution(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Option<Json<StartExecutionRequest>>,
) -> Result<(StatusCode, Json<Value>), ServerError> {
    let body = body.map(|Json(b)| b).unwrap_or_default();
    let created_by = caller_identity(&headers);

    if body.execute && body.background {
        let definition = state
            .workflow_store
            .get(&id)
            .await
            .ok_or_else(|| ServerError::NotFound(format!("Unknown workflow: {}", id)))?;
        let execution = state
            .engine
            .create_execution(definition, body.input, body.context, created_by)
            .await?;

        let engine = state.engine.clone();
        let execution_id = execution.id.clone();
        tokio::spawn(async move {
            if let Err(e) = engine.run(&execution_id).await {
                tracing::error!("Background execution {} failed to run: {}", execution_id, e);
            }
        });

        return Ok((
            StatusCode::ACCEPTED,
            Json(serde_json::to_value(execution.status_report()).map_err(internal)?),
        ));
    }

    let outcome = state
        .engine
        .start(&id, body.input, body.context, body.execute, created_by)
        .await?;
    let status = match outcome {
        StartOutcome::Ran(_) => StatusCode::OK,
        StartOutcome::Created(_) => StatusCode::CREATED,
    };
    Ok((status, Json(serde_json::to_value(&outcome).map_err(internal)?)))
}

async fn list_executions(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ServerError> {
    if state.workflow_store.get(&id).await.is_none() {
        return Err(ServerError::NotFound(format!("Workflow {} not found", id)));
    }
    let executions = state.engine.list_executions(Some(&id)).await;
    Ok(Json(serde_json::json!({ "executions": executions })))
}

#[derive(Debug, Deserialize)]
struct StatusQuery {
    /// Include the full execution record (steps, results, context)
    #[serde(default)]
    detail: bool,
}

/// GET /api/workflows/{id}/executions/{execution_id} — status polling
async fn get_execution_status(
    State(state): State<AppState>,
    Path((id, execution_id)): Path<(String, String)>,
    Query(query): Query<StatusQuery>,
) -> Result<Json<Value>, ServerError> {
    let report = state.engine.get_status(&execution_id).await?;
    if report.workflow_id != id {
        return Err(ServerError::NotFound(format!(
            "Execution {} not found for workflow {}",
            execution_id, id
        )));
    }

    let mut body = serde_json::to_value(&report).map_err(internal)?;
    if query.detail {
        let execution = state.engine.get_execution(&execution_id).await?;
        body["execution"] = serde_json::to_value(&execution).map_err(internal)?;
    }
    Ok(Json(body))
}

async fn cancel_execution(
    State(state): State<AppState>,
    Path((id, execution_id)): Path<(String, String)>,
) -> Result<Json<Value>, ServerError> {
    let current = state.engine.get_status(&execution_id).await?;
    if current.workflow_id != id {
        return Err(ServerError::NotFound(format!(
            "Execution {} not found for workflow {}",
            execution_id, id
        )));
    }
    let report = state.engine.cancel(&execution_id).await?;
    Ok(Json(serde_json::to_value(&report).map_err(internal)?))
}

fn internal(e: serde_json::Error) -> ServerError {
    ServerError::Internal(e.to_string())
}
