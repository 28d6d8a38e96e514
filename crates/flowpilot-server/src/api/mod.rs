pub mod agents;
pub mod templates;
pub mod tools;
pub mod workflows;

use axum::http::HeaderMap;
use axum::Router;

use flowpilot_core::state::AppState;

/// Header carrying the caller identity recorded on executions.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Build the complete API router with all sub-routes.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .nest("/api/workflows", workflows::router())
        .nest("/api/templates", templates::router())
        .nest("/api/agents", agents::router())
        .nest("/api/tools", tools::router())
}

fn caller_identity(headers: &HeaderMap) -> Option<String> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
