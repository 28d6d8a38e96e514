//! Core error types for the Flowpilot engine.
//!
//! Each concern owns its own error enum (`EngineError`, `AgentError`,
//! `ToolError`, `TemplateError`). `ServerError` is the transport-facing error
//! used by the HTTP and CLI adapters. When the `axum` feature is enabled, it
//! also implements `IntoResponse` so it can be used directly as an axum
//! handler error type.

/// Errors raised by the tool registry.
///
/// These surface inside an agent's tool calls; the engine reports them as the
/// failing step's error instead of treating them as engine faults.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Invalid input for tool '{tool}': {}", .violations.join("; "))]
    Validation { tool: String, violations: Vec<String> },

    #[error("Rate limit exceeded for tool '{tool}': max {max_requests} requests per {window_ms}ms")]
    RateLimited {
        tool: String,
        max_requests: u32,
        window_ms: u64,
    },

    #[error("Invalid schema for tool '{tool}': {message}")]
    InvalidSchema { tool: String, message: String },
}

/// Errors raised while constructing or running an agent.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AgentError {
    #[error("Unknown agent type: '{tag}'. Registered: [{}]", .registered.join(", "))]
    UnknownAgentType { tag: String, registered: Vec<String> },

    #[error("Agent task failed: {0}")]
    Task(String),

    #[error("Malformed task input: {0}")]
    MalformedInput(String),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error("Model call failed: {0}")]
    Model(String),
}

/// Errors raised by the workflow template catalog.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TemplateError {
    #[error("Unknown workflow template: {0}")]
    UnknownTemplate(String),

    #[error("Template '{template}' is missing required parameters: {}", .missing.join(", "))]
    MissingParameters {
        template: String,
        missing: Vec<String>,
    },
}

/// Errors returned directly to callers of the execution engine.
///
/// Failures that happen while a step runs are never returned through this
/// type; they are recorded on the execution instead.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    #[error("Unknown workflow: {0}")]
    UnknownWorkflow(String),

    #[error("Unknown execution: {0}")]
    UnknownExecution(String),

    #[error("Invalid workflow definition: {0}")]
    InvalidDefinition(String),

    #[error("Execution {0} is already running")]
    AlreadyRunning(String),

    #[error(transparent)]
    Template(#[from] TemplateError),
}

/// Transport-facing error used by the server and CLI adapters.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Too many requests: {0}")]
    TooManyRequests(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<EngineError> for ServerError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::UnknownWorkflow(_) | EngineError::UnknownExecution(_) => {
                ServerError::NotFound(err.to_string())
            }
            EngineError::InvalidDefinition(_) => ServerError::BadRequest(err.to_string()),
            EngineError::AlreadyRunning(_) => ServerError::Conflict(err.to_string()),
            EngineError::Template(inner) => inner.into(),
        }
    }
}

impl From<TemplateError> for ServerError {
    fn from(err: TemplateError) -> Self {
        match err {
            TemplateError::UnknownTemplate(_) => ServerError::NotFound(err.to_string()),
            TemplateError::MissingParameters { .. } => ServerError::BadRequest(err.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// axum integration (opt-in via feature flag)
// ---------------------------------------------------------------------------

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for ServerError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let (status, message) = match &self {
            ServerError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ServerError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ServerError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            ServerError::TooManyRequests(msg) => (StatusCode::TOO_MANY_REQUESTS, msg.clone()),
            ServerError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
        };

        let body = serde_json::json!({ "success": false, "error": message });
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_engine_errors_map_to_transport_errors() {
        let err: ServerError = EngineError::UnknownExecution("abc".into()).into();
        assert!(matches!(err, ServerError::NotFound(_)));

        let err: ServerError = EngineError::AlreadyRunning("abc".into()).into();
        assert!(matches!(err, ServerError::Conflict(_)));

        let err: ServerError = EngineError::Template(TemplateError::MissingParameters {
            template: "research-report".into(),
            missing: vec!["topic".into()],
        })
        .into();
        assert!(matches!(err, ServerError::BadRequest(_)));
    }

    #[test]
    fn test_validation_error_lists_every_violation() {
        let err = ToolError::Validation {
            tool: "word_count".into(),
            violations: vec!["/text: required".into(), "/limit: not an integer".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("/text: required"));
        assert!(msg.contains("/limit: not an integer"));
    }
}
