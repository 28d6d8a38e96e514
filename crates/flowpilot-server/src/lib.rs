//! Flowpilot Server - Workflow Execution Engine HTTP API
//!
//! A thin axum adapter over `flowpilot-core`, providing:
//! - Workflow definition CRUD and template instantiation
//! - Execution start, status polling and cancellation
//! - Agent type and tool discovery
//!
//! This crate can be used standalone (`flowpilot server`) or embedded in
//! other applications via [`start_server_with_state`].

pub mod api;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use flowpilot_core::agents::{AnthropicClient, ModelClient, ModelClientConfig};
use flowpilot_core::state::{AppState, AppStateInner};
use flowpilot_core::workflow::EngineConfig;

/// Configuration for the Flowpilot server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Directory of YAML workflow definitions loaded at startup.
    pub workflows_dir: Option<String>,
    /// Directory of YAML workflow templates added to the built-in catalog.
    pub templates_dir: Option<String>,
    /// Fail steps on unresolved `{{placeholders}}` instead of substituting "".
    pub strict_templates: bool,
    /// Model API settings; model-backed agents are only registered when set.
    pub model: Option<ModelClientConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3220,
            workflows_dir: None,
            templates_dir: None,
            strict_templates: false,
            model: None,
        }
    }
}

/// Create a shared `AppState` from the server configuration.
///
/// This is useful when you need to share the state between the HTTP server
/// and other consumers (e.g. the CLI running a workflow in-process).
pub async fn create_app_state(config: &ServerConfig) -> Result<AppState, String> {
    let model: Option<Arc<dyn ModelClient>> = config.model.clone().map(|model_config| {
        tracing::info!(
            "Model-backed agents enabled (model: {}, base: {})",
            model_config.model,
            model_config.base_url
        );
        Arc::new(AnthropicClient::new(model_config)) as Arc<dyn ModelClient>
    });

    let engine_config = EngineConfig {
        strict_templates: config.strict_templates,
    };
    let state: AppState = Arc::new(AppStateInner::new(engine_config, model));

    if let Some(dir) = &config.workflows_dir {
        let count = state
            .workflow_store
            .load_dir(dir)
            .await
            .map_err(|e| format!("Failed to load workflows: {}", e))?;
        tracing::info!("Loaded {} workflow(s) from '{}'", count, dir);
    }

    if let Some(dir) = &config.templates_dir {
        let count = state
            .templates
            .load_dir(dir)
            .map_err(|e| format!("Failed to load templates: {}", e))?;
        tracing::info!("Loaded {} template(s) from '{}'", count, dir);
    }

    Ok(state)
}

/// Build the application router without binding it.
pub fn app_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(api::api_router())
        .route("/api/health", axum::routing::get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the Flowpilot server.
///
/// Returns the actual address the server is listening on.
pub async fn start_server(config: ServerConfig) -> Result<SocketAddr, String> {
    // Initialize tracing
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "flowpilot_server=info,flowpilot_core=info,tower_http=info".into()),
        )
        .try_init();

    tracing::info!(
        "Starting Flowpilot server on {}:{}",
        config.host,
        config.port
    );

    let state = create_app_state(&config).await?;

    start_server_with_state(config, state).await
}

/// Start the HTTP server with a pre-built `AppState`.
pub async fn start_server_with_state(
    config: ServerConfig,
    state: AppState,
) -> Result<SocketAddr, String> {
    let app = app_router(state);

    // Bind and serve
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| format!("Invalid address: {}", e))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind to {}: {}", addr, e))?;

    let local_addr = listener
        .local_addr()
        .map_err(|e| format!("Failed to get local address: {}", e))?;

    tracing::info!("Flowpilot server listening on {}", local_addr);

    // Spawn the server in a background task
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok(local_addr)
}

async fn health_check() -> axum::Json<serde_json::Value> {
    axum::Json(serde_json::json!({
        "status": "ok",
        "server": "flowpilot-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
