//! CLI command implementations.
//!
//! Each submodule corresponds to a top-level CLI command and reuses
//! the flowpilot-core domain logic through `AppState`.

pub mod agent;
pub mod server;
pub mod template;
pub mod tool;
pub mod workflow;

use flowpilot_core::agents::ModelClientConfig;
use flowpilot_core::state::AppState;
use flowpilot_core::workflow::{Context, ExecutionStatus, StepStatus, WorkflowExecution};
use flowpilot_server::ServerConfig;
use serde_json::Value;

/// Settings shared by every command that builds an `AppState`.
#[derive(Debug, Clone, Default)]
pub struct StateOptions {
    pub workflows_dir: Option<String>,
    pub templates_dir: Option<String>,
    pub strict_templates: bool,
    pub model: Option<ModelClientConfig>,
}

impl StateOptions {
    /// Server configuration carrying these options.
    pub fn server_config(&self, host: String, port: u16) -> ServerConfig {
        ServerConfig {
            host,
            port,
            workflows_dir: self.workflows_dir.clone(),
            templates_dir: self.templates_dir.clone(),
            strict_templates: self.strict_templates,
            model: self.model.clone(),
        }
    }
}

/// Build the model client settings from CLI flags; `None` without an API key.
pub fn model_config(
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
) -> Option<ModelClientConfig> {
    let api_key = api_key.filter(|k| !k.is_empty())?;
    let defaults = ModelClientConfig::default();
    Some(ModelClientConfig {
        api_key,
        base_url: base_url.unwrap_or(defaults.base_url),
        model: model.unwrap_or(defaults.model),
        timeout: defaults.timeout,
    })
}

/// Initialize a shared `AppState`.
///
/// This goes through `flowpilot_server::create_app_state` so the CLI and the
/// server see the same agents, tools and preloaded workflows.
pub async fn init_state(options: &StateOptions) -> Result<AppState, String> {
    let config = options.server_config(String::new(), 0);
    flowpilot_server::create_app_state(&config).await
}

/// Environment files read at startup, highest priority first.
pub const DOTENV_FILES: &[&str] = &[".env.local", ".env"];

/// Load each existing env file in order; variables that are already set win.
///
/// Returns the files that were loaded. This runs before tracing is set up,
/// so logging them is left to the caller.
pub fn load_dotenv<S: AsRef<str>>(filenames: &[S]) -> Vec<String> {
    filenames
        .iter()
        .map(|filename| filename.as_ref())
        .filter(|filename| dotenv::from_filename(filename).is_ok())
        .map(str::to_string)
        .collect()
}

/// Parse `key=value` pairs into a context. Values are read as JSON when they
/// parse, otherwise kept as plain strings.
pub fn parse_key_values(pairs: &[String]) -> Result<Context, String> {
    let mut context = Context::new();
    for pair in pairs {
        let (key, raw) = pair
            .split_once('=')
            .ok_or_else(|| format!("Expected key=value, got '{}'", pair))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(format!("Empty key in '{}'", pair));
        }
        let value = serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        context.insert(key.to_string(), value);
    }
    Ok(context)
}

/// Parse an optional JSON argument, defaulting to `null`.
pub fn parse_json_arg(raw: Option<&str>) -> Result<Value, String> {
    match raw {
        Some(s) => serde_json::from_str(s).map_err(|e| format!("Invalid JSON '{}': {}", s, e)),
        None => Ok(Value::Null),
    }
}

/// Pretty-print a JSON value to stdout.
pub fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
    );
}

/// Print a per-step report of a finished execution.
pub fn print_execution(execution: &WorkflowExecution) {
    println!("── Execution {} ──", execution.id);
    for (i, step) in execution.steps.iter().enumerate() {
        let marker = match step.status {
            StepStatus::Completed => "✅",
            StepStatus::Failed => "❌",
            _ => "⏸ ",
        };
        println!(
            "   {} {}/{} {} ({}) [{}]",
            marker,
            i + 1,
            execution.steps.len(),
            step.name(),
            step.template.agent_type,
            step.status.as_str()
        );
        if let Some(err) = &step.error {
            println!("      error: {}", err);
        }
    }
    println!(
        "   Status: {} ({}ms)",
        execution.status,
        execution.metadata.duration_ms.unwrap_or_default()
    );
}

/// Map a terminal execution to the CLI's exit result.
pub fn execution_result(execution: &WorkflowExecution) -> Result<(), String> {
    match execution.status {
        ExecutionStatus::Completed => Ok(()),
        _ => Err(execution
            .metadata
            .error
            .clone()
            .unwrap_or_else(|| format!("Execution {}", execution.status))),
    }
}
