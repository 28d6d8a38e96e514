//! Tool registry — named, schema-validated capabilities invoked by agents.
//!
//! Every tool declares a JSON Schema for its input. The registry validates
//! the input against it before delegating, enforces an optional per-tool
//! rate limit, and converts implementation errors into a failed
//! [`ToolResult`] instead of propagating them.
//!
//! Registry-level failures (`NotFound`, `Validation`, `RateLimited`) are
//! returned as [`ToolError`] so the calling agent can report them.

pub mod builtin;
pub mod rate_limit;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;

use async_trait::async_trait;
use jsonschema::JSONSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ToolError;

pub use rate_limit::{RateLimit, RateLimiter};

/// Result of a tool operation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub duration_ms: u64,
}

impl ToolResult {
    pub fn success(data: impl Serialize) -> Self {
        Self {
            success: true,
            data: Some(serde_json::to_value(data).unwrap_or_default()),
            error: None,
            duration_ms: 0,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
            duration_ms: 0,
        }
    }
}

/// A narrowly-scoped executable capability.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON Schema the input must satisfy
    fn input_schema(&self) -> Value;

    /// Optional request limit enforced by the registry
    fn rate_limit(&self) -> Option<RateLimit> {
        None
    }

    async fn execute(&self, input: Value) -> Result<Value, String>;
}

/// Serializable view of a registered tool.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimit>,
}

struct RegisteredTool {
    tool: Arc<dyn Tool>,
    validator: JSONSchema,
    limiter: Option<RateLimiter>,
}

impl RegisteredTool {
    fn violations(&self, input: &Value) -> Vec<String> {
        match self.validator.validate(input) {
            Ok(()) => Vec::new(),
            Err(errors) => errors
                .map(|e| {
                    let path = e.instance_path.to_string();
                    let path = if path.is_empty() { "/".to_string() } else { path };
                    format!("{}: {}", path, e)
                })
                .collect(),
        }
    }
}

/// In-memory catalog of tools, shared by every agent of a process.
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, Arc<RegisteredTool>>>,
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
        }
    }

    /// A registry pre-populated with the built-in tools.
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        for tool in builtin::builtin_tools() {
            if let Err(e) = registry.register(tool) {
                tracing::error!("[ToolRegistry] Failed to register built-in tool: {}", e);
            }
        }
        registry
    }

    /// Register a tool. Re-registering a name replaces the previous tool.
    pub fn register(&self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        let schema = tool.input_schema();
        let validator = JSONSchema::compile(&schema).map_err(|e| ToolError::InvalidSchema {
            tool: name.clone(),
            message: e.to_string(),
        })?;
        let limiter = tool.rate_limit().map(RateLimiter::new);

        let entry = Arc::new(RegisteredTool {
            tool,
            validator,
            limiter,
        });

        let mut tools = self.tools.write().unwrap_or_else(|e| e.into_inner());
        if tools.insert(name.clone(), entry).is_some() {
            tracing::warn!("[ToolRegistry] Tool '{}' was already registered; overwriting", name);
        } else {
            tracing::debug!("[ToolRegistry] Registered tool '{}'", name);
        }
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools
            .read()
            .map(|t| t.contains_key(name))
            .unwrap_or(false)
    }

    /// Describe every registered tool, sorted by name.
    pub fn list(&self) -> Vec<ToolDescriptor> {
        let mut out: Vec<ToolDescriptor> = self
            .tools
            .read()
            .map(|tools| {
                tools
                    .values()
                    .map(|r| ToolDescriptor {
                        name: r.tool.name().to_string(),
                        description: r.tool.description().to_string(),
                        input_schema: r.tool.input_schema(),
                        rate_limit: r.limiter.as_ref().map(RateLimiter::limit),
                    })
                    .collect()
            })
            .unwrap_or_default();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        out
    }

    /// Validate, rate-limit and run a tool.
    pub async fn execute(&self, name: &str, input: Value) -> Result<ToolResult, ToolError> {
        let entry = self
            .tools
            .read()
            .ok()
            .and_then(|t| t.get(name).cloned())
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;

        let violations = entry.violations(&input);
        if !violations.is_empty() {
            return Err(ToolError::Validation {
                tool: name.to_string(),
                violations,
            });
        }

        if let Some(limiter) = &entry.limiter {
            if !limiter.try_acquire() {
                let limit = limiter.limit();
                tracing::warn!("[ToolRegistry] Rate limit exceeded for tool '{}'", name);
                return Err(ToolError::RateLimited {
                    tool: name.to_string(),
                    max_requests: limit.max_requests,
                    window_ms: limit.window.as_millis() as u64,
                });
            }
        }

        let started = Instant::now();
        let mut result = match entry.tool.execute(input).await {
            Ok(data) => ToolResult::success(data),
            Err(e) => {
                tracing::warn!("[ToolRegistry] Tool '{}' failed: {}", name, e);
                ToolResult::error(e)
            }
        };
        result.duration_ms = started.elapsed().as_millis() as u64;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    struct Upper {
        limit: Option<RateLimit>,
    }

    #[async_trait]
    impl Tool for Upper {
        fn name(&self) -> &str {
            "upper"
        }

        fn description(&self) -> &str {
            "Uppercase a string"
        }

        fn input_schema(&self) -> Value {
            json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string" },
                    "repeat": { "type": "integer", "minimum": 1 }
                },
                "required": ["text"]
            })
        }

        fn rate_limit(&self) -> Option<RateLimit> {
            self.limit
        }

        async fn execute(&self, input: Value) -> Result<Value, String> {
            let text = input["text"].as_str().unwrap_or_default();
            if text == "explode" {
                return Err("cannot uppercase explosions".to_string());
            }
            Ok(json!(text.to_uppercase()))
        }
    }

    fn registry(limit: Option<RateLimit>) -> ToolRegistry {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(Upper { limit })).unwrap();
        registry
    }

    #[tokio::test]
    async fn test_executes_registered_tool() {
        let registry = registry(None);
        let result = registry.execute("upper", json!({ "text": "hi" })).await.unwrap();
        assert!(result.success);
        assert_eq!(result.data, Some(json!("HI")));
    }

    #[tokio::test]
    async fn test_unknown_tool_is_not_found() {
        let registry = registry(None);
        let err = registry.execute("lower", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound(ref n) if n == "lower"));
    }

    #[tokio::test]
    async fn test_validation_reports_every_violation() {
        let registry = registry(None);
        let err = registry
            .execute("upper", json!({ "repeat": "twice" }))
            .await
            .unwrap_err();
        match err {
            ToolError::Validation { tool, violations } => {
                assert_eq!(tool, "upper");
                assert_eq!(violations.len(), 2, "{:?}", violations);
                assert!(violations.iter().any(|v| v.contains("text")));
                assert!(violations.iter().any(|v| v.starts_with("/repeat")));
            }
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_implementation_error_becomes_failed_result() {
        let registry = registry(None);
        let result = registry
            .execute("upper", json!({ "text": "explode" }))
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("cannot uppercase explosions"));
    }

    #[tokio::test]
    async fn test_rate_limit_counts_failures_and_resets_on_expiry() {
        let registry = registry(Some(RateLimit::new(2, Duration::from_millis(50))));

        // A failed call still consumes a slot.
        let failed = registry.execute("upper", json!({ "text": "explode" })).await.unwrap();
        assert!(!failed.success);
        registry.execute("upper", json!({ "text": "a" })).await.unwrap();

        let err = registry.execute("upper", json!({ "text": "b" })).await.unwrap_err();
        assert!(matches!(err, ToolError::RateLimited { max_requests: 2, .. }));

        tokio::time::sleep(Duration::from_millis(80)).await;
        assert!(registry.execute("upper", json!({ "text": "c" })).await.is_ok());
    }

    #[tokio::test]
    async fn test_reregistration_overwrites() {
        let registry = registry(None);
        registry
            .register(Arc::new(Upper {
                limit: Some(RateLimit::per_minute(1)),
            }))
            .unwrap();
        let tools = registry.list();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].rate_limit, Some(RateLimit::per_minute(1)));
    }
}
