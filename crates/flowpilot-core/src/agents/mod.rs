//! Agents — units of work that a workflow step is delegated to.
//!
//! ```text
//! StepTemplate.agent_type ──► AgentFactory ──► Box<dyn Agent>
//!                                                 │
//!                    analyze ─► plan ─► execute ─► format
//!                                         │
//!                                    ToolRegistry / ModelClient
//! ```
//!
//! The engine creates one fresh agent per step invocation and drops it once
//! the step finishes; agents never carry state from one step to the next.

pub mod echo;
pub mod factory;
pub mod model_agent;
pub mod model_client;
pub mod tool_agent;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::AgentError;
use crate::workflow::schema::Context;

pub use echo::EchoAgent;
pub use factory::{AgentConstructor, AgentFactory};
pub use model_agent::ModelAgent;
pub use model_client::{AnthropicClient, ModelClient, ModelClientConfig, ModelRequest, ModelResponse};
pub use tool_agent::ToolAgent;

/// Construction-time configuration for an agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    /// Agent id; the factory generates one when absent
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub goal: Option<String>,
    /// Free-form agent-specific settings
    #[serde(default)]
    pub settings: HashMap<String, Value>,
}

/// Structured result of `process_task`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResponse {
    pub success: bool,
    pub output: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl AgentResponse {
    pub fn ok(output: Value) -> Self {
        Self {
            success: true,
            output,
            error: None,
            metadata: HashMap::new(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: Value::Null,
            error: Some(error.into()),
            metadata: HashMap::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }
}

/// Capability contract every agent implements.
#[async_trait]
pub trait Agent: Send {
    fn id(&self) -> &str;

    /// The tag this agent was created for
    fn agent_type(&self) -> &str;

    /// Idempotent setup.
    async fn initialize(&mut self) -> Result<(), AgentError> {
        Ok(())
    }

    async fn process_task(
        &mut self,
        task: &str,
        context: &Context,
    ) -> Result<AgentResponse, AgentError>;

    /// Release per-agent state. Safe to call without `initialize`.
    async fn cleanup(&mut self) {}
}

/// One tool invocation requested by a task.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub tool: String,
    pub input: Value,
}

/// Structured reading of a serialized task.
///
/// A task is either free text, or a JSON object with any of:
/// `task` / `prompt` / `instruction` (text), `tool` + `input` (one tool call),
/// `tools` (array of `{ "tool" | "name", "input" }`).
#[derive(Debug, Clone, PartialEq)]
pub struct TaskIntent {
    pub instruction: String,
    pub tool_calls: Vec<ToolCall>,
    pub payload: Value,
}

/// One entry of an agent's execution plan.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanStep {
    Tool(ToolCall),
    Model { prompt: String },
}

pub fn analyze_task(task: &str) -> Result<TaskIntent, AgentError> {
    let payload = match serde_json::from_str::<Value>(task) {
        Ok(value @ Value::Object(_)) => value,
        _ => {
            return Ok(TaskIntent {
                instruction: task.trim().to_string(),
                tool_calls: Vec::new(),
                payload: Value::String(task.to_string()),
            })
        }
    };

    let instruction = ["task", "prompt", "instruction"]
        .iter()
        .find_map(|k| payload.get(*k).and_then(Value::as_str))
        .unwrap_or_default()
        .to_string();

    let mut tool_calls = Vec::new();
    if let Some(name) = payload.get("tool") {
        let tool = name
            .as_str()
            .ok_or_else(|| AgentError::MalformedInput("'tool' must be a string".to_string()))?;
        tool_calls.push(ToolCall {
            tool: tool.to_string(),
            input: payload.get("input").cloned().unwrap_or(Value::Null),
        });
    }
    if let Some(list) = payload.get("tools") {
        let list = list
            .as_array()
            .ok_or_else(|| AgentError::MalformedInput("'tools' must be an array".to_string()))?;
        for (i, entry) in list.iter().enumerate() {
            let tool = entry
                .get("tool")
                .or_else(|| entry.get("name"))
                .and_then(Value::as_str)
                .ok_or_else(|| {
                    AgentError::MalformedInput(format!("tools[{}] is missing a tool name", i))
                })?;
            tool_calls.push(ToolCall {
                tool: tool.to_string(),
                input: entry.get("input").cloned().unwrap_or(Value::Null),
            });
        }
    }

    Ok(TaskIntent {
        instruction,
        tool_calls,
        payload,
    })
}
