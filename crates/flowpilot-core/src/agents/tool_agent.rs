//! Agent that dispatches its task straight to the tool registry.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::agents::{analyze_task, Agent, AgentConfig, AgentResponse, PlanStep, ToolCall};
use crate::error::AgentError;
use crate::tools::ToolRegistry;
use crate::workflow::schema::Context;

pub struct ToolAgent {
    id: String,
    agent_type: String,
    tools: Arc<ToolRegistry>,
}

impl ToolAgent {
    pub fn new(agent_type: &str, config: AgentConfig, tools: Arc<ToolRegistry>) -> Self {
        Self {
            id: config.id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            agent_type: agent_type.to_string(),
            tools,
        }
    }

    fn plan(calls: Vec<ToolCall>) -> Result<Vec<PlanStep>, AgentError> {
        if calls.is_empty() {
            return Err(AgentError::MalformedInput(
                "tool agent expects a 'tool' or 'tools' entry".to_string(),
            ));
        }
        Ok(calls.into_iter().map(PlanStep::Tool).collect())
    }
}

/// Run one tool call, turning an unsuccessful result into an agent error.
pub(crate) async fn run_tool(tools: &ToolRegistry, call: &ToolCall) -> Result<Value, AgentError> {
    tracing::debug!("[ToolAgent] Invoking tool '{}'", call.tool);
    let result = tools.execute(&call.tool, call.input.clone()).await?;
    if !result.success {
        return Err(AgentError::Task(format!(
            "tool '{}' failed: {}",
            call.tool,
            result.error.unwrap_or_else(|| "unknown error".to_string())
        )));
    }
    Ok(result.data.unwrap_or(Value::Null))
}

#[async_trait]
impl Agent for ToolAgent {
    fn id(&self) -> &str {
        &self.id
    }

    fn agent_type(&self) -> &str {
        &self.agent_type
    }

    async fn process_task(
        &mut self,
        task: &str,
        _context: &Context,
    ) -> Result<AgentResponse, AgentError> {
        let intent = analyze_task(task)?;
        let plan = Self::plan(intent.tool_calls)?;

        let mut outputs = Vec::with_capacity(plan.len());
        for step in &plan {
            if let PlanStep::Tool(call) = step {
                let data = run_tool(&self.tools, call).await?;
                outputs.push((call.tool.clone(), data));
            }
        }

        let output = if outputs.len() == 1 {
            outputs.remove(0).1
        } else {
            json!({
                "results": outputs
                    .into_iter()
                    .map(|(tool, data)| json!({ "tool": tool, "data": data }))
                    .collect::<Vec<_>>()
            })
        };

        Ok(AgentResponse::ok(output).with_metadata("toolCalls", json!(plan.len())))
    }
}
