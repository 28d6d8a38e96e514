use async_trait::async_trait;
use serde_json::{json, Value};

use crate::agents::{Agent, AgentConfig, AgentResponse};
use crate::error::AgentError;
use crate::workflow::schema::Context;

/// Returns its task as output (parsed as JSON when possible).
pub struct EchoAgent {
    id: String,
    agent_type: String,
    config: AgentConfig,
}

impl EchoAgent {
    pub fn new(agent_type: &str, config: AgentConfig) -> Self {
        Self {
            id: config
                .id
                .clone()
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            agent_type: agent_type.to_string(),
            config,
        }
    }
}

#[async_trait]
impl Agent for EchoAgent {
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
        let output = serde_json::from_str::<Value>(task).unwrap_or_else(|_| json!(task));
        let mut response = AgentResponse::ok(output);
        if let Some(role) = &self.config.role {
            response = response.with_metadata("role", json!(role));
        }
        Ok(response)
    }
}
