//! Model-backed agent.
//!
//! Runs the analyze ─► plan ─► execute ─► format cycle: requested tool calls
//! run first, then one model completion sees the instruction together with
//! the tool results.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::agents::tool_agent::run_tool;
use crate::agents::{
    analyze_task, Agent, AgentConfig, AgentResponse, ModelClient, ModelRequest, PlanStep,
    TaskIntent,
};
use crate::error::AgentError;
use crate::tools::ToolRegistry;
use crate::workflow::resolver::stringify;
use crate::workflow::schema::Context;

const RESERVED_FIELDS: &[&str] = &["task", "prompt", "instruction", "tool", "tools", "input"];

pub struct ModelAgent {
    id: String,
    agent_type: String,
    config: AgentConfig,
    client: Arc<dyn ModelClient>,
    tools: Arc<ToolRegistry>,
    initialized: bool,
}

impl ModelAgent {
    pub fn new(
        agent_type: &str,
        config: AgentConfig,
        client: Arc<dyn ModelClient>,
        tools: Arc<ToolRegistry>,
    ) -> Self {
        Self {
            id: config
                .id
                .clone()
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            agent_type: agent_type.to_string(),
            config,
            client,
            tools,
            initialized: false,
        }
    }

    fn system_prompt(&self) -> String {
        let role = self
            .config
            .role
            .clone()
            .unwrap_or_else(|| format!("{} agent", self.agent_type));
        let mut prompt = format!("You are a {} in a multi-step workflow.", role);
        if let Some(goal) = &self.config.goal {
            prompt.push_str(&format!("\nYour goal: {}", goal));
        }
        prompt.push_str("\nRespond with the finished result only.");
        prompt
    }

    fn plan(intent: TaskIntent) -> Result<Vec<PlanStep>, AgentError> {
        let prompt = match (&intent.payload, intent.instruction.is_empty()) {
            (Value::String(s), true) => s.clone(),
            (other, true) => other.to_string(),
            (Value::Object(fields), false) => {
                // Extra fields of a structured task become labelled prompt sections.
                let mut prompt = intent.instruction.clone();
                for (key, value) in fields {
                    if !RESERVED_FIELDS.contains(&key.as_str()) {
                        prompt.push_str(&format!("\n\n## {}\n{}", key, stringify(value)));
                    }
                }
                prompt
            }
            (_, false) => intent.instruction.clone(),
        };
        if prompt.trim().is_empty() {
            return Err(AgentError::MalformedInput("empty task".to_string()));
        }

        let mut plan: Vec<PlanStep> = intent.tool_calls.into_iter().map(PlanStep::Tool).collect();
        plan.push(PlanStep::Model { prompt });
        Ok(plan)
    }
}

#[async_trait]
impl Agent for ModelAgent {
    fn id(&self) -> &str {
        &self.id
    }

    fn agent_type(&self) -> &str {
        &self.agent_type
    }

    async fn initialize(&mut self) -> Result<(), AgentError> {
        if !self.initialized {
            tracing::debug!(
                "[ModelAgent] {} ({}) using model {}",
                self.id,
                self.agent_type,
                self.client.model()
            );
            self.initialized = true;
        }
        Ok(())
    }

    async fn process_task(
        &mut self,
        task: &str,
        _context: &Context,
    ) -> Result<AgentResponse, AgentError> {
        let intent = analyze_task(task)?;
        let plan = Self::plan(intent)?;

        let mut tool_results = Vec::new();
        let mut completion = None;
        for step in plan {
            match step {
                PlanStep::Tool(call) => {
                    let data = run_tool(&self.tools, &call).await?;
                    tool_results.push(json!({ "tool": call.tool, "data": data }));
                }
                PlanStep::Model { prompt } => {
                    let mut user_prompt = prompt;
                    if !tool_results.is_empty() {
                        user_prompt.push_str("\n\nTool results:\n");
                        user_prompt.push_str(&Value::Array(tool_results.clone()).to_string());
                    }
                    let request = ModelRequest::new(self.system_prompt(), user_prompt);
                    completion = Some(self.client.complete(request).await?);
                }
            }
        }

        let completion = completion
            .ok_or_else(|| AgentError::Task("plan produced no model step".to_string()))?;

        let mut response = AgentResponse::ok(Value::String(completion.content))
            .with_metadata("model", json!(completion.model));
        if !tool_results.is_empty() {
            response = response.with_metadata("toolResults", Value::Array(tool_results));
        }
        if let Some(usage) = completion.usage {
            response = response.with_metadata("usage", json!(usage));
        }
        Ok(response)
    }

    async fn cleanup(&mut self) {
        self.initialized = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::ModelResponse;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeClient {
        requests: Mutex<Vec<ModelRequest>>,
    }

    #[async_trait]
    impl ModelClient for FakeClient {
        fn model(&self) -> &str {
            "fake-model"
        }

        async fn complete(&self, request: ModelRequest) -> Result<ModelResponse, AgentError> {
            let content = format!("answer to: {}", request.user_prompt);
            self.requests.lock().unwrap().push(request);
            Ok(ModelResponse {
                content,
                model: "fake-model".to_string(),
                usage: None,
            })
        }
    }

    fn agent(client: Arc<FakeClient>) -> ModelAgent {
        ModelAgent::new(
            "research",
            AgentConfig {
                role: Some("Researcher".into()),
                goal: Some("Find facts".into()),
                ..Default::default()
            },
            client,
            Arc::new(ToolRegistry::with_builtins()),
        )
    }

    #[tokio::test]
    async fn test_free_text_goes_to_model() {
        let client = Arc::new(FakeClient::default());
        let mut agent = agent(client.clone());
        agent.initialize().await.unwrap();

        let response = agent
            .process_task("Research Rust", &Context::new())
            .await
            .unwrap();
        assert_eq!(response.output, json!("answer to: Research Rust"));
        assert_eq!(response.metadata["model"], json!("fake-model"));

        let requests = client.requests.lock().unwrap();
        assert!(requests[0].system_prompt.contains("Researcher"));
        assert!(requests[0].system_prompt.contains("Find facts"));
    }

    #[tokio::test]
    async fn test_tool_results_feed_the_prompt() {
        let client = Arc::new(FakeClient::default());
        let mut agent = agent(client.clone());
        let task = json!({
            "task": "Summarise",
            "tool": "word_count",
            "input": { "text": "one two three" }
        })
        .to_string();

        let response = agent.process_task(&task, &Context::new()).await.unwrap();
        assert!(response.metadata.contains_key("toolResults"));

        let requests = client.requests.lock().unwrap();
        assert!(requests[0].user_prompt.starts_with("Summarise"));
        assert!(requests[0].user_prompt.contains("\"words\":3"));
    }

    #[tokio::test]
    async fn test_structured_task_without_instruction_uses_payload() {
        let client = Arc::new(FakeClient::default());
        let mut agent = agent(client.clone());
        agent
            .process_task(r#"{"topic":"graphs"}"#, &Context::new())
            .await
            .unwrap();
        let requests = client.requests.lock().unwrap();
        assert!(requests[0].user_prompt.contains("graphs"));
    }

    #[tokio::test]
    async fn test_extra_fields_become_prompt_sections() {
        let client = Arc::new(FakeClient::default());
        let mut agent = agent(client.clone());
        let task = json!({ "task": "Review the draft", "draft": "Rust is fast." }).to_string();
        agent.process_task(&task, &Context::new()).await.unwrap();

        let requests = client.requests.lock().unwrap();
        assert_eq!(requests[0].user_prompt, "Review the draft\n\n## draft\nRust is fast.");
    }

    #[tokio::test]
    async fn test_empty_task_is_rejected() {
        let mut agent = agent(Arc::new(FakeClient::default()));
        let err = agent.process_task("   ", &Context::new()).await.unwrap_err();
        assert!(matches!(err, AgentError::MalformedInput(_)));
    }
}
