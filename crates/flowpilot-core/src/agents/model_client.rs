//! Model client — completes prompts for model-backed agents.
//!
//! The engine does not depend on any specific provider. Agents talk to a
//! [`ModelClient`]; [`AnthropicClient`] implements it over HTTP for any
//! Anthropic-compatible Messages API.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AgentError;

#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub system_prompt: String,
    pub user_prompt: String,
    pub max_tokens: u32,
    pub temperature: Option<f64>,
}

impl ModelRequest {
    pub fn new(system_prompt: impl Into<String>, user_prompt: impl Into<String>) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            user_prompt: user_prompt.into(),
            max_tokens: 4096,
            temperature: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageInfo {
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResponse {
    pub content: String,
    pub model: String,
    pub usage: Option<UsageInfo>,
}

#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Model id used for requests
    fn model(&self) -> &str;

    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse, AgentError>;
}

/// Connection settings for [`AnthropicClient`].
#[derive(Debug, Clone)]
pub struct ModelClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub timeout: Duration,
}

impl Default for ModelClientConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.anthropic.com".to_string(),
            api_key: String::new(),
            model: "claude-sonnet-4-20250514".to_string(),
            timeout: Duration::from_secs(300),
        }
    }
}

impl ModelClientConfig {
    /// Read `ANTHROPIC_API_KEY` (or `ANTHROPIC_AUTH_TOKEN`), `ANTHROPIC_BASE_URL`
    /// and `ANTHROPIC_MODEL`. Returns `None` when no key is set.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY")
            .or_else(|_| std::env::var("ANTHROPIC_AUTH_TOKEN"))
            .ok()
            .filter(|k| !k.is_empty())?;

        let defaults = Self::default();
        Some(Self {
            base_url: std::env::var("ANTHROPIC_BASE_URL").unwrap_or(defaults.base_url),
            model: std::env::var("ANTHROPIC_MODEL").unwrap_or(defaults.model),
            api_key,
            timeout: defaults.timeout,
        })
    }
}

/// Calls the Anthropic-compatible Messages API.
///
/// POST {base_url}/v1/messages
/// Headers:
///   x-api-key: {api_key}
///   anthropic-version: 2023-06-01
pub struct AnthropicClient {
    client: reqwest::Client,
    config: ModelClientConfig,
}

impl AnthropicClient {
    pub fn new(config: ModelClientConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(config.timeout)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            config,
        }
    }

    fn request_body(&self, request: &ModelRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.config.model,
            "max_tokens": request.max_tokens,
            "messages": [
                { "role": "user", "content": request.user_prompt }
            ]
        });

        if !request.system_prompt.is_empty() {
            body["system"] = serde_json::Value::String(request.system_prompt.clone());
        }

        if let Some(temp) = request.temperature {
            body["temperature"] = serde_json::Value::Number(
                serde_json::Number::from_f64(temp).unwrap_or_else(|| serde_json::Number::from(0)),
            );
        }
        body
    }
}

/// Extract the text blocks and usage from a Messages API response.
fn parse_messages_response(json: &serde_json::Value, fallback_model: &str) -> ModelResponse {
    let content = json
        .get("content")
        .and_then(|c| c.as_array())
        .and_then(|arr| {
            arr.iter()
                .filter(|block| block.get("type").and_then(|t| t.as_str()) == Some("text"))
                .filter_map(|block| block.get("text").and_then(|t| t.as_str()))
                .map(str::to_string)
                .reduce(|a, b| format!("{}\n{}", a, b))
        })
        .unwrap_or_default();

    let usage = json.get("usage").map(|u| UsageInfo {
        input_tokens: u.get("input_tokens").and_then(|v| v.as_u64()),
        output_tokens: u.get("output_tokens").and_then(|v| v.as_u64()),
    });

    let model = json
        .get("model")
        .and_then(|m| m.as_str())
        .unwrap_or(fallback_model)
        .to_string();

    ModelResponse {
        content,
        model,
        usage,
    }
}

#[async_trait]
impl ModelClient for AnthropicClient {
    fn model(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, request: ModelRequest) -> Result<ModelResponse, AgentError> {
        let url = format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'));
        let body = self.request_body(&request);

        tracing::info!("[ModelClient] POST {} (model: {})", url, self.config.model);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AgentError::Model(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| AgentError::Model(format!("failed to read response body: {}", e)))?;

        if !status.is_success() {
            return Err(AgentError::Model(format!(
                "API returned {}: {}",
                status, response_text
            )));
        }

        let json: serde_json::Value = serde_json::from_str(&response_text)
            .map_err(|e| AgentError::Model(format!("failed to parse response JSON: {}", e)))?;

        Ok(parse_messages_response(&json, &self.config.model))
    }
}
