//! Agent factory — maps an agent-type tag to a constructor.
//!
//! Agents are never pooled: every call to [`AgentFactory::create_agent`]
//! builds a fresh, uninitialised instance.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, RwLock};

use crate::agents::{Agent, AgentConfig, EchoAgent, ModelAgent, ModelClient, ToolAgent};
use crate::error::AgentError;
use crate::tools::ToolRegistry;

pub type AgentConstructor = Arc<dyn Fn(AgentConfig) -> Box<dyn Agent> + Send + Sync>;

/// Tags served by the model-backed agent when a model client is configured.
pub const MODEL_AGENT_TYPES: &[&str] = &["chat", "research", "analysis", "writer", "review"];

pub struct AgentFactory {
    constructors: RwLock<HashMap<String, AgentConstructor>>,
}

impl Default for AgentFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentFactory {
    pub fn new() -> Self {
        Self {
            constructors: RwLock::new(HashMap::new()),
        }
    }

    /// A factory with the built-in agent types registered.
    ///
    /// `echo` and `tool` are always available; the model-backed types in
    /// [`MODEL_AGENT_TYPES`] only when a model client is supplied.
    pub fn with_builtins(tools: Arc<ToolRegistry>, model: Option<Arc<dyn ModelClient>>) -> Self {
        let factory = Self::new();

        factory.register_agent_type("echo", |config| Box::new(EchoAgent::new("echo", config)));

        let registry = tools.clone();
        factory.register_agent_type("tool", move |config| {
            Box::new(ToolAgent::new("tool", config, registry.clone()))
        });

        if let Some(client) = model {
            for &tag in MODEL_AGENT_TYPES {
                let client = client.clone();
                let tools = tools.clone();
                factory.register_agent_type(tag, move |config| {
                    Box::new(ModelAgent::new(tag, config, client.clone(), tools.clone()))
                });
            }
        }

        factory
    }

    /// Register a constructor. Re-registering a tag overwrites it with a warning.
    pub fn register_agent_type<F>(&self, tag: impl Into<String>, constructor: F)
    where
        F: Fn(AgentConfig) -> Box<dyn Agent> + Send + Sync + 'static,
    {
        let tag = tag.into();
        let mut constructors = self.constructors.write().unwrap_or_else(|e| e.into_inner());
        if constructors.insert(tag.clone(), Arc::new(constructor)).is_some() {
            tracing::warn!("[AgentFactory] Agent type '{}' was already registered; overwriting", tag);
        } else {
            tracing::debug!("[AgentFactory] Registered agent type '{}'", tag);
        }
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.constructors
            .read()
            .map(|c| c.contains_key(tag))
            .unwrap_or(false)
    }

    /// Build a fresh agent for `tag`, assigning a generated id when the config has none.
    pub fn create_agent(&self, tag: &str, mut config: AgentConfig) -> Result<Box<dyn Agent>, AgentError> {
        let constructor = self
            .constructors
            .read()
            .ok()
            .and_then(|c| c.get(tag).cloned())
            .ok_or_else(|| AgentError::UnknownAgentType {
                tag: tag.to_string(),
                registered: self.list_registered_types().into_iter().collect(),
            })?;

        if config.id.is_none() {
            config.id = Some(uuid::Uuid::new_v4().to_string());
        }
        Ok(constructor(config))
    }

    pub fn list_registered_types(&self) -> BTreeSet<String> {
        self.constructors
            .read()
            .map(|c| c.keys().cloned().collect())
            .unwrap_or_default()
    }
}
