//! Shared application state for the server and CLI.

use std::sync::Arc;

use crate::agents::{AgentFactory, ModelClient};
use crate::tools::ToolRegistry;
use crate::store::WorkflowStore;
use crate::workflow::{EngineConfig, TemplateCatalog, WorkflowEngine};

/// Shared state accessible by all API handlers and CLI commands.
pub struct AppStateInner {
    pub workflow_store: Arc<WorkflowStore>,
    pub engine: Arc<WorkflowEngine>,
    pub templates: TemplateCatalog,
    pub agent_factory: Arc<AgentFactory>,
    pub tool_registry: Arc<ToolRegistry>,
}

pub type AppState = Arc<AppStateInner>;

impl AppStateInner {
    /// Wire up the built-in tools, agents and templates.
    ///
    /// Model-backed agent types are only registered when `model` is given.
    pub fn new(config: EngineConfig, model: Option<Arc<dyn ModelClient>>) -> Self {
        let tool_registry = Arc::new(ToolRegistry::with_builtins());
        let agent_factory = Arc::new(AgentFactory::with_builtins(tool_registry.clone(), model));
        Self::with_components(config, tool_registry, agent_factory)
    }

    /// Build state around an existing registry and factory.
    pub fn with_components(
        config: EngineConfig,
        tool_registry: Arc<ToolRegistry>,
        agent_factory: Arc<AgentFactory>,
    ) -> Self {
        let workflow_store = Arc::new(WorkflowStore::new());
        let engine = Arc::new(WorkflowEngine::new(
            config,
            agent_factory.clone(),
            workflow_store.clone(),
        ));
        Self {
            workflow_store,
            engine,
            templates: TemplateCatalog::with_builtins(),
            agent_factory,
            tool_registry,
        }
    }
}

impl Default for AppStateInner {
    fn default() -> Self {
        Self::new(EngineConfig::default(), None)
    }
}
