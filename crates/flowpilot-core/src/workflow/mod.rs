//! Workflow engine — sequential, fail-fast multi-step agent orchestration.
//!
//! # Architecture
//!
//! ```text
//! TemplateCatalog ──instantiate──► WorkflowDefinition ◄── workflow.yaml
//!                                        │
//!                              create_execution(input, context)
//!                                        ▼
//!                                WorkflowExecution ──► WorkflowEngine::run
//!                                                           │
//!                                          resolver ({{key}} substitution)
//!                                                           │
//!                                                AgentFactory ─► Agent
//! ```

pub mod execution;
pub mod executor;
pub mod resolver;
pub mod schema;
pub mod templates;

pub use execution::{
    ExecutionOutcome, ExecutionProgress, ExecutionStatus, ExecutionStatusReport, ExecutionSummary,
    StepInstance, StepStatus, WorkflowExecution,
};
pub use executor::{EngineConfig, StartOutcome, WorkflowEngine};
pub use resolver::{resolve_str, resolve_value, ResolveError, ResolveMode};
pub use schema::{Context, StepTemplate, WorkflowDefinition};
pub use templates::{TemplateCatalog, TemplateParameter, WorkflowTemplate};
