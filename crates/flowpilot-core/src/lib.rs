//! Flowpilot Core — transport-agnostic workflow execution engine.
//!
//! This crate contains the engine, agent and tool contracts, the template
//! catalog and the in-memory stores. It has **no HTTP framework dependency**
//! by default, making it suitable for use in:
//!
//! - HTTP servers (via `flowpilot-server`)
//! - CLI tools (via `flowpilot-cli`)
//! - Embedding directly in another service
//!
//! # Feature Flags
//!
//! - `axum` — Enables `IntoResponse` impl on `ServerError` for use in axum handlers.

pub mod agents;
pub mod error;
pub mod state;
pub mod store;
pub mod tools;
pub mod workflow;

// Convenience re-exports
pub use error::{AgentError, EngineError, ServerError, TemplateError, ToolError};
pub use state::{AppState, AppStateInner};
pub use workflow::{EngineConfig, WorkflowDefinition, WorkflowEngine};
