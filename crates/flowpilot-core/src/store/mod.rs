pub mod execution_store;
pub mod workflow_store;

pub use execution_store::{ExecutionHandle, ExecutionStore};
pub use workflow_store::WorkflowStore;
