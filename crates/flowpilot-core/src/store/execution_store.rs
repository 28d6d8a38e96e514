use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

use crate::workflow::execution::WorkflowExecution;

/// Shared handle to one execution record and its cancellation token.
///
/// Each record sits behind its own lock so concurrent executions never
/// contend with each other.
#[derive(Clone)]
pub struct ExecutionHandle {
    pub execution: Arc<RwLock<WorkflowExecution>>,
    pub cancel: CancellationToken,
}

/// In-memory execution table. Records live for the lifetime of the process.
#[derive(Default)]
pub struct ExecutionStore {
    executions: RwLock<HashMap<String, ExecutionHandle>>,
}

impl ExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, execution: WorkflowExecution) -> ExecutionHandle {
        let id = execution.id.clone();
        let handle = ExecutionHandle {
            execution: Arc::new(RwLock::new(execution)),
            cancel: CancellationToken::new(),
        };
        self.executions.write().await.insert(id, handle.clone());
        handle
    }

    pub async fn get(&self, id: &str) -> Option<ExecutionHandle> {
        self.executions.read().await.get(id).cloned()
    }

    pub async fn list(&self) -> Vec<ExecutionHandle> {
        self.executions.read().await.values().cloned().collect()
    }
}
