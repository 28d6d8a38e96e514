use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::error::EngineError;
use crate::workflow::schema::WorkflowDefinition;

/// In-memory store of immutable workflow definitions.
#[derive(Default)]
pub struct WorkflowStore {
    workflows: RwLock<HashMap<String, Arc<WorkflowDefinition>>>,
}

impl WorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and store a definition, replacing any with the same id.
    pub async fn save(&self, definition: WorkflowDefinition) -> Result<Arc<WorkflowDefinition>, EngineError> {
        definition.validate()?;
        let definition = Arc::new(definition);
        let previous = self
            .workflows
            .write()
            .await
            .insert(definition.id.clone(), definition.clone());
        if previous.is_some() {
            tracing::warn!("[WorkflowStore] Replaced workflow '{}'", definition.id);
        } else {
            tracing::debug!("[WorkflowStore] Saved workflow '{}' ({})", definition.id, definition.name);
        }
        Ok(definition)
    }

    pub async fn get(&self, id: &str) -> Option<Arc<WorkflowDefinition>> {
        self.workflows.read().await.get(id).cloned()
    }

    /// All workflows, oldest first.
    pub async fn list(&self) -> Vec<Arc<WorkflowDefinition>> {
        let mut workflows: Vec<_> = self.workflows.read().await.values().cloned().collect();
        workflows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        workflows
    }

    /// Remove a definition. Executions already holding it are unaffected.
    pub async fn remove(&self, id: &str) -> Option<Arc<WorkflowDefinition>> {
        self.workflows.write().await.remove(id)
    }

    /// Load every `.yaml`/`.yml` workflow in a directory.
    pub async fn load_dir(&self, dir: impl AsRef<Path>) -> Result<usize, EngineError> {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            return Err(EngineError::InvalidDefinition(format!(
                "workflow directory '{}' does not exist",
                dir.display()
            )));
        }

        let mut paths: Vec<_> = std::fs::read_dir(dir)
            .map_err(|e| {
                EngineError::InvalidDefinition(format!(
                    "failed to read directory '{}': {}",
                    dir.display(),
                    e
                ))
            })?
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                matches!(
                    path.extension().and_then(|e| e.to_str()),
                    Some("yaml") | Some("yml")
                )
            })
            .collect();
        paths.sort();

        let mut count = 0;
        for path in paths {
            let definition = WorkflowDefinition::from_file(&path)?;
            tracing::info!(
                "[WorkflowStore] Loaded workflow: {} ({}) from {}",
                definition.id,
                definition.name,
                path.display()
            );
            self.save(definition).await?;
            count += 1;
        }
        Ok(count)
    }
}
