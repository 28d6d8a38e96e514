//! Runtime records for workflow executions.
//!
//! A [`WorkflowExecution`] is created per invocation from an immutable
//! [`WorkflowDefinition`] and is mutated only by the engine while it runs.
//! Once its status is terminal it is never modified again.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::workflow::schema::{Context, StepTemplate, WorkflowDefinition};

/// Overall execution status.
///
/// `pending → running → {completed | failed | cancelled}`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-step status: `pending → in-progress → {completed | failed}`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl StepStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
}

/// A step template augmented with mutable runtime fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepInstance {
    #[serde(flatten)]
    pub template: StepTemplate,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_input: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub metadata: StepMetadata,
}

impl StepInstance {
    pub fn from_template(template: &StepTemplate) -> Self {
        Self {
            template: template.clone(),
            status: StepStatus::Pending,
            resolved_input: None,
            output: None,
            error: None,
            metadata: StepMetadata::default(),
        }
    }

    pub fn id(&self) -> &str {
        &self.template.id
    }

    pub fn name(&self) -> &str {
        &self.template.name
    }

    pub(crate) fn start(&mut self) {
        self.status = StepStatus::InProgress;
        self.metadata.started_at = Some(Utc::now());
    }

    pub(crate) fn complete(&mut self, output: serde_json::Value) {
        self.status = StepStatus::Completed;
        self.output = Some(output);
        self.finish_timing();
    }

    pub(crate) fn fail(&mut self, error: impl Into<String>) {
        self.status = StepStatus::Failed;
        self.error = Some(error.into());
        self.finish_timing();
    }

    fn finish_timing(&mut self) {
        let now = Utc::now();
        self.metadata.completed_at = Some(now);
        self.metadata.duration_ms = self
            .metadata
            .started_at
            .map(|start| (now - start).num_milliseconds());
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionMetadata {
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step_id: Option<String>,
}

/// One run of a workflow definition.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowExecution {
    pub id: String,
    #[serde(rename = "workflowId", serialize_with = "serialize_definition_id")]
    pub definition: Arc<WorkflowDefinition>,
    pub steps: Vec<StepInstance>,
    pub status: ExecutionStatus,
    /// Outputs keyed by step id; entries are never removed.
    pub results: HashMap<String, serde_json::Value>,
    pub context: Context,
    pub metadata: ExecutionMetadata,
}

fn serialize_definition_id<S>(def: &Arc<WorkflowDefinition>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&def.id)
}

impl WorkflowExecution {
    /// Build a pending execution.
    ///
    /// Context precedence, lowest first: definition defaults, execution input
    /// (object keys plus the whole value under `input`), caller context.
    pub fn new(
        definition: Arc<WorkflowDefinition>,
        input: serde_json::Value,
        caller_context: Context,
        created_by: Option<String>,
    ) -> Self {
        let mut context = definition.context.clone();
        if let serde_json::Value::Object(map) = &input {
            for (key, value) in map {
                context.insert(key.clone(), value.clone());
            }
        }
        if !input.is_null() {
            context.insert("input".to_string(), input);
        }
        context.extend(caller_context);

        let steps = definition.steps.iter().map(StepInstance::from_template).collect();

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            definition,
            steps,
            status: ExecutionStatus::Pending,
            results: HashMap::new(),
            context,
            metadata: ExecutionMetadata {
                created_at: Utc::now(),
                started_at: None,
                completed_at: None,
                duration_ms: None,
                created_by,
                error: None,
                current_step_id: None,
            },
        }
    }

    pub fn workflow_id(&self) -> &str {
        &self.definition.id
    }

    pub fn completed_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .count()
    }

    /// The step currently handed to an agent, if any.
    pub fn current_step(&self) -> Option<&StepInstance> {
        let id = self.metadata.current_step_id.as_deref()?;
        self.steps
            .iter()
            .find(|s| s.id() == id && s.status == StepStatus::InProgress)
    }

    pub(crate) fn mark_running(&mut self) {
        self.status = ExecutionStatus::Running;
        if self.metadata.started_at.is_none() {
            self.metadata.started_at = Some(Utc::now());
        }
    }

    /// Move into a terminal status and freeze timing. No-op when already terminal.
    pub(crate) fn finish(&mut self, status: ExecutionStatus, error: Option<String>) {
        if self.status.is_terminal() {
            return;
        }
        let now = Utc::now();
        self.status = status;
        self.metadata.error = error;
        self.metadata.current_step_id = None;
        self.metadata.completed_at = Some(now);
        self.metadata.duration_ms = Some(
            (now - self.metadata.started_at.unwrap_or(self.metadata.created_at)).num_milliseconds(),
        );
    }

    pub fn outcome(&self) -> ExecutionOutcome {
        let success = self.status == ExecutionStatus::Completed;
        ExecutionOutcome {
            success,
            execution_id: self.id.clone(),
            status: self.status,
            result: success.then(|| self.results.clone()),
            error: self.metadata.error.clone(),
        }
    }

    pub fn status_report(&self) -> ExecutionStatusReport {
        let progress = (self.status == ExecutionStatus::Running)
            .then(|| self.current_step())
            .flatten()
            .map(|step| ExecutionProgress {
                step_id: step.id().to_string(),
                name: step.name().to_string(),
                completed: self.completed_steps(),
                total: self.steps.len(),
            });

        ExecutionStatusReport {
            success: true,
            execution_id: self.id.clone(),
            workflow_id: self.workflow_id().to_string(),
            status: self.status,
            error: self.metadata.error.clone(),
            progress,
            metadata: self.metadata.clone(),
        }
    }

    pub fn summary(&self) -> ExecutionSummary {
        ExecutionSummary {
            execution_id: self.id.clone(),
            workflow_id: self.workflow_id().to_string(),
            workflow_name: self.definition.name.clone(),
            status: self.status,
            completed_steps: self.completed_steps(),
            total_steps: self.steps.len(),
            created_at: self.metadata.created_at,
        }
    }
}

/// Result of `run`: either the full results mapping or the error message.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionOutcome {
    pub success: bool,
    pub execution_id: String,
    pub status: ExecutionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<HashMap<String, serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionProgress {
    pub step_id: String,
    pub name: String,
    pub completed: usize,
    pub total: usize,
}

/// Read-only view returned by `get_status`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionStatusReport {
    pub success: bool,
    pub execution_id: String,
    pub workflow_id: String,
    pub status: ExecutionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<ExecutionProgress>,
    pub metadata: ExecutionMetadata,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSummary {
    pub execution_id: String,
    pub workflow_id: String,
    pub workflow_name: String,
    pub status: ExecutionStatus,
    pub completed_steps: usize,
    pub total_steps: usize,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn definition() -> Arc<WorkflowDefinition> {
        let mut defaults = Context::new();
        defaults.insert("tone".into(), json!("formal"));
        defaults.insert("topic".into(), json!("default topic"));
        Arc::new(
            WorkflowDefinition::new(
                "two steps",
                vec![
                    StepTemplate::new("a", "A", "echo", json!("{{topic}}")),
                    StepTemplate::new("b", "B", "echo", json!("{{step_a}}")),
                ],
            )
            .with_context(defaults),
        )
    }

    #[test]
    fn test_context_merge_precedence() {
        let mut caller = Context::new();
        caller.insert("tone".into(), json!("casual"));

        let exec = WorkflowExecution::new(
            definition(),
            json!({ "topic": "rust" }),
            caller,
            Some("user-1".into()),
        );

        assert_eq!(exec.status, ExecutionStatus::Pending);
        assert_eq!(exec.context["topic"], json!("rust"));
        assert_eq!(exec.context["tone"], json!("casual"));
        assert_eq!(exec.context["input"], json!({ "topic": "rust" }));
        assert_eq!(exec.metadata.created_by.as_deref(), Some("user-1"));
        assert!(exec.steps.iter().all(|s| s.status == StepStatus::Pending));
    }

    #[test]
    fn test_finish_freezes_timing() {
        let mut exec = WorkflowExecution::new(definition(), json!(null), Context::new(), None);
        exec.mark_running();
        exec.finish(ExecutionStatus::Failed, Some("boom".into()));
        let completed_at = exec.metadata.completed_at;

        exec.finish(ExecutionStatus::Completed, None);
        assert_eq!(exec.status, ExecutionStatus::Failed);
        assert_eq!(exec.metadata.completed_at, completed_at);
        assert_eq!(exec.metadata.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_serializes_step_status_in_kebab_case() {
        let mut exec = WorkflowExecution::new(definition(), json!(null), Context::new(), None);
        exec.steps[0].start();
        let value = serde_json::to_value(&exec).unwrap();
        assert_eq!(value["steps"][0]["status"], json!("in-progress"));
        assert_eq!(value["steps"][0]["agentType"], json!("echo"));
        assert_eq!(value["workflowId"], json!(exec.definition.id));
    }

    #[test]
    fn test_progress_only_reports_step_in_progress() {
        let mut exec = WorkflowExecution::new(definition(), json!(null), Context::new(), None);
        exec.mark_running();
        exec.metadata.current_step_id = Some("a".into());
        exec.steps[0].start();

        let progress = exec.status_report().progress.unwrap();
        assert_eq!(progress.step_id, "a");
        assert_eq!(progress.completed, 0);

        // Between steps: "a" is done and "b" has not started yet
        exec.steps[0].complete(json!("done"));
        let report = exec.status_report();
        assert_eq!(report.status, ExecutionStatus::Running);
        assert!(report.progress.is_none());
    }
}
