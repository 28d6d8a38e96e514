//! Schema types for workflow definitions.
//!
//! A definition is an immutable blueprint: an ordered list of step templates
//! plus a default context. Definitions are usually produced by the template
//! catalog, but they can also be authored directly in YAML (or JSON):
//!
//! ```yaml
//! id: "weekly-digest"
//! name: "Weekly Digest"
//! description: "Summarise and review a batch of notes"
//!
//! context:
//!   audience: "engineering"
//!
//! steps:
//!   - id: "summarise"
//!     name: "Summarise notes"
//!     agent_type: "writer"
//!     role: "Technical writer"
//!     goal: "Produce a short digest"
//!     input:
//!       task: "Summarise for {{audience}}: {{notes}}"
//!
//!   - id: "review"
//!     name: "Review digest"
//!     agent_type: "review"
//!     input: "Review this digest: {{step_summarise}}"
//! ```

use std::collections::{HashMap, HashSet};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Runtime context mapping shared between steps of an execution.
pub type Context = HashMap<String, serde_json::Value>;

/// Immutable workflow blueprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowDefinition {
    /// Workflow id (generated when omitted)
    #[serde(default = "new_id")]
    pub id: String,

    /// Workflow name
    pub name: String,

    /// Optional description
    #[serde(default)]
    pub description: Option<String>,

    /// Ordered list of step templates
    pub steps: Vec<StepTemplate>,

    /// Default context merged into every execution
    #[serde(default, alias = "default_context")]
    pub context: Context,

    #[serde(default = "Utc::now", alias = "created_at")]
    pub created_at: DateTime<Utc>,

    #[serde(default = "Utc::now", alias = "updated_at")]
    pub updated_at: DateTime<Utc>,
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// A single step in a workflow blueprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepTemplate {
    /// Step id (unique within the workflow, used for `step_<id>` references)
    pub id: String,

    /// Human-readable name
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Agent-type tag resolved through the agent factory
    #[serde(alias = "agent_type")]
    pub agent_type: String,

    /// Declarative input; string leaves may contain `{{identifier}}` placeholders
    #[serde(default)]
    pub input: serde_json::Value,

    /// Passed through to the agent, never interpreted by the engine
    #[serde(default)]
    pub role: Option<String>,

    /// Passed through to the agent, never interpreted by the engine
    #[serde(default)]
    pub goal: Option<String>,
}

impl StepTemplate {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        agent_type: impl Into<String>,
        input: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            agent_type: agent_type.into(),
            input,
            role: None,
            goal: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_role(mut self, role: impl Into<String>, goal: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self.goal = Some(goal.into());
        self
    }
}

impl WorkflowDefinition {
    pub fn new(name: impl Into<String>, steps: Vec<StepTemplate>) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            name: name.into(),
            description: None,
            steps,
            context: Context::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_context(mut self, context: Context) -> Self {
        self.context = context;
        self
    }

    /// Check structural invariants: at least one step and unique step ids.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.steps.is_empty() {
            return Err(EngineError::InvalidDefinition(format!(
                "workflow '{}' has no steps",
                self.name
            )));
        }

        let mut seen = HashSet::new();
        for step in &self.steps {
            if step.id.trim().is_empty() {
                return Err(EngineError::InvalidDefinition(format!(
                    "workflow '{}' has a step with an empty id",
                    self.name
                )));
            }
            if !seen.insert(step.id.as_str()) {
                return Err(EngineError::InvalidDefinition(format!(
                    "workflow '{}' has duplicate step id '{}'",
                    self.name, step.id
                )));
            }
        }
        Ok(())
    }

    /// Parse and validate a workflow definition from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, EngineError> {
        let def: Self = serde_yaml::from_str(yaml).map_err(|e| {
            EngineError::InvalidDefinition(format!("failed to parse workflow YAML: {}", e))
        })?;
        def.validate()?;
        Ok(def)
    }

    /// Load a workflow definition from a file path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            EngineError::InvalidDefinition(format!(
                "failed to read workflow file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_workflow() {
        let yaml = r#"
name: "Test Flow"
steps:
  - id: "one"
    name: "Step 1"
    agent_type: "echo"
    input: "Hello, world!"
"#;
        let wf = WorkflowDefinition::from_yaml(yaml).unwrap();
        assert_eq!(wf.name, "Test Flow");
        assert!(!wf.id.is_empty());
        assert_eq!(wf.steps.len(), 1);
        assert_eq!(wf.steps[0].agent_type, "echo");
        assert_eq!(wf.steps[0].input, serde_json::json!("Hello, world!"));
        assert!(wf.context.is_empty());
    }

    #[test]
    fn test_parse_full_workflow() {
        let yaml = r#"
id: "digest"
name: "Digest"
description: "Summarise and review"
context:
  audience: "engineering"
  limit: 5
steps:
  - id: "summarise"
    name: "Summarise"
    agent_type: "writer"
    role: "Technical writer"
    goal: "Short digest"
    input:
      task: "Summarise for {{audience}}"
      sources: ["{{notes}}"]
  - id: "review"
    name: "Review"
    agentType: "review"
    input: "Review {{step_summarise}}"
"#;
        let wf = WorkflowDefinition::from_yaml(yaml).unwrap();
        assert_eq!(wf.id, "digest");
        assert_eq!(wf.context.get("limit"), Some(&serde_json::json!(5)));
        assert_eq!(wf.steps[0].role.as_deref(), Some("Technical writer"));
        assert_eq!(wf.steps[1].agent_type, "review");
        assert!(wf.steps[0].input.is_object());
    }

    #[test]
    fn test_rejects_empty_and_duplicate_steps() {
        let empty = WorkflowDefinition::new("empty", vec![]);
        assert!(matches!(
            empty.validate(),
            Err(EngineError::InvalidDefinition(_))
        ));

        let dup = WorkflowDefinition::new(
            "dup",
            vec![
                StepTemplate::new("a", "A", "echo", serde_json::Value::Null),
                StepTemplate::new("a", "A again", "echo", serde_json::Value::Null),
            ],
        );
        let err = dup.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate step id 'a'"));
    }

    #[test]
    fn test_from_file_reports_missing_file() {
        let err = WorkflowDefinition::from_file("/definitely/not/here.yaml").unwrap_err();
        assert!(err.to_string().contains("failed to read workflow file"));
    }
}
