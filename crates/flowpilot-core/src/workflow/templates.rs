//! Workflow template catalog — parameterized blueprints that expand into
//! workflow definitions.
//!
//! Templates can be defined in YAML as well as built in:
//!
//! ```yaml
//! id: "summary"
//! name: "Summary"
//! description: "Summarise a document"
//! parameters:
//!   - name: "document"
//!     required: true
//!   - name: "length"
//!     default: "short"
//! steps:
//!   - id: "summarise"
//!     name: "Summarise"
//!     agent_type: "writer"
//!     input: "Write a {{length}} summary of: {{document}}"
//! ```
//!
//! Instantiation never substitutes placeholders itself: parameter values are
//! written into the definition's default context and resolved when the
//! execution runs, so `{{step_<id>}}` references stay intact.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{EngineError, TemplateError};
use crate::workflow::schema::{Context, StepTemplate, WorkflowDefinition};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateParameter {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    /// Used when the caller supplies no value
    #[serde(default)]
    pub default: Option<Value>,
}

impl TemplateParameter {
    fn required(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: Some(description.to_string()),
            required: true,
            default: None,
        }
    }

    fn optional(name: &str, description: &str, default: Value) -> Self {
        Self {
            name: name.to_string(),
            description: Some(description.to_string()),
            required: false,
            default: Some(default),
        }
    }
}

/// A named, parameterized workflow blueprint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowTemplate {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: Vec<TemplateParameter>,
    pub steps: Vec<StepTemplate>,
}

impl WorkflowTemplate {
    pub fn from_yaml(yaml: &str) -> Result<Self, EngineError> {
        let template: Self = serde_yaml::from_str(yaml).map_err(|e| {
            EngineError::InvalidDefinition(format!("failed to parse template YAML: {}", e))
        })?;
        // The expanded definition must be structurally valid too.
        WorkflowDefinition::new(template.name.clone(), template.steps.clone()).validate()?;
        Ok(template)
    }

    /// Agent-type tags used by this template's steps, in step order.
    pub fn agent_types(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = Vec::new();
        for step in &self.steps {
            if !tags.contains(&step.agent_type.as_str()) {
                tags.push(&step.agent_type);
            }
        }
        tags
    }

    /// Expand into a fresh definition.
    ///
    /// Parameter defaults are applied first, then every caller value. Fails
    /// with [`TemplateError::MissingParameters`] listing every required
    /// parameter that ends up without a value.
    pub fn instantiate(&self, params: &Context) -> Result<WorkflowDefinition, TemplateError> {
        let mut context = Context::new();
        for param in &self.parameters {
            if let Some(default) = &param.default {
                context.insert(param.name.clone(), default.clone());
            }
        }
        context.extend(params.iter().map(|(k, v)| (k.clone(), v.clone())));

        let missing: Vec<String> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .filter(|p| context.get(&p.name).map_or(true, is_blank))
            .map(|p| p.name.clone())
            .collect();
        if !missing.is_empty() {
            return Err(TemplateError::MissingParameters {
                template: self.id.clone(),
                missing,
            });
        }

        let mut definition = WorkflowDefinition::new(self.name.clone(), self.steps.clone())
            .with_context(context);
        definition.description = self.description.clone();
        Ok(definition)
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Catalog of workflow templates indexed by id.
pub struct TemplateCatalog {
    templates: RwLock<HashMap<String, Arc<WorkflowTemplate>>>,
}

impl Default for TemplateCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateCatalog {
    pub fn new() -> Self {
        Self {
            templates: RwLock::new(HashMap::new()),
        }
    }

    /// A catalog preloaded with [`builtin_templates`].
    pub fn with_builtins() -> Self {
        let catalog = Self::new();
        for template in builtin_templates() {
            catalog.register(template);
        }
        catalog
    }

    pub fn register(&self, template: WorkflowTemplate) {
        let mut templates = self.templates.write().unwrap_or_else(|e| e.into_inner());
        if templates.contains_key(&template.id) {
            tracing::warn!("[TemplateCatalog] Template '{}' was already registered; overwriting", template.id);
        }
        templates.insert(template.id.clone(), Arc::new(template));
    }

    /// Load every `.yaml`/`.yml` template in a directory, in file-name order.
    ///
    /// A loaded template replaces a registered one with the same id, so a
    /// directory can override the built-ins.
    pub fn load_dir(&self, dir: impl AsRef<Path>) -> Result<usize, EngineError> {
        let dir = dir.as_ref();
        let mut paths: Vec<_> = std::fs::read_dir(dir)
            .map_err(|e| {
                EngineError::InvalidDefinition(format!(
                    "failed to read template directory '{}': {}",
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
            let content = std::fs::read_to_string(&path).map_err(|e| {
                EngineError::InvalidDefinition(format!(
                    "failed to read template file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
            let template = WorkflowTemplate::from_yaml(&content)?;
            tracing::info!("[TemplateCatalog] Loaded template: {} ({})", template.id, template.name);
            self.register(template);
            count += 1;
        }
        Ok(count)
    }

    pub fn get(&self, id: &str) -> Option<Arc<WorkflowTemplate>> {
        self.templates.read().ok().and_then(|t| t.get(id).cloned())
    }

    /// All templates, sorted by id.
    pub fn list(&self) -> Vec<Arc<WorkflowTemplate>> {
        let sorted: BTreeMap<String, Arc<WorkflowTemplate>> = self
            .templates
            .read()
            .map(|t| t.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default();
        sorted.into_values().collect()
    }

    pub fn instantiate(
        &self,
        template_id: &str,
        params: &Context,
    ) -> Result<WorkflowDefinition, TemplateError> {
        let template = self
            .get(template_id)
            .ok_or_else(|| TemplateError::UnknownTemplate(template_id.to_string()))?;
        let definition = template.instantiate(params)?;
        tracing::info!(
            "[TemplateCatalog] Instantiated '{}' as workflow {}",
            template_id,
            definition.id
        );
        Ok(definition)
    }
}

/// Built-in templates (no files needed).
pub fn builtin_templates() -> Vec<WorkflowTemplate> {
    vec![
        WorkflowTemplate {
            id: "research-report".to_string(),
            name: "Research Report".to_string(),
            description: Some("Research a topic, analyse the findings, write and review a report".to_string()),
            parameters: vec![
                TemplateParameter::required("topic", "Subject of the report"),
                TemplateParameter::optional("depth", "How deep the research goes", json!("standard")),
                TemplateParameter::optional("audience", "Intended readers", json!("general")),
            ],
            steps: vec![
                StepTemplate::new(
                    "research",
                    "Research",
                    "research",
                    json!({ "task": "Research {{topic}} at {{depth}} depth. List the key facts and sources." }),
                )
                .with_role("Researcher", "Gather accurate, relevant information"),
                StepTemplate::new(
                    "analysis",
                    "Analysis",
                    "analysis",
                    json!({
                        "task": "Analyse the research on {{topic}} and extract the main insights.",
                        "findings": "{{step_research}}"
                    }),
                )
                .with_role("Analyst", "Turn raw findings into insights"),
                StepTemplate::new(
                    "writing",
                    "Write report",
                    "writer",
                    json!({
                        "task": "Write a report on {{topic}} for a {{audience}} audience.",
                        "insights": "{{step_analysis}}"
                    }),
                )
                .with_role("Technical writer", "Write a clear, well-structured report"),
                StepTemplate::new(
                    "review",
                    "Review",
                    "review",
                    json!({
                        "task": "Review the report for accuracy and clarity and return the final version.",
                        "report": "{{step_writing}}"
                    }),
                )
                .with_role("Editor", "Catch errors and tighten the prose"),
            ],
        },
        WorkflowTemplate {
            id: "content-creation".to_string(),
            name: "Content Creation".to_string(),
            description: Some("Research, draft and review a piece of content".to_string()),
            parameters: vec![
                TemplateParameter::required("topic", "What the content is about"),
                TemplateParameter::optional("format", "Kind of content", json!("blog post")),
                TemplateParameter::optional("tone", "Voice of the piece", json!("informative")),
            ],
            steps: vec![
                StepTemplate::new(
                    "research",
                    "Research",
                    "research",
                    json!({ "task": "Collect talking points about {{topic}} for a {{format}}." }),
                )
                .with_role("Researcher", "Find engaging, accurate material"),
                StepTemplate::new(
                    "draft",
                    "Draft",
                    "writer",
                    json!({
                        "task": "Write a {{tone}} {{format}} about {{topic}}.",
                        "notes": "{{step_research}}"
                    }),
                )
                .with_role("Writer", "Produce an engaging draft"),
                StepTemplate::new(
                    "review",
                    "Review",
                    "review",
                    json!({
                        "task": "Edit the {{format}} and return the final version.",
                        "draft": "{{step_draft}}"
                    }),
                )
                .with_role("Editor", "Polish the draft"),
            ],
        },
        WorkflowTemplate {
            id: "data-pipeline".to_string(),
            name: "Data Pipeline".to_string(),
            description: Some("Ingest, classify and index a data source".to_string()),
            parameters: vec![
                TemplateParameter::required("source", "Data source to ingest"),
                TemplateParameter::optional("categories", "Classification labels", json!(["general"])),
            ],
            steps: vec![
                StepTemplate::new(
                    "ingest",
                    "Ingest",
                    "data",
                    json!({ "task": "Load and normalise records from {{source}}." }),
                ),
                StepTemplate::new(
                    "classify",
                    "Classify",
                    "classifier",
                    json!({
                        "task": "Classify each record into one of {{categories}}.",
                        "records": "{{step_ingest}}"
                    }),
                ),
                StepTemplate::new(
                    "index",
                    "Index",
                    "retrieval",
                    json!({
                        "task": "Index the classified records for retrieval.",
                        "records": "{{step_classify}}"
                    }),
                ),
            ],
        },
    ]
}
