//! Workflow Engine — runs a workflow execution step by step.
//!
//! For each pending step, in definition order, the engine:
//! 1. Marks it `in-progress`
//! 2. Resolves its declared input against the execution context
//! 3. Creates a fresh agent for the step's agent type
//! 4. Runs `initialize → process_task → cleanup`
//! 5. Records the output under `results[step.id]` and `context["step_<id>"]`
//!
//! The first failure halts the run (no retries, no rollback). Completed
//! results stay on the execution.
//!
//! Each execution sits behind its own lock, which is never held across the
//! agent call, so status queries observe in-flight progress. The step loop
//! runs on its own task and always drives the record to a terminal status.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::agents::{Agent, AgentConfig, AgentFactory};
use crate::error::EngineError;
use crate::store::{ExecutionHandle, ExecutionStore, WorkflowStore};
use crate::workflow::execution::{
    ExecutionOutcome, ExecutionStatus, ExecutionStatusReport, ExecutionSummary, StepStatus,
    WorkflowExecution,
};
use crate::workflow::resolver::{resolve_value, ResolveMode};
use crate::workflow::schema::{Context, WorkflowDefinition};

pub const CANCELLED_MESSAGE: &str = "Execution cancelled";

/// Engine configuration.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Fail a step when its input references a missing context key instead
    /// of substituting the empty string.
    pub strict_templates: bool,
}

impl EngineConfig {
    fn resolve_mode(&self) -> ResolveMode {
        if self.strict_templates {
            ResolveMode::Strict
        } else {
            ResolveMode::Lenient
        }
    }
}

/// Response of [`WorkflowEngine::start`].
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum StartOutcome {
    /// The execution was run to a terminal status
    Ran(ExecutionOutcome),
    /// The execution was only created
    Created(ExecutionStatusReport),
}

impl StartOutcome {
    pub fn execution_id(&self) -> &str {
        match self {
            Self::Ran(outcome) => &outcome.execution_id,
            Self::Created(report) => &report.execution_id,
        }
    }
}

/// Why the in-flight step stopped.
enum StepFailure {
    Agent(String),
    Cancelled,
}

/// Everything the agent call needs, captured while the lock is held.
struct PreparedStep {
    step_id: String,
    agent: Box<dyn Agent>,
    task: String,
    context: Context,
}

pub struct WorkflowEngine {
    config: EngineConfig,
    agents: Arc<AgentFactory>,
    workflows: Arc<WorkflowStore>,
    executions: ExecutionStore,
}

impl WorkflowEngine {
    pub fn new(config: EngineConfig, agents: Arc<AgentFactory>, workflows: Arc<WorkflowStore>) -> Self {
        Self {
            config,
            agents,
            workflows,
            executions: ExecutionStore::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Build a `pending` execution and register it. Does not run it.
    pub async fn create_execution(
        &self,
        definition: Arc<WorkflowDefinition>,
        input: Value,
        context: Context,
        created_by: Option<String>,
    ) -> Result<WorkflowExecution, EngineError> {
        definition.validate()?;
        let execution = WorkflowExecution::new(definition, input, context, created_by);
        tracing::info!(
            "[Engine] Created execution {} for workflow '{}' ({} steps)",
            execution.id,
            execution.workflow_id(),
            execution.steps.len()
        );
        let snapshot = execution.clone();
        self.executions.insert(execution).await;
        Ok(snapshot)
    }

    /// Run an execution to a terminal status.
    ///
    /// Step failures never surface as `Err`; they are recorded on the
    /// execution and reported through the returned outcome. Running a
    /// terminal execution is a no-op that returns the same outcome.
    ///
    /// The steps run on a spawned task, so dropping the returned future does
    /// not stop the execution; use [`WorkflowEngine::cancel`] for that.
    pub async fn run(&self, execution_id: &str) -> Result<ExecutionOutcome, EngineError> {
        let handle = self.handle(execution_id).await?;

        {
            let mut execution = handle.execution.write().await;
            if execution.status.is_terminal() {
                return Ok(execution.outcome());
            }
            if execution.status == ExecutionStatus::Running {
                return Err(EngineError::AlreadyRunning(execution_id.to_string()));
            }
            if handle.cancel.is_cancelled() {
                execution.finish(ExecutionStatus::Cancelled, Some(CANCELLED_MESSAGE.to_string()));
                return Ok(execution.outcome());
            }
            execution.mark_running();
            tracing::info!(
                "[Engine] Running execution {} (workflow '{}')",
                execution.id,
                execution.definition.name
            );
        }

        let runner = StepRunner {
            agents: self.agents.clone(),
            mode: self.config.resolve_mode(),
            handle: handle.clone(),
        };
        match tokio::spawn(runner.drive()).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                tracing::error!("[Engine] Execution {} task aborted: {}", execution_id, e);
                let mut execution = handle.execution.write().await;
                if let Some(step) = execution
                    .steps
                    .iter_mut()
                    .find(|s| s.status == StepStatus::InProgress)
                {
                    step.fail(format!("Step task aborted: {}", e));
                }
                execution.finish(
                    ExecutionStatus::Failed,
                    Some(format!("Execution task aborted: {}", e)),
                );
                Ok(execution.outcome())
            }
        }
    }

    /// Read-only status view of an execution.
    pub async fn get_status(&self, execution_id: &str) -> Result<ExecutionStatusReport, EngineError> {
        let handle = self.handle(execution_id).await?;
        let execution = handle.execution.read().await;
        Ok(execution.status_report())
    }

    /// Snapshot of the full execution record.
    pub async fn get_execution(&self, execution_id: &str) -> Result<WorkflowExecution, EngineError> {
        let handle = self.handle(execution_id).await?;
        let execution = handle.execution.read().await;
        Ok(execution.clone())
    }

    /// Request cancellation.
    ///
    /// A pending execution becomes `cancelled` immediately. A running one stops
    /// at its current agent call; the returned report may still show
    /// `running` until that happens. Terminal executions are unaffected.
    pub async fn cancel(&self, execution_id: &str) -> Result<ExecutionStatusReport, EngineError> {
        let handle = self.handle(execution_id).await?;
        let mut execution = handle.execution.write().await;
        if !execution.status.is_terminal() {
            handle.cancel.cancel();
            if execution.status == ExecutionStatus::Pending {
                execution.finish(ExecutionStatus::Cancelled, Some(CANCELLED_MESSAGE.to_string()));
            }
            tracing::info!("[Engine] Cancellation requested for execution {}", execution_id);
        }
        Ok(execution.status_report())
    }

    /// Summaries of every execution, optionally filtered by workflow, oldest first.
    pub async fn list_executions(&self, workflow_id: Option<&str>) -> Vec<ExecutionSummary> {
        let mut summaries = Vec::new();
        for handle in self.executions.list().await {
            let execution = handle.execution.read().await;
            if workflow_id.map_or(true, |id| execution.workflow_id() == id) {
                summaries.push(execution.summary());
            }
        }
        summaries.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.execution_id.cmp(&b.execution_id))
        });
        summaries
    }

    /// Create an execution of a stored workflow and optionally run it.
    pub async fn start(
        &self,
        workflow_id: &str,
        input: Value,
        context: Context,
        execute: bool,
        created_by: Option<String>,
    ) -> Result<StartOutcome, EngineError> {
        let definition = self
            .workflows
            .get(workflow_id)
            .await
            .ok_or_else(|| EngineError::UnknownWorkflow(workflow_id.to_string()))?;
        let execution = self.create_execution(definition, input, context, created_by).await?;

        if execute {
            Ok(StartOutcome::Ran(self.run(&execution.id).await?))
        } else {
            Ok(StartOutcome::Created(execution.status_report()))
        }
    }

    async fn handle(&self, execution_id: &str) -> Result<ExecutionHandle, EngineError> {
        self.executions
            .get(execution_id)
            .await
            .ok_or_else(|| EngineError::UnknownExecution(execution_id.to_string()))
    }
}

/// Owned state of one run, moved onto the spawned step loop.
struct StepRunner {
    agents: Arc<AgentFactory>,
    mode: ResolveMode,
    handle: ExecutionHandle,
}

impl StepRunner {
    async fn drive(self) -> ExecutionOutcome {
        let step_count = self.handle.execution.read().await.steps.len();

        for index in 0..step_count {
            let Some(prepared) = self.prepare_step(index).await else {
                let execution = self.handle.execution.read().await;
                if execution.status.is_terminal() {
                    break;
                }
                continue;
            };

            let step_id = prepared.step_id.clone();
            let result = invoke_agent(prepared, &self.handle.cancel).await;

            let mut execution = self.handle.execution.write().await;
            execution.metadata.current_step_id = None;
            match result {
                Ok(output) => {
                    tracing::debug!("[Engine] Step '{}' completed", step_id);
                    execution.steps[index].complete(output.clone());
                    execution.results.insert(step_id.clone(), output.clone());
                    execution.context.insert(format!("step_{}", step_id), output);
                }
                Err(StepFailure::Agent(message)) => {
                    tracing::warn!("[Engine] Step '{}' failed: {}", step_id, message);
                    execution.steps[index].fail(message.clone());
                    execution.finish(
                        ExecutionStatus::Failed,
                        Some(format!("Step '{}' failed: {}", step_id, message)),
                    );
                    break;
                }
                Err(StepFailure::Cancelled) => {
                    tracing::warn!(
                        "[Engine] Execution {} cancelled during step '{}'",
                        execution.id,
                        step_id
                    );
                    execution.steps[index].fail(CANCELLED_MESSAGE);
                    execution.finish(ExecutionStatus::Cancelled, Some(CANCELLED_MESSAGE.to_string()));
                    break;
                }
            }
        }

        let mut execution = self.handle.execution.write().await;
        if !execution.status.is_terminal() {
            execution.finish(ExecutionStatus::Completed, None);
        }
        match execution.status {
            ExecutionStatus::Completed => tracing::info!(
                "[Engine] Execution {} completed in {}ms",
                execution.id,
                execution.metadata.duration_ms.unwrap_or_default()
            ),
            status => tracing::error!(
                "[Engine] Execution {} {}: {}",
                execution.id,
                status,
                execution.metadata.error.as_deref().unwrap_or("unknown error")
            ),
        }
        execution.outcome()
    }

    /// Mark step `index` in-progress and build its agent call.
    ///
    /// Returns `None` when the step should not run: it is not pending, the
    /// execution was cancelled, or the step failed before reaching the agent
    /// (input resolution or unknown agent type), in which case the execution
    /// is already terminal.
    async fn prepare_step(&self, index: usize) -> Option<PreparedStep> {
        let mut execution = self.handle.execution.write().await;
        if execution.steps[index].status != StepStatus::Pending {
            return None;
        }
        if self.handle.cancel.is_cancelled() {
            execution.finish(ExecutionStatus::Cancelled, Some(CANCELLED_MESSAGE.to_string()));
            return None;
        }

        let step_id = execution.steps[index].id().to_string();
        execution.metadata.current_step_id = Some(step_id.clone());
        execution.steps[index].start();
        tracing::info!(
            "[Engine] Step {}/{}: {} ({})",
            index + 1,
            execution.steps.len(),
            execution.steps[index].name(),
            execution.steps[index].template.agent_type
        );

        let resolved = resolve_value(
            &execution.steps[index].template.input,
            &execution.context,
            self.mode,
        );
        let resolved = match resolved {
            Ok(value) => value,
            Err(e) => {
                fail_before_agent(&mut execution, index, e.to_string());
                return None;
            }
        };
        execution.steps[index].resolved_input = Some(resolved.clone());

        let template = &execution.steps[index].template;
        let agent_config = AgentConfig {
            id: None,
            name: Some(template.name.clone()),
            role: template.role.clone(),
            goal: template.goal.clone(),
            settings: Default::default(),
        };
        let agent = match self.agents.create_agent(&template.agent_type, agent_config) {
            Ok(agent) => agent,
            Err(e) => {
                fail_before_agent(&mut execution, index, e.to_string());
                return None;
            }
        };

        Some(PreparedStep {
            step_id,
            agent,
            task: serialize_task(&resolved),
            context: execution.context.clone(),
        })
    }
}

fn fail_before_agent(execution: &mut WorkflowExecution, index: usize, message: String) {
    let step_id = execution.steps[index].id().to_string();
    tracing::warn!("[Engine] Step '{}' failed: {}", step_id, message);
    execution.steps[index].fail(message.clone());
    execution.finish(
        ExecutionStatus::Failed,
        Some(format!("Step '{}' failed: {}", step_id, message)),
    );
}

/// String inputs are passed raw; anything else as compact JSON.
fn serialize_task(input: &Value) -> String {
    match input {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Run the agent lifecycle, racing it against cancellation.
///
/// `cleanup` runs on every path, including a cancelled task.
async fn invoke_agent(prepared: PreparedStep, cancel: &CancellationToken) -> Result<Value, StepFailure> {
    let PreparedStep {
        mut agent,
        task,
        context,
        ..
    } = prepared;

    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(StepFailure::Cancelled),
        r = process(agent.as_mut(), &task, &context) => r.map_err(StepFailure::Agent),
    };
    agent.cleanup().await;
    result
}

async fn process(agent: &mut dyn Agent, task: &str, context: &Context) -> Result<Value, String> {
    agent.initialize().await.map_err(|e| e.to_string())?;
    match agent.process_task(task, context).await {
        Ok(response) if response.success => Ok(response.output),
        Ok(response) => Err(response
            .error
            .unwrap_or_else(|| "agent reported failure without an error message".to_string())),
        Err(e) => Err(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::{AgentResponse, EchoAgent};
    use crate::error::AgentError;
    use crate::tools::ToolRegistry;
    use crate::workflow::schema::StepTemplate;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Always returns an unsuccessful response.
    struct FailingAgent {
        id: String,
    }

    #[async_trait]
    impl Agent for FailingAgent {
        fn id(&self) -> &str {
            &self.id
        }

        fn agent_type(&self) -> &str {
            "failing"
        }

        async fn process_task(&mut self, _task: &str, _context: &Context) -> Result<AgentResponse, AgentError> {
            Ok(AgentResponse::failed("boom"))
        }
    }

    /// Records every task and lifecycle call it receives.
    struct RecordingAgent {
        id: String,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Agent for RecordingAgent {
        fn id(&self) -> &str {
            &self.id
        }

        fn agent_type(&self) -> &str {
            "recording"
        }

        async fn initialize(&mut self) -> Result<(), AgentError> {
            self.log.lock().unwrap().push("initialize".into());
            Ok(())
        }

        async fn process_task(&mut self, task: &str, _context: &Context) -> Result<AgentResponse, AgentError> {
            self.log.lock().unwrap().push(format!("task:{}", task));
            Ok(AgentResponse::ok(json!(task.to_uppercase())))
        }

        async fn cleanup(&mut self) {
            self.log.lock().unwrap().push("cleanup".into());
        }
    }

    /// Blocks until released, so tests can observe a running execution.
    struct GatedAgent {
        id: String,
        entered: Arc<Notify>,
        release: Arc<Notify>,
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Agent for GatedAgent {
        fn id(&self) -> &str {
            &self.id
        }

        fn agent_type(&self) -> &str {
            "gated"
        }

        async fn process_task(&mut self, task: &str, _context: &Context) -> Result<AgentResponse, AgentError> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(AgentResponse::ok(json!(task)))
        }

        async fn cleanup(&mut self) {
            self.log.lock().unwrap().push("gated:cleanup".into());
        }
    }

    struct Harness {
        engine: Arc<WorkflowEngine>,
        log: Arc<Mutex<Vec<String>>>,
        entered: Arc<Notify>,
        release: Arc<Notify>,
    }

    fn harness(config: EngineConfig) -> Harness {
        let log = Arc::new(Mutex::new(Vec::new()));
        let entered = Arc::new(Notify::new());
        let release = Arc::new(Notify::new());

        let factory = AgentFactory::with_builtins(Arc::new(ToolRegistry::with_builtins()), None);
        factory.register_agent_type("failing", |c| {
            Box::new(FailingAgent { id: c.id.unwrap_or_default() })
        });
        let recording_log = log.clone();
        factory.register_agent_type("recording", move |c| {
            Box::new(RecordingAgent {
                id: c.id.unwrap_or_default(),
                log: recording_log.clone(),
            })
        });
        let (gate_in, gate_out, gate_log) = (entered.clone(), release.clone(), log.clone());
        factory.register_agent_type("gated", move |c| {
            Box::new(GatedAgent {
                id: c.id.unwrap_or_default(),
                entered: gate_in.clone(),
                release: gate_out.clone(),
                log: gate_log.clone(),
            })
        });
        factory.register_agent_type("upper-echo", |c| Box::new(EchoAgent::new("upper-echo", c)));

        Harness {
            engine: Arc::new(WorkflowEngine::new(
                config,
                Arc::new(factory),
                Arc::new(WorkflowStore::new()),
            )),
            log,
            entered,
            release,
        }
    }

    fn workflow(steps: Vec<StepTemplate>) -> Arc<WorkflowDefinition> {
        Arc::new(WorkflowDefinition::new("test workflow", steps))
    }

    fn step(id: &str, agent_type: &str, input: Value) -> StepTemplate {
        StepTemplate::new(id, id.to_uppercase(), agent_type, input)
    }

    async fn create(h: &Harness, def: Arc<WorkflowDefinition>, input: Value) -> String {
        h.engine
            .create_execution(def, input, Context::new(), Some("tester".into()))
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_steps_run_in_order_and_pass_outputs() {
        let h = harness(EngineConfig::default());
        let def = workflow(vec![
            step("a", "recording", json!("first {{topic}}")),
            step("b", "recording", json!("second {{step_a}}")),
            step("c", "echo", json!({ "previous": "{{step_b}}" })),
        ]);
        let id = create(&h, def, json!({ "topic": "rust" })).await;

        let outcome = h.engine.run(&id).await.unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.status, ExecutionStatus::Completed);

        let results = outcome.result.unwrap();
        assert_eq!(results["a"], json!("FIRST RUST"));
        assert_eq!(results["b"], json!("SECOND FIRST RUST"));
        assert_eq!(results["c"], json!({ "previous": "SECOND FIRST RUST" }));

        let log = h.log.lock().unwrap().clone();
        assert_eq!(
            log,
            vec![
                "initialize",
                "task:first rust",
                "cleanup",
                "initialize",
                "task:second FIRST RUST",
                "cleanup"
            ]
        );

        let exec = h.engine.get_execution(&id).await.unwrap();
        assert!(exec.steps.iter().all(|s| s.status == StepStatus::Completed));
        assert_eq!(exec.context["step_a"], json!("FIRST RUST"));
        assert!(exec.metadata.completed_at.is_some());
        assert!(exec.metadata.duration_ms.is_some());
        assert_eq!(exec.metadata.created_by.as_deref(), Some("tester"));
    }

    #[tokio::test]
    async fn test_failure_halts_and_keeps_partial_results() {
        let h = harness(EngineConfig::default());
        let def = workflow(vec![
            step("one", "echo", json!("ok")),
            step("two", "failing", json!("x")),
            step("three", "recording", json!("never")),
        ]);
        let id = create(&h, def, Value::Null).await;

        let outcome = h.engine.run(&id).await.unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.status, ExecutionStatus::Failed);
        assert!(outcome.result.is_none());
        assert!(outcome.error.unwrap().contains("boom"));

        let exec = h.engine.get_execution(&id).await.unwrap();
        assert_eq!(exec.results.len(), 1);
        assert_eq!(exec.results["one"], json!("ok"));
        assert_eq!(exec.steps[0].status, StepStatus::Completed);
        assert_eq!(exec.steps[1].status, StepStatus::Failed);
        assert_eq!(exec.steps[1].error.as_deref(), Some("boom"));
        assert_eq!(exec.steps[2].status, StepStatus::Pending);
        assert!(h.log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_agent_type_is_fatal() {
        let h = harness(EngineConfig::default());
        let def = workflow(vec![
            step("first", "nonexistent", json!("x")),
            step("second", "recording", json!("y")),
        ]);
        let id = create(&h, def, Value::Null).await;

        let outcome = h.engine.run(&id).await.unwrap();
        assert_eq!(outcome.status, ExecutionStatus::Failed);
        let error = outcome.error.unwrap();
        assert!(error.contains("Unknown agent type: 'nonexistent'"));

        let exec = h.engine.get_execution(&id).await.unwrap();
        assert_eq!(exec.steps[0].status, StepStatus::Failed);
        assert!(exec.steps[0].error.as_deref().unwrap().contains("nonexistent"));
        assert_eq!(exec.steps[1].status, StepStatus::Pending);
        assert!(h.log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_run_on_terminal_execution_is_noop() {
        let h = harness(EngineConfig::default());
        let id = create(&h, workflow(vec![step("a", "recording", json!("hi"))]), Value::Null).await;

        let first = h.engine.run(&id).await.unwrap();
        let status_before = h.engine.get_status(&id).await.unwrap();
        let second = h.engine.run(&id).await.unwrap();
        let status_after = h.engine.get_status(&id).await.unwrap();

        assert_eq!(first.status, second.status);
        assert_eq!(first.result, second.result);
        assert_eq!(status_before.metadata.completed_at, status_after.metadata.completed_at);
        assert_eq!(h.log.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_unresolved_placeholders() {
        let lenient = harness(EngineConfig::default());
        let id = create(&lenient, workflow(vec![step("a", "echo", json!("value: {{missing}}"))]), Value::Null).await;
        let outcome = lenient.engine.run(&id).await.unwrap();
        assert_eq!(outcome.result.unwrap()["a"], json!("value: "));

        let strict = harness(EngineConfig { strict_templates: true });
        let id = create(&strict, workflow(vec![step("a", "echo", json!("value: {{missing}}"))]), Value::Null).await;
        let outcome = strict.engine.run(&id).await.unwrap();
        assert_eq!(outcome.status, ExecutionStatus::Failed);
        assert!(outcome.error.unwrap().contains("missing"));
    }

    #[tokio::test]
    async fn test_executions_are_isolated() {
        let h = harness(EngineConfig::default());
        let def = workflow(vec![step("a", "echo", json!("{{name}}"))]);

        let first = create(&h, def.clone(), json!({ "name": "alpha" })).await;
        let second = create(&h, def.clone(), json!({ "name": "beta" })).await;
        assert_ne!(first, second);

        let (a, b) = tokio::join!(h.engine.run(&first), h.engine.run(&second));
        assert_eq!(a.unwrap().result.unwrap()["a"], json!("alpha"));
        assert_eq!(b.unwrap().result.unwrap()["a"], json!("beta"));
        assert_eq!(h.engine.list_executions(Some(&def.id)).await.len(), 2);
        assert!(h.engine.list_executions(Some("other")).await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_ids() {
        let h = harness(EngineConfig::default());
        assert!(matches!(
            h.engine.get_status("missing").await,
            Err(EngineError::UnknownExecution(_))
        ));
        assert!(matches!(
            h.engine.run("missing").await,
            Err(EngineError::UnknownExecution(_))
        ));
        assert!(matches!(
            h.engine.start("missing", Value::Null, Context::new(), true, None).await,
            Err(EngineError::UnknownWorkflow(_))
        ));
    }

    #[tokio::test]
    async fn test_rejects_definition_without_steps() {
        let h = harness(EngineConfig::default());
        let err = h
            .engine
            .create_execution(workflow(vec![]), Value::Null, Context::new(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidDefinition(_)));
    }

    #[tokio::test]
    async fn test_status_reports_progress_while_running() {
        let h = harness(EngineConfig::default());
        let def = workflow(vec![
            step("first", "echo", json!("done")),
            step("second", "gated", json!("wait")),
            step("third", "echo", json!("later")),
        ]);
        let id = create(&h, def, Value::Null).await;

        let engine = h.engine.clone();
        let run_id = id.clone();
        let task = tokio::spawn(async move { engine.run(&run_id).await });

        h.entered.notified().await;
        let report = h.engine.get_status(&id).await.unwrap();
        assert_eq!(report.status, ExecutionStatus::Running);
        let progress = report.progress.unwrap();
        assert_eq!(progress.step_id, "second");
        assert_eq!(progress.name, "SECOND");
        assert_eq!(progress.completed, 1);
        assert_eq!(progress.total, 3);

        assert!(matches!(
            h.engine.run(&id).await,
            Err(EngineError::AlreadyRunning(_))
        ));

        h.release.notify_one();
        let outcome = task.await.unwrap().unwrap();
        assert_eq!(outcome.status, ExecutionStatus::Completed);

        let report = h.engine.get_status(&id).await.unwrap();
        assert!(report.progress.is_none());
        assert!(report.metadata.completed_at.is_some());
    }

    #[tokio::test]
    async fn test_cancel_running_execution() {
        let h = harness(EngineConfig::default());
        let def = workflow(vec![
            step("first", "gated", json!("wait")),
            step("second", "recording", json!("never")),
        ]);
        let id = create(&h, def, Value::Null).await;

        let engine = h.engine.clone();
        let run_id = id.clone();
        let task = tokio::spawn(async move { engine.run(&run_id).await });

        h.entered.notified().await;
        h.engine.cancel(&id).await.unwrap();

        let outcome = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(outcome.status, ExecutionStatus::Cancelled);
        assert_eq!(outcome.error.as_deref(), Some(CANCELLED_MESSAGE));

        let exec = h.engine.get_execution(&id).await.unwrap();
        assert_eq!(exec.steps[0].status, StepStatus::Failed);
        assert_eq!(exec.steps[0].error.as_deref(), Some(CANCELLED_MESSAGE));
        assert_eq!(exec.steps[1].status, StepStatus::Pending);
        // The in-flight agent is cleaned up; the second agent is never built
        assert_eq!(*h.log.lock().unwrap(), vec!["gated:cleanup".to_string()]);
    }

    #[tokio::test]
    async fn test_dropped_run_future_keeps_execution_alive() {
        let h = harness(EngineConfig::default());
        let id = create(&h, workflow(vec![step("only", "gated", json!("wait"))]), Value::Null).await;

        let engine = h.engine.clone();
        let run_id = id.clone();
        let task = tokio::spawn(async move { engine.run(&run_id).await });
        h.entered.notified().await;

        task.abort();
        let _ = task.await;

        // The step loop outlives the caller and still honours cancellation
        h.engine.cancel(&id).await.unwrap();
        let status = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let report = h.engine.get_status(&id).await.unwrap();
                if report.status.is_terminal() {
                    return report.status;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("execution should reach a terminal status");
        assert_eq!(status, ExecutionStatus::Cancelled);

        let exec = h.engine.get_execution(&id).await.unwrap();
        assert_eq!(exec.steps[0].status, StepStatus::Failed);
        assert_eq!(exec.steps[0].error.as_deref(), Some(CANCELLED_MESSAGE));

        let rerun = h.engine.run(&id).await.unwrap();
        assert_eq!(rerun.status, ExecutionStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_dropped_run_future_still_completes() {
        let h = harness(EngineConfig::default());
        let def = workflow(vec![
            step("gate", "gated", json!("wait")),
            step("after", "recording", json!("then {{step_gate}}")),
        ]);
        let id = create(&h, def, Value::Null).await;

        let engine = h.engine.clone();
        let run_id = id.clone();
        let task = tokio::spawn(async move { engine.run(&run_id).await });
        h.entered.notified().await;
        task.abort();
        let _ = task.await;

        h.release.notify_one();
        let status = tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let report = h.engine.get_status(&id).await.unwrap();
                if report.status.is_terminal() {
                    return report.status;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(status, ExecutionStatus::Completed);

        let exec = h.engine.get_execution(&id).await.unwrap();
        assert_eq!(exec.results["after"], json!("THEN WAIT"));
    }

    #[tokio::test]
    async fn test_cancel_pending_execution() {
        let h = harness(EngineConfig::default());
        let id = create(&h, workflow(vec![step("a", "recording", json!("x"))]), Value::Null).await;

        let report = h.engine.cancel(&id).await.unwrap();
        assert_eq!(report.status, ExecutionStatus::Cancelled);

        let outcome = h.engine.run(&id).await.unwrap();
        assert_eq!(outcome.status, ExecutionStatus::Cancelled);
        assert!(h.log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_start_with_and_without_execute() {
        let h = harness(EngineConfig::default());
        let def = WorkflowDefinition::new("stored", vec![step("a", "upper-echo", json!("{{greeting}}"))])
            .with_id("stored");
        h.engine.workflows.save(def).await.unwrap();

        let mut context = Context::new();
        context.insert("greeting".into(), json!("hello"));

        match h.engine.start("stored", Value::Null, context.clone(), false, None).await.unwrap() {
            StartOutcome::Created(report) => {
                assert_eq!(report.status, ExecutionStatus::Pending);
                assert_eq!(report.workflow_id, "stored");
            }
            StartOutcome::Ran(_) => panic!("execution should not have run"),
        }

        match h.engine.start("stored", Value::Null, context, true, Some("u1".into())).await.unwrap() {
            StartOutcome::Ran(outcome) => {
                assert!(outcome.success);
                assert_eq!(outcome.result.unwrap()["a"], json!("hello"));
            }
            StartOutcome::Created(_) => panic!("execution should have run"),
        }
    }

    #[test]
    fn test_serialize_task() {
        assert_eq!(serialize_task(&json!("plain text")), "plain text");
        assert_eq!(serialize_task(&json!({ "a": 1 })), r#"{"a":1}"#);
        assert_eq!(serialize_task(&json!(3)), "3");
    }
}
