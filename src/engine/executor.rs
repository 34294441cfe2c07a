//! Workflow executor.
//!
//! Walks the execution plan one step at a time, resolving templates against
//! the run's context, dispatching each step to its handler, and applying the
//! step's retry and error policy. Condition and loop steps run their bodies
//! through the same path, so nested steps get identical treatment.

use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn, Span};

use super::pricing::{calculate_revenue, partial_revenue, Revenue};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::metrics;
use crate::steps::{
    condition_output, evaluate_condition, iteration_locals, loop_items, run_ai_decision,
    run_tool_call, run_transform, Collaborators, StepOutput,
};
use crate::template::{resolve_str, resolve_value, Scope};
use crate::workflow::{
    resolve_inputs, ErrorPolicy, ExecutionPlan, StepKind, WorkflowDefinition, WorkflowOutput,
    WorkflowStep, WorkflowStore,
};

/// Lifecycle of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
        }
    }
}

/// One charge on the run's ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepCostEntry {
    pub step_id: String,
    pub cost: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Completed,
    Skipped,
    Failed,
}

/// Audit entry for one executed step (one per loop iteration for body steps).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    pub step_id: String,
    pub kind: String,
    pub status: StepStatus,
    pub attempts: u32,
    pub cost: f64,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Mutable state of a single run. Never shared between runs.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub execution_id: String,
    pub workflow_id: String,
    pub input: Map<String, Value>,
    /// Step id -> output, in completion order
    pub steps: Map<String, Value>,
    pub costs: Vec<StepCostEntry>,
    pub records: Vec<StepRecord>,
    pub status: ExecutionStatus,
    pub current_step: Option<String>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ExecutionContext {
    pub fn new(workflow_id: impl Into<String>, input: Map<String, Value>) -> Self {
        Self {
            execution_id: uuid::Uuid::new_v4().to_string(),
            workflow_id: workflow_id.into(),
            input,
            steps: Map::new(),
            costs: Vec::new(),
            records: Vec::new(),
            status: ExecutionStatus::Pending,
            current_step: None,
            error: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Template scope over this context, with optional loop locals.
    pub fn scope<'s>(&'s self, locals: Option<&'s Map<String, Value>>) -> Scope<'s> {
        let scope = Scope::new(&self.input, &self.steps);
        match locals {
            Some(locals) => scope.with_locals(locals),
            None => scope,
        }
    }

    /// Ids of steps that completed, first completion order, no repeats.
    pub fn completed_steps(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for record in &self.records {
            if record.status == StepStatus::Completed && !seen.contains(&record.step_id) {
                seen.push(record.step_id.clone());
            }
        }
        seen
    }
}

/// What a caller gets back from a run, failed or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub success: bool,
    pub status: ExecutionStatus,
    pub output: Value,
    pub execution_id: String,
    pub workflow_id: String,
    pub total_cost: f64,
    pub cost_breakdown: Vec<StepCostEntry>,
    pub duration_ms: u64,
    pub creator_revenue: f64,
    pub platform_revenue: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed_step: Option<String>,
    pub completed_steps: Vec<String>,
    pub steps: Vec<StepRecord>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl ExecutionResult {
    fn from_context(
        ctx: ExecutionContext,
        output: Value,
        revenue: Revenue,
        duration: Duration,
        failed_step: Option<String>,
    ) -> Self {
        Self {
            success: ctx.status == ExecutionStatus::Completed,
            status: ctx.status,
            output,
            completed_steps: ctx.completed_steps(),
            execution_id: ctx.execution_id,
            workflow_id: ctx.workflow_id,
            total_cost: revenue.total_cost,
            cost_breakdown: ctx.costs,
            duration_ms: duration.as_millis() as u64,
            creator_revenue: revenue.creator_revenue,
            platform_revenue: revenue.platform_revenue,
            error: ctx.error,
            failed_step,
            steps: ctx.records,
            started_at: ctx.started_at,
            finished_at: ctx.finished_at,
        }
    }
}

/// A step that gave up, with the id of the innermost step that failed.
#[derive(Debug)]
struct StepFailure {
    step_id: String,
    error: Error,
}

impl StepFailure {
    fn new(step_id: &str, error: Error) -> Self {
        Self {
            step_id: step_id.to_string(),
            error,
        }
    }

    fn is_cancellation(&self) -> bool {
        matches!(self.error, Error::Cancelled(_))
    }
}

type BodyFuture<'a> = Pin<Box<dyn Future<Output = std::result::Result<Vec<String>, StepFailure>> + Send + 'a>>;

/// Cancellation token and deadline shared by every step of one run.
struct RunGuard {
    cancel: CancellationToken,
    deadline: Option<(Instant, Duration)>,
}

impl RunGuard {
    fn new(cancel: CancellationToken, run_timeout: Option<Duration>) -> Self {
        Self {
            cancel,
            deadline: run_timeout.map(|limit| (Instant::now() + limit, limit)),
        }
    }

    /// Fail if the run was cancelled or is past its deadline.
    fn check(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled("run was cancelled".to_string()));
        }
        if let Some((deadline, limit)) = self.deadline {
            if remaining_until(deadline).is_none() {
                return Err(timeout_error(limit));
            }
        }
        Ok(())
    }

    /// Await `fut`, giving up on cancellation or at the deadline.
    async fn bound<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.check()?;
        let timed = async {
            match self.deadline {
                Some((deadline, limit)) => {
                    let remaining = remaining_until(deadline).ok_or_else(|| timeout_error(limit))?;
                    timeout(remaining, fut)
                        .await
                        .unwrap_or_else(|_| Err(timeout_error(limit)))
                }
                None => fut.await,
            }
        };

        tokio::select! {
            _ = self.cancel.cancelled() => Err(Error::Cancelled("run was cancelled".to_string())),
            result = timed => result,
        }
    }

    async fn pause(&self, delay: Duration) -> Result<()> {
        self.bound(async {
            sleep(delay).await;
            Ok(())
        })
        .await
    }
}

fn timeout_error(limit: Duration) -> Error {
    Error::Cancelled(format!("run timed out after {} ms", limit.as_millis()))
}

fn remaining_until(deadline: Instant) -> Option<Duration> {
    let now = Instant::now();
    if now >= deadline {
        None
    } else {
        Some(deadline.saturating_duration_since(now))
    }
}

/// Runs workflow definitions.
#[derive(Clone)]
pub struct Executor {
    collaborators: Collaborators,
    retry_delay: Duration,
    run_timeout: Option<Duration>,
}

impl Executor {
    pub fn new(collaborators: Collaborators) -> Self {
        let defaults = Config::default();
        Self {
            collaborators,
            retry_delay: Duration::from_millis(defaults.engine.retry_delay_ms),
            run_timeout: None,
        }
    }

    /// HTTP collaborators, retry delay and run timeout from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            collaborators: Collaborators::from_config(config),
            retry_delay: Duration::from_millis(config.engine.retry_delay_ms),
            run_timeout: config.engine.run_timeout_seconds.map(Duration::from_secs),
        }
    }

    /// Fixed wait between attempts of a failing step.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Deadline for a whole run.
    pub fn with_run_timeout(mut self, limit: Duration) -> Self {
        self.run_timeout = Some(limit);
        self
    }

    /// Execute a definition with caller inputs.
    ///
    /// `Err` means the run never started (invalid inputs). Step failures
    /// come back as an unsuccessful [`ExecutionResult`] that still bills the
    /// completed work.
    pub async fn execute(
        &self,
        definition: &WorkflowDefinition,
        input: Value,
    ) -> Result<ExecutionResult> {
        self.execute_with_cancel(definition, input, CancellationToken::new())
            .await
    }

    /// Look a definition up by name and execute it.
    pub async fn execute_named(
        &self,
        store: &dyn WorkflowStore,
        name: &str,
        input: Value,
    ) -> Result<ExecutionResult> {
        let definition = store
            .get(name)
            .await?
            .ok_or_else(|| Error::Registry(format!("Workflow '{}' is not registered", name)))?;
        self.execute(&definition, input).await
    }

    /// Execute, stopping at the next step boundary once `cancel` fires.
    #[instrument(
        name = "workflow.execute",
        skip(self, definition, input, cancel),
        fields(
            workflow_name = %definition.name,
            execution_id = tracing::field::Empty,
        )
    )]
    pub async fn execute_with_cancel(
        &self,
        definition: &WorkflowDefinition,
        input: Value,
        cancel: CancellationToken,
    ) -> Result<ExecutionResult> {
        let input = resolve_inputs(definition, &input)?;
        let plan = ExecutionPlan::build(definition);

        let mut ctx = ExecutionContext::new(&definition.name, input);
        Span::current().record("execution_id", &ctx.execution_id);

        info!(
            "Starting execution {} of workflow '{}'",
            ctx.execution_id, definition.name
        );
        debug!(order = ?plan.order, "Execution plan");

        let guard = RunGuard::new(cancel, self.run_timeout);
        let start_time = Instant::now();
        ctx.status = ExecutionStatus::Running;

        let outcome = self
            .run_body(definition, &plan.order, &mut ctx, None, &guard)
            .await;

        ctx.current_step = None;
        ctx.finished_at = Some(Utc::now());
        let duration = start_time.elapsed();
        let share = definition.creator.revenue_share;

        let result = match outcome {
            Ok(_) => {
                ctx.status = ExecutionStatus::Completed;
                let output = render_output(definition.output.as_ref(), &ctx);
                let revenue = calculate_revenue(&definition.pricing, share, &ctx.costs);
                info!(
                    "Execution {} completed in {:?}, charged {:.6} {}",
                    ctx.execution_id, duration, revenue.total_cost, definition.pricing.currency
                );
                ExecutionResult::from_context(ctx, output, revenue, duration, None)
            }
            Err(failure) => {
                ctx.status = ExecutionStatus::Failed;
                ctx.error = Some(failure.error.to_string());
                let revenue = partial_revenue(share, &ctx.costs);
                warn!(
                    "Execution {} failed at step '{}': {}",
                    ctx.execution_id, failure.step_id, failure.error
                );
                ExecutionResult::from_context(
                    ctx,
                    Value::Null,
                    revenue,
                    duration,
                    Some(failure.step_id),
                )
            }
        };

        metrics::record_run(&definition.name, result.status.as_str());
        metrics::record_run_duration(duration, &definition.name);
        metrics::record_run_cost(result.total_cost, &definition.name);

        Ok(result)
    }

    /// Run a list of steps in order. Boxed because control steps recurse.
    fn run_body<'a>(
        &'a self,
        definition: &'a WorkflowDefinition,
        ids: &'a [String],
        ctx: &'a mut ExecutionContext,
        locals: Option<&'a Map<String, Value>>,
        guard: &'a RunGuard,
    ) -> BodyFuture<'a> {
        Box::pin(async move {
            let mut executed = Vec::with_capacity(ids.len());
            for id in ids {
                let step = definition.get_step(id).ok_or_else(|| {
                    StepFailure::new(id, Error::Step(format!("Unknown step '{}'", id)))
                })?;
                self.run_step(definition, step, ctx, locals, guard).await?;
                executed.push(id.clone());
            }
            Ok(executed)
        })
    }

    #[instrument(
        name = "step.execute",
        skip_all,
        fields(step_id = %step.id, kind = %step.kind.name())
    )]
    async fn run_step(
        &self,
        definition: &WorkflowDefinition,
        step: &WorkflowStep,
        ctx: &mut ExecutionContext,
        locals: Option<&Map<String, Value>>,
        guard: &RunGuard,
    ) -> std::result::Result<(), StepFailure> {
        guard
            .check()
            .map_err(|e| StepFailure::new(&step.id, e))?;

        ctx.current_step = Some(step.id.clone());
        let kind = step.kind.name();
        let max_attempts = step.retry_count.saturating_add(1);
        let started = Instant::now();
        let mut attempt = 1u32;

        loop {
            match self.attempt(definition, step, ctx, locals, guard).await {
                Ok(output) => {
                    info!(
                        "Step '{}' completed (attempt {}, cost {})",
                        step.id, attempt, output.cost
                    );
                    if output.cost > 0.0 {
                        ctx.costs.push(StepCostEntry {
                            step_id: step.id.clone(),
                            cost: output.cost,
                            tool: output.tool.clone(),
                        });
                    }
                    ctx.steps.insert(step.id.clone(), output.data);
                    push_record(ctx, step, StepStatus::Completed, attempt, output.cost, started, None);
                    return Ok(());
                }
                Err(failure) if failure.is_cancellation() => {
                    push_record(ctx, step, StepStatus::Failed, attempt, 0.0, started, Some(&failure.error));
                    return Err(failure);
                }
                Err(failure) if attempt < max_attempts => {
                    warn!(
                        "Step '{}' attempt {}/{} failed: {}. Retrying in {}ms",
                        step.id,
                        attempt,
                        max_attempts,
                        failure.error,
                        self.retry_delay.as_millis()
                    );
                    metrics::record_step_retry(kind);
                    guard
                        .pause(self.retry_delay)
                        .await
                        .map_err(|e| StepFailure::new(&step.id, e))?;
                    attempt = attempt.saturating_add(1);
                }
                Err(failure) if step.on_error == ErrorPolicy::Skip => {
                    warn!(
                        "Step '{}' failed after {} attempt(s), skipping: {}",
                        step.id, attempt, failure.error
                    );
                    ctx.steps.insert(step.id.clone(), Value::Null);
                    push_record(ctx, step, StepStatus::Skipped, attempt, 0.0, started, Some(&failure.error));
                    return Ok(());
                }
                Err(failure) => {
                    push_record(ctx, step, StepStatus::Failed, attempt, 0.0, started, Some(&failure.error));
                    return Err(failure);
                }
            }
        }
    }

    /// One attempt of a step, dispatched on its kind.
    async fn attempt(
        &self,
        definition: &WorkflowDefinition,
        step: &WorkflowStep,
        ctx: &mut ExecutionContext,
        locals: Option<&Map<String, Value>>,
        guard: &RunGuard,
    ) -> std::result::Result<StepOutput, StepFailure> {
        let fail = |e: Error| StepFailure::new(&step.id, e);

        match &step.kind {
            StepKind::ToolCall(call) => {
                let scope = ctx.scope(locals);
                guard
                    .bound(run_tool_call(call, step.estimated_cost, &scope, &self.collaborators))
                    .await
                    .map_err(fail)
            }
            StepKind::AiDecision(decision) => {
                let scope = ctx.scope(locals);
                guard
                    .bound(run_ai_decision(decision, &scope, &self.collaborators))
                    .await
                    .map_err(fail)
            }
            StepKind::Transform(transform) => {
                run_transform(transform, &ctx.scope(locals)).map_err(fail)
            }
            StepKind::Condition(condition) => {
                let branch = evaluate_condition(condition, &ctx.scope(locals)).map_err(fail)?;
                debug!(
                    "Condition '{}' took the {} branch ({} steps)",
                    step.id,
                    branch.name,
                    branch.steps.len()
                );
                let executed = self
                    .run_body(definition, branch.steps, ctx, locals, guard)
                    .await?;
                Ok(StepOutput::free(condition_output(&branch, &executed)))
            }
            StepKind::Loop(each) => {
                let items = loop_items(each, &ctx.scope(locals)).map_err(fail)?;
                debug!("Loop '{}' over {} items", step.id, items.len());

                let owned = definition.descendants(&step.id);
                let mut results = Vec::with_capacity(items.len());
                for (index, item) in items.into_iter().enumerate() {
                    // Outputs from the previous element must not leak into
                    // steps this element never reaches.
                    for id in &owned {
                        if let Some(slot) = ctx.steps.get_mut(*id) {
                            *slot = Value::Null;
                        }
                    }
                    let iteration = iteration_locals(&each.item_var, item, index, locals);
                    self.run_body(definition, &each.steps, ctx, Some(&iteration), guard)
                        .await?;

                    let outputs: Map<String, Value> = each
                        .steps
                        .iter()
                        .map(|id| (id.clone(), ctx.steps.get(id).cloned().unwrap_or(Value::Null)))
                        .collect();
                    results.push(Value::Object(outputs));
                }
                Ok(StepOutput::free(Value::Array(results)))
            }
        }
    }
}

fn push_record(
    ctx: &mut ExecutionContext,
    step: &WorkflowStep,
    status: StepStatus,
    attempts: u32,
    cost: f64,
    started: Instant,
    error: Option<&Error>,
) {
    let kind = step.kind.name();
    let elapsed = started.elapsed();
    metrics::record_step_execution(kind, status_label(status));
    metrics::record_step_duration(elapsed, kind);

    ctx.records.push(StepRecord {
        step_id: step.id.clone(),
        kind: kind.to_string(),
        status,
        attempts,
        cost,
        duration_ms: elapsed.as_millis() as u64,
        error: error.map(ToString::to_string),
    });
}

fn status_label(status: StepStatus) -> &'static str {
    match status {
        StepStatus::Completed => "completed",
        StepStatus::Skipped => "skipped",
        StepStatus::Failed => "failed",
    }
}

/// Produce the run's output from the final context.
///
/// A template or mapping is resolved; a schema description (or no output
/// description at all) yields the whole step result map.
fn render_output(output: Option<&WorkflowOutput>, ctx: &ExecutionContext) -> Value {
    let scope = ctx.scope(None);
    match output {
        Some(WorkflowOutput::Template(template)) => resolve_str(template, &scope),
        Some(WorkflowOutput::Mapping(mapping)) => {
            resolve_value(&Value::Object(mapping.clone()), &scope)
        }
        Some(WorkflowOutput::Schema { .. }) | None => Value::Object(ctx.steps.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::{ServerDirectory, TextGenerator, ToolClient};
    use crate::workflow::{parse_workflow, InMemoryWorkflowStore};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    // ============================================================================
    // Test Collaborators
    // ============================================================================

    /// Tool server fake that fails a configurable number of calls first.
    #[derive(Default)]
    struct FakeTools {
        failures_left: AtomicUsize,
        calls: Mutex<Vec<(String, String, Value)>>,
    }

    impl FakeTools {
        fn failing(times: usize) -> Self {
            Self {
                failures_left: AtomicUsize::new(times),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ToolClient for FakeTools {
        async fn call(&self, endpoint: &str, function: &str, params: &Value) -> Result<Value> {
            self.calls.lock().unwrap().push((
                endpoint.to_string(),
                function.to_string(),
                params.clone(),
            ));

            let failing = self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if failing {
                return Err(Error::Step("connection reset".to_string()));
            }

            match function {
                "search_leads" => Ok(json!({
                    "results": [{"name": "Acme"}, {"name": "Globex"}],
                    "meta": {"cost": 0.08}
                })),
                "forecast" => Ok(json!({"city": params["city"], "temp": 20})),
                "slow" => {
                    sleep(Duration::from_secs(5)).await;
                    Ok(json!({}))
                }
                _ => Ok(json!({"echo": params})),
            }
        }
    }

    struct FakeText {
        reply: String,
        prompts: Mutex<Vec<String>>,
    }

    impl FakeText {
        fn replying(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for FakeText {
        async fn generate(&self, prompt: &str, _model: Option<&str>) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            Ok(self.reply.clone())
        }
    }

    // ============================================================================
    // Helper Functions
    // ============================================================================

    fn executor_with(tools: Arc<FakeTools>, text: Arc<FakeText>) -> Executor {
        let servers = ServerDirectory::default()
            .with_server("lead-search", "http://leads.test")
            .with_server("weather", "http://weather.test");
        Executor::new(Collaborators::new(tools, text, servers)).with_retry_delay(Duration::from_millis(1))
    }

    fn executor(tools: Arc<FakeTools>) -> Executor {
        executor_with(tools, Arc::new(FakeText::replying("ok")))
    }

    const HEADER: &str = r#"
name: test-workflow
creator:
  address: "0xabc"
pricing:
  basePrice: 0.05
"#;

    fn workflow(body: &str) -> WorkflowDefinition {
        parse_workflow(&format!("{}{}", HEADER, body)).unwrap()
    }

    // ============================================================================
    // Basic Execution Tests
    // ============================================================================

    #[tokio::test]
    async fn test_dependent_steps_run_in_order() {
        let tools = Arc::new(FakeTools::default());
        let wf = workflow(
            r#"
inputs:
  - name: query
    type: string
steps:
  - id: names
    type: transform
    input: "{{steps.search.results}}"
    expression: "input|map('name')|join(', ')"
    dependsOn: [search]
  - id: search
    type: tool_call
    server: lead-search
    function: search_leads
    params:
      query: "{{input.query}}"
output: "{{steps.names}}"
"#,
        );

        let result = executor(tools.clone())
            .execute(&wf, json!({"query": "saas"}))
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.status, ExecutionStatus::Completed);
        assert_eq!(result.output, json!("Acme, Globex"));
        assert_eq!(result.completed_steps, vec!["search", "names"]);

        let calls = tools.calls.lock().unwrap();
        assert_eq!(calls[0].0, "http://leads.test");
        assert_eq!(calls[0].2, json!({"query": "saas"}));
    }

    #[tokio::test]
    async fn test_cost_above_base_price_is_split() {
        let tools = Arc::new(FakeTools::default());
        let wf = workflow(
            r#"
steps:
  - id: search
    type: tool_call
    server: lead-search
    function: search_leads
"#,
        );

        let result = executor(tools).execute(&wf, Value::Null).await.unwrap();

        assert_eq!(result.total_cost, 0.08);
        assert!((result.creator_revenue - 0.056).abs() < 1e-9);
        assert!((result.platform_revenue - 0.024).abs() < 1e-9);
        assert_eq!(result.cost_breakdown.len(), 1);
        assert_eq!(
            result.cost_breakdown[0].tool.as_deref(),
            Some("lead-search.search_leads")
        );
    }

    #[tokio::test]
    async fn test_configured_prices_reach_the_ledger() {
        let servers = ServerDirectory::default().with_server("weather", "http://weather.test");
        let collaborators = Collaborators::new(
            Arc::new(FakeTools::default()),
            Arc::new(FakeText::replying("sunny")),
            servers,
        )
        .with_ai_cost(0.2)
        .with_default_tool_cost(0.03);
        let wf = workflow(
            r#"
steps:
  - id: forecast
    type: tool_call
    server: weather
    function: forecast
    params:
      city: Oslo
  - id: summary
    type: ai_decision
    prompt: "Summarize {{steps.forecast}}"
    model: small
    dependsOn: [forecast]
"#,
        );

        let result = Executor::new(collaborators)
            .execute(&wf, Value::Null)
            .await
            .unwrap();

        assert!(result.success, "{:?}", result.error);
        assert_eq!(
            result.cost_breakdown,
            vec![
                StepCostEntry {
                    step_id: "forecast".to_string(),
                    cost: 0.03,
                    tool: Some("weather.forecast".to_string()),
                },
                StepCostEntry {
                    step_id: "summary".to_string(),
                    cost: 0.2,
                    tool: Some("small".to_string()),
                },
            ]
        );
        assert!((result.total_cost - 0.23).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_base_price_floor_and_default_output() {
        let tools = Arc::new(FakeTools::default());
        let wf = workflow(
            r#"
steps:
  - id: double
    type: transform
    expression: "2 * 21"
"#,
        );

        let result = executor(tools).execute(&wf, Value::Null).await.unwrap();

        assert_eq!(result.total_cost, 0.05);
        assert_eq!(result.output, json!({"double": 42}));
        assert!(result.cost_breakdown.is_empty());
    }

    #[tokio::test]
    async fn test_mapping_output() {
        let tools = Arc::new(FakeTools::default());
        let wf = workflow(
            r#"
inputs:
  - name: city
    type: string
steps:
  - id: fetch
    type: tool_call
    server: weather
    function: forecast
    estimatedCost: 0.002
    params:
      city: "{{input.city}}"
output:
  city: "{{input.city}}"
  summary: "{{steps.fetch.temp}} degrees"
"#,
        );

        let result = executor(tools)
            .execute(&wf, json!({"city": "Oslo"}))
            .await
            .unwrap();

        assert_eq!(result.output, json!({"city": "Oslo", "summary": "20 degrees"}));
        assert_eq!(result.cost_breakdown[0].cost, 0.002);
    }

    // ============================================================================
    // Retry and Error Policy Tests
    // ============================================================================

    const FLAKY: &str = r#"
steps:
  - id: fetch
    type: tool_call
    server: weather
    function: forecast
    retryCount: RETRIES
    onError: POLICY
    params:
      city: Oslo
  - id: after
    type: transform
    expression: "steps.fetch|default('none')"
    dependsOn: [fetch]
"#;

    fn flaky(retries: u32, policy: &str) -> WorkflowDefinition {
        workflow(
            &FLAKY
                .replace("RETRIES", &retries.to_string())
                .replace("POLICY", policy),
        )
    }

    #[tokio::test]
    async fn test_retry_recovers() {
        let tools = Arc::new(FakeTools::failing(1));
        let result = executor(tools.clone())
            .execute(&flaky(1, "retry"), Value::Null)
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(tools.call_count(), 2);
        assert_eq!(result.steps[0].attempts, 2);
        assert_eq!(result.steps[0].status, StepStatus::Completed);
    }

    #[tokio::test]
    async fn test_no_retry_fails_run() {
        let tools = Arc::new(FakeTools::failing(1));
        let result = executor(tools.clone())
            .execute(&flaky(0, "fail"), Value::Null)
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.status, ExecutionStatus::Failed);
        assert_eq!(result.failed_step.as_deref(), Some("fetch"));
        assert!(result.error.unwrap().contains("connection reset"));
        assert_eq!(tools.call_count(), 1);
        assert!(result.completed_steps.is_empty());
        assert_eq!(result.output, Value::Null);
    }

    #[tokio::test]
    async fn test_retry_exhausted_fails() {
        let tools = Arc::new(FakeTools::failing(10));
        let result = executor(tools.clone())
            .execute(&flaky(2, "retry"), Value::Null)
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(tools.call_count(), 3);
        assert_eq!(result.steps[0].attempts, 3);
    }

    #[tokio::test]
    async fn test_skip_records_null_and_continues() {
        let tools = Arc::new(FakeTools::failing(10));
        let result = executor(tools)
            .execute(&flaky(0, "skip"), Value::Null)
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.output["fetch"], Value::Null);
        assert_eq!(result.output["after"], json!("none"));
        assert_eq!(result.steps[0].status, StepStatus::Skipped);
        assert_eq!(result.completed_steps, vec!["after"]);
    }

    #[tokio::test]
    async fn test_failed_run_bills_completed_work() {
        let tools = Arc::new(FakeTools::default());
        let wf = workflow(
            r#"
steps:
  - id: first
    type: tool_call
    server: weather
    function: forecast
    params:
      city: Oslo
  - id: second
    type: tool_call
    server: nowhere
    function: forecast
    dependsOn: [first]
"#,
        );

        let result = executor(tools).execute(&wf, Value::Null).await.unwrap();

        assert!(!result.success);
        assert_eq!(result.failed_step.as_deref(), Some("second"));
        assert!(result.error.unwrap().contains("Unknown tool server"));
        assert_eq!(result.completed_steps, vec!["first"]);
        // default tool cost, no base price floor
        assert_eq!(result.total_cost, 0.01);
        assert!((result.creator_revenue - 0.007).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_missing_input_fails_before_any_step() {
        let tools = Arc::new(FakeTools::default());
        let wf = workflow(
            r#"
inputs:
  - name: city
    type: string
steps:
  - id: fetch
    type: tool_call
    server: weather
    function: forecast
"#,
        );

        let err = executor(tools.clone())
            .execute(&wf, json!({}))
            .await
            .unwrap_err();

        assert_eq!(err.code(), "INPUT_ERROR");
        assert!(err.to_string().contains("Missing required input: city"));
        assert_eq!(tools.call_count(), 0);
    }

    // ============================================================================
    // Control Step Tests
    // ============================================================================

    #[tokio::test]
    async fn test_condition_runs_selected_branch() {
        let tools = Arc::new(FakeTools::default());
        let wf = workflow(
            r#"
inputs:
  - name: temp
    type: number
steps:
  - id: gate
    type: condition
    expression: "input.temp > 30"
    then: [alert]
    else: [calm]
  - id: alert
    type: transform
    expression: "'hot'"
  - id: calm
    type: transform
    expression: "'fine'"
"#,
        );
        let exec = executor(tools);

        let hot = exec.execute(&wf, json!({"temp": 35})).await.unwrap();
        assert_eq!(
            hot.output["gate"],
            json!({"result": true, "branch": "then", "executed": ["alert"]})
        );
        assert_eq!(hot.output["alert"], json!("hot"));
        assert!(hot.output.get("calm").is_none());

        let mild = exec.execute(&wf, json!({"temp": 12})).await.unwrap();
        assert_eq!(mild.output["gate"]["branch"], json!("else"));
        assert_eq!(mild.output["calm"], json!("fine"));
        assert!(mild.output.get("alert").is_none());
    }

    #[tokio::test]
    async fn test_loop_runs_body_per_item() {
        let tools = Arc::new(FakeTools::default());
        let wf = workflow(
            r#"
inputs:
  - name: cities
    type: array
steps:
  - id: each
    type: loop
    over: "{{input.cities}}"
    as: city
    steps: [fetch, label]
  - id: fetch
    type: tool_call
    server: weather
    function: forecast
    params:
      city: "{{city}}"
  - id: label
    type: transform
    expression: "steps.fetch.city == city ? index : 99"
    dependsOn: [fetch]
  - id: count
    type: transform
    expression: "steps.each|len"
    dependsOn: [each]
"#,
        );

        let result = executor(tools.clone())
            .execute(&wf, json!({"cities": ["Oslo", "Lima"]}))
            .await
            .unwrap();

        assert!(result.success, "{:?}", result.error);
        assert_eq!(
            result.output["each"],
            json!([
                {"fetch": {"city": "Oslo", "temp": 20}, "label": 0},
                {"fetch": {"city": "Lima", "temp": 20}, "label": 1}
            ])
        );
        assert_eq!(result.output["count"], json!(2));
        // last iteration stays visible under the body step id
        assert_eq!(result.output["fetch"]["city"], json!("Lima"));
        assert_eq!(tools.call_count(), 2);
        assert_eq!(result.cost_breakdown.len(), 2);
    }

    #[tokio::test]
    async fn test_loop_branch_outputs_reset_each_item() {
        let tools = Arc::new(FakeTools::default());
        let wf = workflow(
            r#"
steps:
  - id: each
    type: loop
    over: [40, 10]
    steps: [gate, report]
  - id: gate
    type: condition
    expression: "item > 30"
    then: [hot]
  - id: hot
    type: transform
    expression: "item * 2"
  - id: report
    type: transform
    expression: "steps.hot|default('none')"
    dependsOn: [gate]
"#,
        );

        let result = executor(tools).execute(&wf, Value::Null).await.unwrap();

        assert!(result.success, "{:?}", result.error);
        assert_eq!(result.output["each"][0]["report"], json!(80));
        assert_eq!(result.output["each"][1]["report"], json!("none"));
        assert_eq!(result.output["hot"], Value::Null);
    }

    #[tokio::test]
    async fn test_loop_over_non_array_fails() {
        let tools = Arc::new(FakeTools::default());
        let wf = workflow(
            r#"
steps:
  - id: each
    type: loop
    over: "{{input.nothing}}"
    steps: [noop]
  - id: noop
    type: transform
    expression: "1"
"#,
        );

        let result = executor(tools).execute(&wf, Value::Null).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.failed_step.as_deref(), Some("each"));
    }

    #[tokio::test]
    async fn test_failure_inside_body_names_inner_step() {
        let tools = Arc::new(FakeTools::failing(10));
        let wf = workflow(
            r#"
steps:
  - id: gate
    type: condition
    expression: "true"
    then: [fetch]
  - id: fetch
    type: tool_call
    server: weather
    function: forecast
"#,
        );

        let result = executor(tools).execute(&wf, Value::Null).await.unwrap();
        assert!(!result.success);
        assert_eq!(result.failed_step.as_deref(), Some("fetch"));
    }

    #[tokio::test]
    async fn test_ai_decision_parses_embedded_json() {
        let tools = Arc::new(FakeTools::default());
        let text = Arc::new(FakeText::replying(
            "Decision follows: {\"urgency\": \"high\"} thanks",
        ));
        let wf = workflow(
            r#"
inputs:
  - name: ticket
    type: string
steps:
  - id: triage
    type: ai_decision
    prompt: "Rate urgency of: {{input.ticket}}"
    model: small
    outputFormat: json
output: "{{steps.triage.urgency}}"
"#,
        );

        let result = executor_with(tools, text.clone())
            .execute(&wf, json!({"ticket": "site down"}))
            .await
            .unwrap();

        assert_eq!(result.output, json!("high"));
        assert_eq!(
            text.prompts.lock().unwrap()[0],
            "Rate urgency of: site down"
        );
        assert_eq!(result.cost_breakdown[0].cost, 0.005);
        assert_eq!(result.cost_breakdown[0].tool.as_deref(), Some("small"));
    }

    // ============================================================================
    // Cancellation Tests
    // ============================================================================

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let tools = Arc::new(FakeTools::default());
        let wf = flaky(0, "fail");
        let token = CancellationToken::new();
        token.cancel();

        let result = executor(tools.clone())
            .execute_with_cancel(&wf, Value::Null, token)
            .await
            .unwrap();

        assert!(!result.success);
        assert!(result.error.unwrap().contains("cancelled"));
        assert_eq!(tools.call_count(), 0);
        assert_eq!(result.total_cost, 0.0);
    }

    #[tokio::test]
    async fn test_run_timeout_aborts_slow_step() {
        let tools = Arc::new(FakeTools::default());
        let wf = workflow(
            r#"
steps:
  - id: stuck
    type: tool_call
    server: weather
    function: slow
    retryCount: 3
"#,
        );

        let result = executor(tools.clone())
            .with_run_timeout(Duration::from_millis(50))
            .execute(&wf, Value::Null)
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.failed_step.as_deref(), Some("stuck"));
        assert!(result.error.unwrap().contains("timed out"));
        // deadline is not retried
        assert_eq!(tools.call_count(), 1);
    }

    // ============================================================================
    // Registry Tests
    // ============================================================================

    #[tokio::test]
    async fn test_execute_named() {
        let tools = Arc::new(FakeTools::default());
        let store = InMemoryWorkflowStore::new();
        store.register(flaky(0, "fail")).await.unwrap();
        let exec = executor(tools);

        let result = exec
            .execute_named(&store, "test-workflow", Value::Null)
            .await
            .unwrap();
        assert!(result.success);

        let err = exec
            .execute_named(&store, "missing", Value::Null)
            .await
            .unwrap_err();
        assert_eq!(err.code(), "REGISTRY_ERROR");
    }
}
