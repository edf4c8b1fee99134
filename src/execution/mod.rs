//! Execution engine for validated plans
//!
//! Runs a plan under its strategy against a `ToolTransport`, threads result
//! variables between steps, and folds every outcome into one report.
//! No planning happens here.

use crate::config::ExecutorConfig;
use crate::error::OrchestrationError;
use crate::intake;
use crate::models::{ExecutionPlanResult, Plan, Strategy, ToolCall, ToolExecutionResult};
use crate::resolver::{self, ResultVariables};
use crate::tools::ToolTransport;
use crate::validation::{create_default_validator, PlanValidator};
use crate::Result;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

mod aggregate;
mod strategies;

pub use aggregate::final_result;

/// Longest rendering of a step value kept in the execution log
const MAX_LOG_VALUE_CHARS: usize = 200;

/// Executes plans against one transport
pub struct ExecutionEngine {
    transport: Arc<dyn ToolTransport>,
    validator: PlanValidator,
    config: ExecutorConfig,
}

/// State that lives for exactly one `execute` call and is dropped with it
pub(crate) struct ExecutionContext {
    pub execution_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub clock: Instant,
    pub variables: ResultVariables,
    pub log: Vec<String>,
    pub cancel: CancellationToken,
}

impl ExecutionContext {
    fn new(cancel: CancellationToken) -> Self {
        Self {
            execution_id: Uuid::new_v4(),
            started_at: Utc::now(),
            clock: Instant::now(),
            variables: ResultVariables::new(),
            log: Vec::new(),
            cancel,
        }
    }

    pub fn note(&mut self, line: impl Into<String>) {
        self.log.push(line.into());
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Log a finished step and publish its result variable
    pub fn record(&mut self, result: &ToolExecutionResult) {
        self.note(describe_outcome(result));

        if !result.success {
            return;
        }

        if let (Some(name), Some(value)) = (result.output_variable(), result.result.as_ref()) {
            self.variables.insert(name.to_string(), value.clone());
            self.note(format!(
                "  stored result of step {} as variable '{}'",
                result.step, name
            ));
        }
    }
}

/// Cancels the execution when the plan deadline passes; disarmed on drop
struct DeadlineGuard(JoinHandle<()>);

impl Drop for DeadlineGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

fn arm_deadline(token: CancellationToken, after: Duration) -> DeadlineGuard {
    DeadlineGuard(tokio::spawn(async move {
        tokio::time::sleep(after).await;
        warn!(deadline_secs = after.as_secs_f64(), "Plan deadline reached, cancelling");
        token.cancel();
    }))
}

impl ExecutionEngine {
    pub fn new(transport: Arc<dyn ToolTransport>) -> Self {
        Self::with_config(transport, ExecutorConfig::default())
    }

    pub fn with_config(transport: Arc<dyn ToolTransport>, config: ExecutorConfig) -> Self {
        Self {
            transport,
            validator: create_default_validator(),
            config,
        }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub fn validator(&self) -> &PlanValidator {
        &self.validator
    }

    /// Execute a plan. Never fails: rejected plans come back with
    /// `success == false`, an `error`, and no tool results.
    pub async fn execute(
        &self,
        plan: &Plan,
        cancel: Option<CancellationToken>,
    ) -> ExecutionPlanResult {
        // A child token so our deadline never cancels the caller's token
        let cancel = cancel.map(|token| token.child_token()).unwrap_or_default();
        let _deadline = self
            .config
            .plan_timeout
            .map(|after| arm_deadline(cancel.clone(), after));

        let mut ctx = ExecutionContext::new(cancel);

        info!(
            execution_id = %ctx.execution_id,
            strategy = %plan.strategy,
            total_steps = plan.total_steps,
            "Starting plan execution"
        );

        if let Err(e) = self.validator.validate(plan) {
            warn!(execution_id = %ctx.execution_id, error = %e, "Plan rejected");
            return aggregate::rejected(Some(plan.strategy), plan.total_steps, &e, ctx);
        }

        ctx.note(format!(
            "Executing {} plan with {} step(s)",
            plan.strategy, plan.total_steps
        ));
        if !plan.execution_sequence.trim().is_empty() {
            ctx.note(format!("Planned sequence: {}", plan.execution_sequence.trim()));
        }

        let calls: Vec<&ToolCall> = plan.tool_calls.iter().collect();
        let results = match plan.strategy {
            Strategy::SingleTool => self.run_single(&calls, &mut ctx).await,
            Strategy::ParallelTools => self.run_parallel(&calls, &mut ctx).await,
            Strategy::SequentialTools => self.run_sequential(&calls, &mut ctx).await,
            Strategy::HybridTools => self.run_hybrid(plan, &mut ctx).await,
        };

        let report = aggregate::aggregate(plan, results, ctx);

        info!(
            execution_id = %report.execution_id,
            success = report.success,
            produced = report.tool_results.len(),
            elapsed_ms = report.execution_time_ms,
            "Plan execution finished"
        );

        report
    }

    /// Execute raw planner output, normalizing it first.
    /// Intake failures are reported the same way as validation failures.
    pub async fn execute_value(
        &self,
        raw: &Value,
        cancel: Option<CancellationToken>,
    ) -> ExecutionPlanResult {
        match intake::normalize_plan(raw) {
            Ok(plan) => self.execute(&plan, cancel).await,
            Err(e) => {
                let ctx = ExecutionContext::new(CancellationToken::new());
                warn!(execution_id = %ctx.execution_id, error = %e, "Planner output rejected");
                aggregate::rejected(None, 0, &e, ctx)
            }
        }
    }

    /// Invoke one step. Failures of any kind come back as a failed result;
    /// timing is recorded either way.
    pub(crate) async fn invoke_one(
        &self,
        call: &ToolCall,
        variables: &ResultVariables,
        cancel: &CancellationToken,
    ) -> ToolExecutionResult {
        let start = Instant::now();

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(OrchestrationError::Cancelled(format!(
                "step {} ({}) was cancelled",
                call.step, call.tool_name
            ))),
            outcome = self.call_transport(call, variables) => outcome,
        };

        let elapsed = start.elapsed();
        match outcome {
            Ok(value) => {
                debug!(
                    step = call.step,
                    tool_name = %call.tool_name,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "Step succeeded"
                );
                ToolExecutionResult::succeeded(call, value, elapsed)
            }
            Err(e) => {
                warn!(
                    step = call.step,
                    tool_name = %call.tool_name,
                    error = %e,
                    "Step failed"
                );
                ToolExecutionResult::failed(call, e.to_string(), elapsed)
            }
        }
    }

    async fn call_transport(&self, call: &ToolCall, variables: &ResultVariables) -> Result<Value> {
        let parameters = resolver::resolve_for_invocation(&call.parameters, variables)?;
        let invocation = self.transport.call_tool(&call.tool_name, &parameters);

        let raw = match self.config.step_timeout {
            Some(limit) => tokio::time::timeout(limit, invocation).await.map_err(|_| {
                OrchestrationError::Timeout(format!(
                    "step {} ({}) exceeded {:.3}s",
                    call.step,
                    call.tool_name,
                    limit.as_secs_f64()
                ))
            })??,
            None => invocation.await?,
        };

        normalize_tool_output(raw)
    }

    /// In-flight bound for a group: group size, config, and transport limit
    fn parallel_limit(&self, group_size: usize) -> usize {
        [
            Some(group_size),
            self.config.max_parallelism,
            self.transport.max_concurrency(),
        ]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(1)
        .max(1)
    }
}

/// Reduce a raw transport result to a scalar or string where possible.
///
/// Text blocks (`{"content": [{"text": ...}]}`) are joined; numeric and
/// boolean text becomes a JSON number/bool; `isError: true` is a failure.
pub fn normalize_tool_output(raw: Value) -> Result<Value> {
    match raw {
        Value::String(text) => Ok(parse_scalar(text)),
        Value::Object(ref map) if map.get("content").is_some_and(Value::is_array) => {
            let text = map["content"]
                .as_array()
                .map(|items| content_text(items))
                .unwrap_or_default();

            if map.get("isError").and_then(Value::as_bool) == Some(true) {
                return Err(OrchestrationError::ToolInvocationError(text));
            }
            Ok(parse_scalar(text))
        }
        other => Ok(other),
    }
}

fn content_text(items: &[Value]) -> String {
    items
        .iter()
        .filter_map(|item| match item {
            Value::String(text) => Some(text.clone()),
            _ => item.get("text").and_then(Value::as_str).map(str::to_string),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn parse_scalar(text: String) -> Value {
    match serde_json::from_str::<Value>(text.trim()) {
        Ok(value @ (Value::Number(_) | Value::Bool(_))) => value,
        _ => Value::String(text),
    }
}

fn describe_outcome(result: &ToolExecutionResult) -> String {
    if result.success {
        let rendered = result
            .result
            .as_ref()
            .map(|value| truncate_for_log(&value.to_string(), MAX_LOG_VALUE_CHARS))
            .unwrap_or_default();
        format!(
            "Step {} ({}) succeeded in {:.3}s: {}",
            result.step, result.tool_name, result.execution_time_seconds, rendered
        )
    } else {
        format!(
            "Step {} ({}) failed after {:.3}s: {}",
            result.step,
            result.tool_name,
            result.execution_time_seconds,
            result.error.as_deref().unwrap_or("unknown error")
        )
    }
}

fn truncate_for_log(input: &str, max_chars: usize) -> String {
    let char_count = input.chars().count();
    if char_count <= max_chars {
        return input.to_string();
    }
    let mut preview: String = input.chars().take(max_chars).collect();
    preview.push_str(&format!("... [{} chars]", char_count));
    preview
}
