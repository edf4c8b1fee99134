//! Plan result aggregation

use super::ExecutionContext;
use crate::error::OrchestrationError;
use crate::models::{ExecutionPlanResult, Plan, Strategy, ToolExecutionResult};
use chrono::Utc;
use serde_json::Value;

/// The single successful value, or a `step_{n}_{tool}` map of all of them.
pub fn final_result(results: &[ToolExecutionResult]) -> Value {
    let successful: Vec<&ToolExecutionResult> = results.iter().filter(|r| r.success).collect();

    match successful.as_slice() {
        [only] => only.result.clone().unwrap_or(Value::Null),
        many => Value::Object(
            many.iter()
                .map(|r| (r.result_key(), r.result.clone().unwrap_or(Value::Null)))
                .collect(),
        ),
    }
}

pub(crate) fn aggregate(
    plan: &Plan,
    tool_results: Vec<ToolExecutionResult>,
    mut ctx: ExecutionContext,
) -> ExecutionPlanResult {
    let succeeded = tool_results.iter().filter(|r| r.success).count();
    let complete = tool_results.len() == plan.total_steps as usize;
    let success = complete && succeeded == tool_results.len();

    let error = (!success).then(|| failure_summary(plan, &tool_results, ctx.is_cancelled()));

    ctx.note(format!(
        "Completed: {}/{} step(s) succeeded",
        succeeded, plan.total_steps
    ));

    finish(
        ctx,
        Some(plan.strategy),
        plan.total_steps,
        success,
        tool_results,
        error,
    )
}

/// Report for a plan refused before any step ran
pub(crate) fn rejected(
    strategy: Option<Strategy>,
    total_steps: u32,
    error: &OrchestrationError,
    mut ctx: ExecutionContext,
) -> ExecutionPlanResult {
    ctx.note(format!("Plan rejected: {}", error));
    finish(ctx, strategy, total_steps, false, Vec::new(), Some(error.to_string()))
}

fn finish(
    ctx: ExecutionContext,
    strategy: Option<Strategy>,
    total_steps: u32,
    success: bool,
    tool_results: Vec<ToolExecutionResult>,
    error: Option<String>,
) -> ExecutionPlanResult {
    ExecutionPlanResult {
        execution_id: ctx.execution_id,
        success,
        strategy,
        total_steps,
        final_result: final_result(&tool_results),
        tool_results,
        error,
        execution_log: ctx.log,
        started_at: ctx.started_at,
        finished_at: Utc::now(),
        execution_time_ms: ctx.clock.elapsed().as_millis() as u64,
    }
}

fn failure_summary(plan: &Plan, results: &[ToolExecutionResult], cancelled: bool) -> String {
    let mut parts: Vec<String> = results
        .iter()
        .filter(|r| !r.success)
        .map(|r| {
            format!(
                "step {} ({}): {}",
                r.step,
                r.tool_name,
                r.error.as_deref().unwrap_or("unknown error")
            )
        })
        .collect();

    let not_run = (plan.total_steps as usize).saturating_sub(results.len());
    if not_run > 0 {
        parts.push(format!("{} step(s) not run", not_run));
    }
    if cancelled {
        parts.push("execution was cancelled".to_string());
    }

    format!("Plan execution failed: {}", parts.join("; "))
}
