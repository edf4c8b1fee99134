//! The four strategy executors, all built on `invoke_one`

use super::{ExecutionContext, ExecutionEngine};
use crate::grouping::{group_by_dependency, GroupKind};
use crate::models::{Plan, ToolCall, ToolExecutionResult};
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

impl ExecutionEngine {
    pub(crate) async fn run_single(
        &self,
        calls: &[&ToolCall],
        ctx: &mut ExecutionContext,
    ) -> Vec<ToolExecutionResult> {
        if calls.len() != 1 {
            ctx.note(format!(
                "SingleTool expects exactly 1 call, found {}",
                calls.len()
            ));
            return Vec::new();
        }
        self.run_sequential(calls, ctx).await
    }

    /// Fan out, fan in. Results come back in input order; a failing member
    /// never affects its siblings.
    pub(crate) async fn run_parallel(
        &self,
        calls: &[&ToolCall],
        ctx: &mut ExecutionContext,
    ) -> Vec<ToolExecutionResult> {
        if calls.is_empty() {
            return Vec::new();
        }
        if ctx.is_cancelled() {
            ctx.note(format!(
                "Cancelled before starting steps {}",
                step_list(calls)
            ));
            return Vec::new();
        }

        let limit = self.parallel_limit(calls.len());
        if limit < calls.len() {
            ctx.note(format!(
                "Dispatching {} calls with at most {} in flight",
                calls.len(),
                limit
            ));
        }

        debug!(
            execution_id = %ctx.execution_id,
            steps = %step_list(calls),
            limit,
            "Running parallel group"
        );

        let semaphore = Semaphore::new(limit);
        let variables = &ctx.variables;
        let cancel = &ctx.cancel;

        let invocations = calls.iter().map(|call| {
            let semaphore = &semaphore;
            async move {
                let _permit = semaphore.acquire().await;
                self.invoke_one(call, variables, cancel).await
            }
        });
        let results = join_all(invocations).await;

        // Published only after the whole group is done
        for result in &results {
            ctx.record(result);
        }

        results
    }

    /// One at a time, in list order; stops at the first failure.
    pub(crate) async fn run_sequential(
        &self,
        calls: &[&ToolCall],
        ctx: &mut ExecutionContext,
    ) -> Vec<ToolExecutionResult> {
        let mut results = Vec::with_capacity(calls.len());

        for (index, call) in calls.iter().enumerate() {
            if ctx.is_cancelled() {
                ctx.note(format!(
                    "Cancelled before step {}; {} step(s) not started",
                    call.step,
                    calls.len() - index
                ));
                break;
            }

            let result = self.invoke_one(call, &ctx.variables, &ctx.cancel).await;
            ctx.record(&result);

            let failed = !result.success;
            results.push(result);

            if failed {
                let remaining = calls.len() - index - 1;
                if remaining > 0 {
                    warn!(
                        execution_id = %ctx.execution_id,
                        step = call.step,
                        remaining,
                        "Halting sequential execution after failure"
                    );
                    ctx.note(format!(
                        "Halting: step {} failed, {} remaining step(s) skipped",
                        call.step, remaining
                    ));
                }
                break;
            }
        }

        results
    }

    /// Grouped execution. A failed singleton only starves the steps that
    /// reference its variable; later independent groups still run.
    pub(crate) async fn run_hybrid(
        &self,
        plan: &Plan,
        ctx: &mut ExecutionContext,
    ) -> Vec<ToolExecutionResult> {
        let groups = group_by_dependency(&plan.tool_calls);
        ctx.note(format!(
            "Dependency grouping produced {} group(s)",
            groups.len()
        ));

        let mut results = Vec::with_capacity(plan.tool_calls.len());

        for (index, group) in groups.iter().enumerate() {
            if ctx.is_cancelled() {
                ctx.note(format!(
                    "Cancelled before group {}; {} group(s) not started",
                    index + 1,
                    groups.len() - index
                ));
                break;
            }

            ctx.note(format!(
                "Group {} ({}): steps {}",
                index + 1,
                group.kind,
                step_list(&group.calls)
            ));

            debug!(
                execution_id = %ctx.execution_id,
                group = index + 1,
                kind = %group.kind,
                steps = ?group.steps(),
                "Running group"
            );

            let produced = match group.kind {
                GroupKind::Parallel => self.run_parallel(&group.calls, ctx).await,
                GroupKind::Sequential => self.run_sequential(&group.calls, ctx).await,
            };
            results.extend(produced);
        }

        results
    }
}

fn step_list(calls: &[&ToolCall]) -> String {
    calls
        .iter()
        .map(|call| call.step.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
