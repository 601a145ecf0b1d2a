// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Strategy dispatch.
//!
//! The controller hands each record to the strategy matching its type;
//! strategies return a [`Flow`] telling the controller where to go next.

mod conditional;
mod decision;
mod parallel;
mod sequential;

use crate::eval::EvalContext;
use crate::expr::parse_expression;
use crate::runner::TaskContext;
use crate::subst::SubstEnv;
use tasker_core::task::{TaskId, TaskRecord, TaskType};
use tasker_core::{ExitCode, TaskResult};

pub use parallel::effective_parallelism;

/// Where the workflow goes after a record completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Continue at this task id.
    Goto(TaskId),
    /// Terminate with a category exit code.
    Stop(ExitCode),
    /// Terminate with an explicit `return=` code.
    Return(i32),
}

/// Execute one record with the strategy its type selects.
///
/// `last` is the most recently executed task (id and result), consulted
/// by decision nodes.
pub async fn execute(
    ctx: &TaskContext,
    record: &TaskRecord,
    last: Option<&(TaskId, TaskResult)>,
) -> Flow {
    match record.task_type {
        TaskType::Normal => sequential::run(ctx, record).await,
        TaskType::Parallel => parallel::run(ctx, record).await,
        TaskType::Conditional => conditional::run(ctx, record).await,
        TaskType::Decision => decision::run(ctx, record, last),
        TaskType::Return => {
            let code = record.return_code.unwrap_or(0);
            ctx.store.insert(record.id, TaskResult::synthetic(code == 0));
            tracing::info!(task = record.id, code, "return task; ending workflow");
            Flow::Return(code)
        }
    }
}

/// Shared continuation decision, applied after a task or block has a
/// final success verdict:
///
/// 1. `next=never` terminates (success code, or the failure code).
/// 2. `on_success`/`on_failure` route by the verdict.
/// 3. A `next` expression decides continuation: true falls through to
///    `id + 1`, false terminates with exit 14.
/// 4. Default: success falls through, failure terminates with
///    `failure_code`.
///
/// Falling through past the last task ends the workflow successfully.
fn route_after(
    ctx: &TaskContext,
    record: &TaskRecord,
    success: bool,
    eval_ctx: &EvalContext<'_>,
    failure_code: ExitCode,
) -> Flow {
    if record.next.as_deref() == Some("never") {
        return Flow::Stop(if success {
            ExitCode::Success
        } else {
            failure_code
        });
    }

    if success {
        if let Some(target) = record.on_success {
            return Flow::Goto(target);
        }
    } else if let Some(target) = record.on_failure {
        return Flow::Goto(target);
    }

    match record.next.as_deref() {
        // `loop` routing is consumed by the sequential strategy before it
        // gets here; a finished loop falls through like a plain task.
        None | Some("loop") => {
            if success {
                fall_through(ctx, record)
            } else {
                Flow::Stop(failure_code)
            }
        }
        Some(text) => {
            let proceed = match parse_expression(text) {
                Ok(expr) => {
                    let env = SubstEnv::new(&ctx.globals, &ctx.store);
                    crate::eval::evaluate(&expr, eval_ctx, &env)
                }
                Err(error) => {
                    tracing::error!(task = record.id, next = text, %error, "next expression failed to parse");
                    false
                }
            };
            if proceed {
                fall_through(ctx, record)
            } else {
                tracing::info!(task = record.id, next = text, "next condition not met; ending workflow");
                Flow::Stop(ExitCode::NextConditionNotMet)
            }
        }
    }
}

fn fall_through(ctx: &TaskContext, record: &TaskRecord) -> Flow {
    let next = record.id + 1;
    if ctx.records.contains_key(&next) {
        Flow::Goto(next)
    } else {
        Flow::Stop(ExitCode::Success)
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
