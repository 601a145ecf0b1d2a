// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sequential strategy: one record, optional loop, then routing.

use super::{route_after, Flow};
use crate::eval::EvalContext;
use crate::expr::parse_expression;
use crate::runner::{run_task_with_retry, TaskContext, TaskSetup};
use crate::subst::SubstEnv;
use tasker_core::task::TaskRecord;
use tasker_core::ExitCode;

pub(super) async fn run(ctx: &TaskContext, record: &TaskRecord) -> Flow {
    let result = if record.is_looping() {
        run_loop(ctx, record).await
    } else {
        run_task_with_retry(ctx, record, TaskSetup::default()).await
    };

    // A skipped task continues sequentially regardless of routing.
    if result.skipped {
        return super::fall_through(ctx, record);
    }

    let failure_code = if result.timed_out() {
        ExitCode::TaskTimeout
    } else {
        ExitCode::FinalTaskFailed
    };
    let mut eval_ctx = EvalContext::for_result(&result);
    eval_ctx.success = Some(result.success);
    route_after(ctx, record, result.success, &eval_ctx, failure_code)
}

/// `next=loop` re-execution: up to `loop` iterations, ending early when
/// `loop_break` holds. Iterations are labelled `id.k`; each stores its
/// result, so only the last survives.
async fn run_loop(ctx: &TaskContext, record: &TaskRecord) -> tasker_core::TaskResult {
    let total = record.loop_count.unwrap_or(1);
    let mut iteration = 1;
    let mut result = run_task_with_retry(
        ctx,
        record,
        TaskSetup {
            task_token: None,
            iteration: Some(iteration),
        },
    )
    .await;

    loop {
        if let Some(break_expr) = &record.loop_break {
            if eval_break(ctx, record, break_expr, &result) {
                tracing::info!(task = record.id, iteration, "loop_break satisfied");
                break;
            }
        }
        if iteration >= total {
            break;
        }
        if ctx.cancel.is_cancelled() {
            break;
        }
        iteration += 1;
        result = run_task_with_retry(
            ctx,
            record,
            TaskSetup {
                task_token: None,
                iteration: Some(iteration),
            },
        )
        .await;
    }
    result
}

fn eval_break(
    ctx: &TaskContext,
    record: &TaskRecord,
    text: &str,
    result: &tasker_core::TaskResult,
) -> bool {
    match parse_expression(text) {
        Ok(expr) => {
            let env = SubstEnv::new(&ctx.globals, &ctx.store);
            let mut eval_ctx = EvalContext::for_result(result);
            eval_ctx.success = Some(result.success);
            crate::eval::evaluate(&expr, &eval_ctx, &env)
        }
        Err(error) => {
            tracing::error!(task = record.id, loop_break = text, %error, "loop_break failed to parse");
            false
        }
    }
}
