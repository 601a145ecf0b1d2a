// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Conditional strategy: evaluate the guard, run one branch sequentially,
//! route on the branch aggregate.

use super::{route_after, Flow};
use crate::eval::EvalContext;
use crate::expr::parse_expression;
use crate::runner::{run_task_with_retry, TaskContext, TaskSetup};
use crate::subst::SubstEnv;
use tasker_core::task::TaskRecord;
use tasker_core::{Aggregate, ExitCode, TaskResult};

pub(super) async fn run(ctx: &TaskContext, record: &TaskRecord) -> Flow {
    let condition = record.condition.as_deref().unwrap_or("never");
    let branch_true = match parse_expression(condition) {
        Ok(expr) => {
            let env = SubstEnv::new(&ctx.globals, &ctx.store);
            crate::eval::evaluate(&expr, &EvalContext::default(), &env)
        }
        Err(error) => {
            tracing::error!(task = record.id, condition, %error, "condition failed to parse");
            false
        }
    };

    let branch = if branch_true {
        &record.if_true_tasks
    } else {
        &record.if_false_tasks
    };
    tracing::info!(
        task = record.id,
        condition,
        branch_true,
        subtasks = branch.len(),
        "conditional branch selected"
    );

    let mut outcomes = Vec::with_capacity(branch.len());
    for id in branch {
        if ctx.cancel.is_cancelled() {
            break;
        }
        let Some(subtask) = ctx.records.get(id) else {
            tracing::error!(task = record.id, missing = id, "branch subtask does not exist");
            return Flow::Stop(ExitCode::DependencyFailed);
        };
        let result = run_task_with_retry(ctx, subtask, TaskSetup::default()).await;
        outcomes.push(result.success);
    }

    let aggregate = Aggregate::from_outcomes(&outcomes, branch.len());
    ctx.store.set_aggregate(record.id, aggregate);

    // The branch verdict defaults to all_success; a `success` expression
    // on the parent may override it with other aggregate criteria.
    let parent_success = match &record.success {
        Some(text) => match parse_expression(text) {
            Ok(expr) => {
                let env = SubstEnv::new(&ctx.globals, &ctx.store);
                crate::eval::evaluate(&expr, &EvalContext::for_aggregate(aggregate), &env)
            }
            Err(error) => {
                tracing::error!(task = record.id, success = text, %error, "success expression failed to parse");
                false
            }
        },
        None => aggregate.all_success(),
    };
    ctx.store
        .insert(record.id, TaskResult::synthetic(parent_success));

    let mut eval_ctx = EvalContext::for_aggregate(aggregate);
    eval_ctx.success = Some(parent_success);
    route_after(
        ctx,
        record,
        parent_success,
        &eval_ctx,
        ExitCode::ConditionalFailed,
    )
}
