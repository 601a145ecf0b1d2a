// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Decision strategy: a non-executing routing node.
//!
//! Evaluates its `success` predicate against the most recent result and
//! the stores, then routes. Spawns nothing and produces no output; a
//! synthetic result records the verdict for later references.

use super::{route_after, Flow};
use crate::eval::EvalContext;
use crate::expr::parse_expression;
use crate::runner::TaskContext;
use crate::subst::SubstEnv;
use tasker_core::task::{TaskId, TaskRecord};
use tasker_core::{ExitCode, TaskResult};

pub(super) fn run(
    ctx: &TaskContext,
    record: &TaskRecord,
    last: Option<&(TaskId, TaskResult)>,
) -> Flow {
    let mut eval_ctx = EvalContext::default();
    if let Some((last_id, last_result)) = last {
        eval_ctx.current = Some(last_result);
        eval_ctx.aggregate = ctx.store.aggregate(*last_id);
    }

    let verdict = match record.success.as_deref() {
        Some(text) => match parse_expression(text) {
            Ok(expr) => {
                let env = SubstEnv::new(&ctx.globals, &ctx.store);
                crate::eval::evaluate(&expr, &eval_ctx, &env)
            }
            Err(error) => {
                tracing::error!(task = record.id, success = text, %error, "decision expression failed to parse");
                false
            }
        },
        None => false,
    };

    tracing::info!(task = record.id, verdict, "decision evaluated");
    ctx.store.insert(record.id, TaskResult::synthetic(verdict));

    let mut route_ctx = eval_ctx;
    route_ctx.success = Some(verdict);
    // A decision that routes nowhere on a false verdict ends the workflow
    // like an unmet `next` condition.
    route_after(
        ctx,
        record,
        verdict,
        &route_ctx,
        ExitCode::NextConditionNotMet,
    )
}
