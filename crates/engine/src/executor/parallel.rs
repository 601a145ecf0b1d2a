// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Parallel strategy: bounded fan-out over explicit subtasks or an
//! auto-generated per-hostname set, with per-subtask retry, a wave-scaled
//! master deadline, and aggregate-driven routing.

use super::{route_after, Flow};
use crate::eval::EvalContext;
use crate::runner::{run_task_with_retry, TaskContext, TaskSetup};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tasker_core::limits::{subtask_id, DEFAULT_MAX_PARALLEL, POOL_HARD_CAP};
use tasker_core::task::{TaskId, TaskRecord, TaskType};
use tasker_core::{Aggregate, ExitCode, TaskResult};
use tasker_exec::{cancel_pair, Cancel};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Worker-pool size: `max_parallel` (default 8) bounded by twice the CPU
/// count and the hard cap.
pub fn effective_parallelism(max_parallel: Option<usize>) -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    max_parallel
        .unwrap_or(DEFAULT_MAX_PARALLEL)
        .min(2 * cpus)
        .min(POOL_HARD_CAP)
        .max(1)
}

/// Split the parent's `success` expression between the two layers:
/// aggregate expressions (`min_success=N`, `all_success`, ...) judge the
/// block and stay with the parent; anything else (e.g. `stdout~OK`)
/// judges each host and is copied into the synthesized subtasks.
fn split_success(text: Option<&str>) -> (Option<String>, Option<String>) {
    let Some(text) = text else {
        return (None, None);
    };
    match crate::expr::parse_expression(text) {
        Ok(expr) if uses_aggregates(&expr) => (Some(text.to_string()), None),
        _ => (None, Some(text.to_string())),
    }
}

fn uses_aggregates(expr: &crate::expr::Expr) -> bool {
    use crate::expr::{Expr, Predicate};
    match expr {
        Expr::Or(terms) | Expr::And(terms) => terms.iter().any(uses_aggregates),
        Expr::Pred(pred) => matches!(
            pred,
            Predicate::AllSuccess
                | Predicate::AnySuccess
                | Predicate::MajoritySuccess
                | Predicate::MinSuccess(_)
                | Predicate::MaxFailed(_)
        ),
    }
}

pub(super) async fn run(ctx: &TaskContext, record: &TaskRecord) -> Flow {
    let (parent_success, subtask_success) = split_success(record.success.as_deref());
    let subtasks = match build_subtasks(ctx, record, subtask_success) {
        Ok(subtasks) => subtasks,
        Err(missing) => {
            tracing::error!(task = record.id, missing, "parallel subtask does not exist");
            return Flow::Stop(ExitCode::DependencyFailed);
        }
    };
    let total = subtasks.len();
    let pool = effective_parallelism(record.max_parallel);
    let waves = total.div_ceil(pool).max(1);

    // Block-scoped cancellation: trips on the global shutdown flag or the
    // wave-scaled master deadline, whichever comes first.
    let (block_source, block_cancel) = cancel_pair();
    let timed_out = Arc::new(AtomicBool::new(false));
    let deadline = record
        .timeout
        .map(|secs| Duration::from_secs(secs * waves as u64));
    let monitor = {
        let global = ctx.cancel.clone();
        let timed_out = Arc::clone(&timed_out);
        tokio::spawn(async move {
            match deadline {
                Some(deadline) => {
                    tokio::select! {
                        _ = global.cancelled() => {}
                        _ = tokio::time::sleep(deadline) => {
                            timed_out.store(true, Ordering::SeqCst);
                        }
                    }
                }
                None => global.cancelled().await,
            }
            block_source.cancel();
        })
    };

    tracing::info!(
        task = record.id,
        total,
        pool,
        deadline_secs = deadline.map(|d| d.as_secs()),
        "parallel block starting"
    );

    let semaphore = Arc::new(Semaphore::new(pool));
    let mut set: JoinSet<Option<(bool, bool)>> = JoinSet::new();
    for (subtask, token) in subtasks {
        let worker_ctx = with_cancel(ctx, block_cancel.clone());
        let semaphore = Arc::clone(&semaphore);
        set.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return None;
            };
            // Safe point: do not start work after cancellation.
            if worker_ctx.cancel.is_cancelled() {
                return None;
            }
            let setup = TaskSetup {
                task_token: token,
                iteration: None,
            };
            let result = run_task_with_retry(&worker_ctx, &subtask, setup).await;
            if cancelled_mid_run(&worker_ctx.cancel, &result) {
                return None;
            }
            Some((result.success, result.timed_out()))
        });
    }

    let mut outcomes = Vec::with_capacity(total);
    let mut any_timed_out = false;
    while let Some(joined) = set.join_next().await {
        if let Ok(Some((success, timed))) = joined {
            outcomes.push(success);
            any_timed_out |= timed;
        }
    }
    monitor.abort();

    let aggregate = Aggregate::from_outcomes(&outcomes, total);
    ctx.store.set_aggregate(record.id, aggregate);

    // Layering: per-subtask success expressions fed the aggregate above;
    // the parent's own success/next operate on the counters.
    let parent_success = match &parent_success {
        Some(text) => {
            let eval_ctx = EvalContext::for_aggregate(aggregate);
            parse_and_eval(ctx, record, text, &eval_ctx)
        }
        None => aggregate.all_success(),
    };
    ctx.store
        .insert(record.id, TaskResult::synthetic(parent_success));

    let block_timed_out = timed_out.load(Ordering::SeqCst);
    tracing::info!(
        task = record.id,
        success_count = aggregate.success_count,
        failed_count = aggregate.failed_count,
        total_count = aggregate.total_count,
        parent_success,
        block_timed_out,
        "parallel block finished"
    );

    let failure_code = if block_timed_out || any_timed_out {
        ExitCode::TaskTimeout
    } else {
        ExitCode::ParallelFailed
    };
    let mut eval_ctx = EvalContext::for_aggregate(aggregate);
    eval_ctx.success = Some(parent_success);
    route_after(ctx, record, parent_success, &eval_ctx, failure_code)
}

/// Subtask records plus the `@task@` token value for synthesized ones.
fn build_subtasks(
    ctx: &TaskContext,
    record: &TaskRecord,
    subtask_success: Option<String>,
) -> Result<Vec<(TaskRecord, Option<TaskId>)>, TaskId> {
    if !record.hostnames.is_empty() {
        return Ok(record
            .hostnames
            .iter()
            .enumerate()
            .map(|(index, hostname)| {
                let id = subtask_id(record.id, index as TaskId);
                let mut subtask = TaskRecord::new(id, TaskType::Normal);
                subtask.hostname = Some(hostname.clone());
                subtask.command = record.command.clone();
                subtask.arguments = record.arguments.clone();
                subtask.exec = record.exec.clone();
                subtask.timeout = record.timeout;
                subtask.sleep = record.sleep;
                subtask.condition = record.condition.clone();
                subtask.success = subtask_success.clone();
                subtask.stdout_split = record.stdout_split;
                subtask.stderr_split = record.stderr_split;
                subtask.retry_count = record.retry_count;
                subtask.retry_delay = record.retry_delay;
                (subtask, Some(id))
            })
            .collect());
    }
    let mut subtasks = Vec::with_capacity(record.tasks.len());
    for id in &record.tasks {
        let subtask = ctx.records.get(id).ok_or(*id)?;
        subtasks.push((subtask.clone(), None));
    }
    Ok(subtasks)
}

/// Heuristic for "this result is a cancellation artifact, not a real
/// failure": the block was cancelled and the child was killed before
/// producing an exit status.
fn cancelled_mid_run(cancel: &Cancel, result: &TaskResult) -> bool {
    cancel.is_cancelled() && result.exit_code == -1 && !result.skipped
}

fn with_cancel(ctx: &TaskContext, cancel: Cancel) -> TaskContext {
    TaskContext {
        cancel,
        ..ctx.clone()
    }
}

fn parse_and_eval(
    ctx: &TaskContext,
    record: &TaskRecord,
    text: &str,
    eval_ctx: &EvalContext<'_>,
) -> bool {
    match crate::expr::parse_expression(text) {
        Ok(expr) => {
            let env = crate::subst::SubstEnv::new(&ctx.globals, &ctx.store);
            crate::eval::evaluate(&expr, eval_ctx, &env)
        }
        Err(error) => {
            tracing::error!(task = record.id, success = text, %error, "success expression failed to parse");
            false
        }
    }
}
