// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared per-task execution preamble.
//!
//! Every strategy funnels single-task execution through here: condition
//! guard, variable substitution, argv rendering, spawn with capture,
//! split application, success evaluation, result storage, and the
//! post-task sleep. Routing stays with the calling strategy.

use crate::eval::{evaluate, EvalContext};
use crate::expr::parse_expression;
use crate::subst::{substitute, SubstEnv};
use indexmap::IndexMap;
use std::sync::Arc;
use std::time::Duration;
use tasker_core::limits::INLINE_SUBST_CAP;
use tasker_core::task::{TaskId, TaskRecord};
use tasker_core::{ResultStore, StreamData, TaskResult};
use tasker_exec::{Cancel, CommandSpec, ExecConfig, RenderContext, RunStatus, Runner};

/// Shared dependencies for task execution, cloned into every strategy.
#[derive(Debug, Clone)]
pub struct TaskContext {
    pub records: Arc<IndexMap<TaskId, TaskRecord>>,
    pub globals: Arc<IndexMap<String, String>>,
    pub store: ResultStore,
    pub runner: Runner,
    pub exec_config: Arc<ExecConfig>,
    pub cancel: Cancel,
    /// Default per-task timeout (CLI `-o/--timeout` or environment).
    pub default_timeout: u64,
    /// Default execution type (CLI `-t/--type` or environment).
    pub default_exec: String,
}

/// Per-invocation knobs that differ between strategies.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaskSetup {
    /// Value of `@task@` during rendering (parallel-hostnames subtasks).
    pub task_token: Option<TaskId>,
    /// Loop iteration, for `id.k` labels in logs.
    pub iteration: Option<u32>,
}

impl TaskContext {
    fn subst_env<'a>(&'a self, setup: &TaskSetup) -> SubstEnv<'a> {
        let env = SubstEnv::new(&self.globals, &self.store);
        match setup.task_token {
            Some(id) => env.with_task_token(id),
            None => env,
        }
    }

    /// Evaluate a guard/success expression string; parse failures are
    /// treated as false (the validator reports them ahead of execution).
    fn eval_text(&self, text: &str, ctx: &EvalContext<'_>, setup: &TaskSetup) -> bool {
        match parse_expression(text) {
            Ok(expr) => evaluate(&expr, ctx, &self.subst_env(setup)),
            Err(error) => {
                tracing::error!(expression = text, %error, "expression failed to parse; treating as false");
                false
            }
        }
    }

    /// Pretty task label, `id` or `id.k` inside a loop.
    fn label(record: &TaskRecord, setup: &TaskSetup) -> String {
        match setup.iteration {
            Some(k) => format!("{}.{}", record.id, k),
            None => record.id.to_string(),
        }
    }
}

/// Execute one attempt of one record and store its result under the
/// record id. Returns the stored result.
pub async fn run_task(
    ctx: &TaskContext,
    record: &TaskRecord,
    setup: TaskSetup,
) -> TaskResult {
    let label = TaskContext::label(record, &setup);

    // 1. Condition guard
    if let Some(condition) = &record.condition {
        let guard = ctx.eval_text(condition, &EvalContext::default(), &setup);
        if !guard {
            tracing::info!(task = %label, condition, "condition false; skipping");
            let result = TaskResult::skipped(record.hostname.clone().unwrap_or_default());
            ctx.store.insert(record.id, result.clone());
            return result;
        }
    }

    // 2. Resolve placeholders
    let env = ctx.subst_env(&setup);
    let hostname = substitute(record.hostname.as_deref().unwrap_or(""), &env);
    let command = substitute(record.command.as_deref().unwrap_or(""), &env);
    let arguments = substitute(record.arguments.as_deref().unwrap_or(""), &env);

    // 3. Render argv
    let exec = record.exec.as_deref().unwrap_or(&ctx.default_exec);
    let argv = match ctx.exec_config.render(
        exec,
        &RenderContext {
            hostname: &hostname,
            command: &command,
            arguments: &arguments,
        },
    ) {
        Ok(argv) => argv,
        Err(error) => {
            tracing::error!(task = %label, exec, %error, "argv rendering failed");
            let result = failed_result(&hostname, error.to_string());
            ctx.store.insert(record.id, result.clone());
            return result;
        }
    };

    // 4. Spawn with timeout and capture
    let spec = CommandSpec {
        argv,
        timeout: Duration::from_secs(record.effective_timeout(ctx.default_timeout)),
    };
    tracing::info!(task = %label, hostname = %hostname, command = %command, exec, "executing");
    let outcome = match ctx.runner.run(&spec, &ctx.cancel).await {
        Ok(outcome) => outcome,
        Err(error) => {
            tracing::error!(task = %label, %error, "spawn failed");
            let result = failed_result(&hostname, error.to_string());
            ctx.store.insert(record.id, result.clone());
            return result;
        }
    };

    // 5. Stream splits
    let stdout = apply_split(outcome.stdout, record.stdout_split);
    let stderr = apply_split(outcome.stderr, record.stderr_split);

    let mut result = TaskResult {
        exit_code: outcome.exit_code,
        stdout,
        stderr,
        success: false,
        skipped: false,
        hostname,
        duration: outcome.duration,
    };

    // 6. Success evaluation (default: exit code 0)
    result.success = match (&record.success, outcome.status) {
        // A timed-out or cancelled child never satisfies success.
        (_, RunStatus::TimedOut) | (_, RunStatus::Cancelled) => false,
        (Some(text), RunStatus::Completed) => {
            ctx.eval_text(text, &EvalContext::for_result(&result), &setup)
        }
        (None, RunStatus::Completed) => result.exit_code == 0,
    };

    tracing::info!(
        task = %label,
        exit_code = result.exit_code,
        success = result.success,
        duration = %format!("{:.2}s", result.duration),
        "task finished"
    );

    // 7. Store, then the post-task pause. The pause is suppressed only
    // when cancellation arrived before it begins; once sleeping, it runs
    // to completion outside any deadline.
    ctx.store.insert(record.id, result.clone());
    if let Some(sleep) = record.sleep {
        if sleep > 0 && !ctx.cancel.is_cancelled() {
            tracing::debug!(task = %label, sleep, "post-task sleep");
            tokio::time::sleep(Duration::from_secs(sleep)).await;
        }
    }

    result
}

/// Retry wrapper: attempts = 1 + `retry_count`, with `retry_delay`
/// between attempts. The retry decision is made on the task's own
/// success evaluation; skipped tasks are not retried.
pub async fn run_task_with_retry(
    ctx: &TaskContext,
    record: &TaskRecord,
    setup: TaskSetup,
) -> TaskResult {
    let attempts = 1 + record.retry_count.unwrap_or(0);
    let delay = record.retry_delay.unwrap_or(0);

    let mut result = run_task(ctx, record, setup).await;
    let mut attempt = 1;
    while !result.success && !result.skipped && attempt < attempts {
        if ctx.cancel.is_cancelled() {
            break;
        }
        if delay > 0 {
            tokio::time::sleep(Duration::from_secs(delay)).await;
        }
        if ctx.cancel.is_cancelled() {
            break;
        }
        attempt += 1;
        tracing::info!(task = record.id, attempt, attempts, "retrying");
        result = run_task(ctx, record, setup).await;
    }
    result
}

/// Result for a task that could not produce a child outcome (render or
/// spawn failure). Routed like any other failure.
fn failed_result(hostname: &str, message: String) -> TaskResult {
    TaskResult {
        exit_code: 127,
        stdout: StreamData::empty(),
        stderr: StreamData::Memory(message),
        success: false,
        skipped: false,
        hostname: hostname.to_string(),
        duration: 0.0,
    }
}

/// Apply a `delimiter,index` split; out-of-bounds keeps the original
/// stream. Splitting reads at most the inline cap of a file-backed
/// stream.
fn apply_split(
    data: StreamData,
    split: Option<tasker_core::task::SplitSpec>,
) -> StreamData {
    let Some(split) = split else { return data };
    let text = data.inline(INLINE_SUBST_CAP);
    match split.apply(text.trim_end_matches('\n')) {
        Some(field) => StreamData::Memory(field),
        None => data,
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
