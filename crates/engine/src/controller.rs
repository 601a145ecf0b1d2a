// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow run loop.
//!
//! Single-threaded: picks the next task id, dispatches one executor at a
//! time, routes on the returned [`Flow`], and resolves the terminal exit
//! code. Cancellation (signals, master deadline) is observed between
//! dispatches and inside executors via the shared shutdown flag.

use crate::executor::{execute, Flow};
use crate::recovery::RecoveryState;
use crate::runner::TaskContext;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tasker_core::task::TaskId;
use tasker_core::{ExitCode, TaskResult};
use tasker_exec::CancelSource;

/// Run-wide knobs for the controller.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub start_task: TaskId,
    /// Workflow-wide deadline; cancels everything in flight on expiry.
    pub master_timeout: Option<Duration>,
    /// Write the recovery-state file before each dispatch.
    pub auto_recovery: bool,
    /// Where the recovery-state file lives.
    pub recovery_path: Option<std::path::PathBuf>,
    /// Task file path recorded into recovery state.
    pub task_file: String,
    pub execution_id: String,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig {
            start_task: 0,
            master_timeout: None,
            auto_recovery: false,
            recovery_path: None,
            task_file: String::new(),
            execution_id: String::new(),
        }
    }
}

/// Terminal report of one workflow run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub exit_code: i32,
    /// `success`, `failed`, `interrupted`, or `timeout`.
    pub status: String,
    pub execution_path: Vec<TaskId>,
    pub final_task: Option<TaskId>,
    /// Human-readable cause when the run did not succeed.
    pub failure: Option<String>,
}

impl RunReport {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// Drives a parsed workflow to completion.
pub struct Controller {
    ctx: TaskContext,
    config: ControllerConfig,
    cancel_source: Arc<CancelSource>,
}

impl Controller {
    /// `cancel_source` is shared with the signal handler; the context's
    /// cancel handle must be subscribed to it.
    pub fn new(ctx: TaskContext, config: ControllerConfig, cancel_source: Arc<CancelSource>) -> Self {
        Controller {
            ctx,
            config,
            cancel_source,
        }
    }

    pub async fn run(&self) -> RunReport {
        let mut execution_path: Vec<TaskId> = Vec::new();
        let mut last: Option<(TaskId, TaskResult)> = None;

        // Master deadline: trips the shared shutdown flag so in-flight
        // executors unwind at their next safe point.
        let deadline_fired = Arc::new(AtomicBool::new(false));
        let watchdog = self.config.master_timeout.map(|timeout| {
            let source = Arc::clone(&self.cancel_source);
            let fired = Arc::clone(&deadline_fired);
            let cancel = self.ctx.cancel.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(timeout) => {
                        tracing::error!(timeout_secs = timeout.as_secs(), "master timeout; cancelling workflow");
                        fired.store(true, Ordering::SeqCst);
                        source.cancel();
                    }
                    _ = cancel.cancelled() => {}
                }
            })
        });

        let mut pc = Some(self.config.start_task);
        let mut outcome: Option<(i32, String, Option<String>)> = None;

        while let Some(id) = pc {
            if self.ctx.cancel.is_cancelled() {
                break;
            }
            let Some(record) = self.ctx.records.get(&id) else {
                outcome = Some((
                    ExitCode::DependencyFailed.code(),
                    "failed".to_string(),
                    Some(format!("routed to unknown task {}", id)),
                ));
                break;
            };

            execution_path.push(id);
            self.record_recovery(id, &execution_path);

            tracing::debug!(task = id, task_type = %record.task_type, "dispatching");
            let flow = execute(&self.ctx, record, last.as_ref()).await;
            last = self.ctx.store.get(id).map(|result| (id, result));

            match flow {
                Flow::Goto(next) => pc = Some(next),
                Flow::Return(code) => {
                    outcome = Some((
                        code,
                        if code == 0 { "success" } else { "failed" }.to_string(),
                        (code != 0).then(|| format!("return task {} set exit code {}", id, code)),
                    ));
                    break;
                }
                Flow::Stop(exit) => {
                    let status = if exit.is_success() { "success" } else { "failed" };
                    outcome = Some((
                        exit.code(),
                        status.to_string(),
                        (!exit.is_success()).then(|| {
                            format!("task {}: {}", id, exit.describe())
                        }),
                    ));
                    break;
                }
            }
        }

        if let Some(watchdog) = watchdog {
            watchdog.abort();
        }

        // Cancellation overrides whatever the loop was doing.
        let (exit_code, status, failure) = if self.ctx.cancel.is_cancelled() {
            if deadline_fired.load(Ordering::SeqCst) {
                (
                    ExitCode::TaskTimeout.code(),
                    "timeout".to_string(),
                    Some("master timeout exceeded".to_string()),
                )
            } else {
                (
                    ExitCode::Interrupted.code(),
                    "interrupted".to_string(),
                    Some("interrupted by signal".to_string()),
                )
            }
        } else {
            outcome.unwrap_or((ExitCode::Success.code(), "success".to_string(), None))
        };

        if exit_code == ExitCode::Success.code() {
            self.clear_recovery();
        }

        let report = RunReport {
            exit_code,
            status,
            final_task: execution_path.last().copied(),
            execution_path,
            failure,
        };
        tracing::info!(
            exit_code = report.exit_code,
            status = %report.status,
            tasks = report.execution_path.len(),
            "workflow finished"
        );
        report
    }

    fn record_recovery(&self, current: TaskId, path: &[TaskId]) {
        if !self.config.auto_recovery {
            return;
        }
        let Some(file) = &self.config.recovery_path else {
            return;
        };
        let state = RecoveryState {
            task_file: self.config.task_file.clone(),
            execution_id: self.config.execution_id.clone(),
            current_task: current,
            execution_path: path.to_vec(),
            updated_at: chrono::Utc::now().to_rfc3339(),
        };
        if let Err(error) = state.write(file) {
            tracing::warn!(path = %file.display(), %error, "recovery state write failed");
        }
    }

    fn clear_recovery(&self) {
        if let Some(file) = &self.config.recovery_path {
            RecoveryState::remove(file);
        }
    }
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;
