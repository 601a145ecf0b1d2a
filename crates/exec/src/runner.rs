// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Child-process runner with timeout, cancellation, and streamed capture.

use crate::cancel::Cancel;
use crate::capture::{capture_stream, CaptureLimits, TempTracker};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tasker_core::{ExitCode, StreamData};
use thiserror::Error;
use tokio::process::Command;

/// Errors that prevent a child from producing an outcome at all.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("empty argv")]
    EmptyArgv,

    #[error("failed to spawn '{command}': {source}")]
    Spawn {
        command: String,
        source: std::io::Error,
    },

    #[error("stream capture failed: {0}")]
    Capture(#[from] std::io::Error),
}

/// A fully rendered command, ready to spawn.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub argv: Vec<String>,
    pub timeout: Duration,
}

/// How the child ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    TimedOut,
    Cancelled,
}

/// Outcome of one child run.
#[derive(Debug)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub exit_code: i32,
    pub stdout: StreamData,
    pub stderr: StreamData,
    /// Wall-clock seconds from spawn to exit (or kill).
    pub duration: f64,
}

/// Spawns children and captures their output. Clones share the capture
/// limits and the session temp-file tracker.
#[derive(Debug, Clone)]
pub struct Runner {
    limits: CaptureLimits,
    tracker: TempTracker,
}

impl Runner {
    pub fn new(tracker: TempTracker) -> Self {
        Runner {
            limits: CaptureLimits::default(),
            tracker,
        }
    }

    pub fn with_limits(tracker: TempTracker, limits: CaptureLimits) -> Self {
        Runner { limits, tracker }
    }

    pub fn tracker(&self) -> &TempTracker {
        &self.tracker
    }

    /// Run a command to completion, timeout, or cancellation.
    ///
    /// Output is captured concurrently on both streams; on timeout or
    /// cancellation the child is killed and whatever was captured so far
    /// is returned.
    pub async fn run(&self, spec: &CommandSpec, cancel: &Cancel) -> Result<RunOutcome, RunnerError> {
        let (program, args) = spec.argv.split_first().ok_or(RunnerError::EmptyArgv)?;

        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let start = Instant::now();
        let mut child = command.spawn().map_err(|source| RunnerError::Spawn {
            command: program.clone(),
            source,
        })?;

        // Readers run concurrently with the wait; a slow child can never
        // deadlock on a full pipe.
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let limits = self.limits;
        let out_task = stdout.map(|s| {
            tokio::spawn(capture_stream(s, "tasker_stdout_", limits, self.tracker.clone()))
        });
        let err_task = stderr.map(|s| {
            tokio::spawn(capture_stream(s, "tasker_stderr_", limits, self.tracker.clone()))
        });

        let status = tokio::select! {
            wait = child.wait() => {
                match wait {
                    Ok(status) => (RunStatus::Completed, status.code().unwrap_or(-1)),
                    Err(_) => (RunStatus::Completed, -1),
                }
            }
            _ = tokio::time::sleep(spec.timeout) => {
                tracing::warn!(command = %program, timeout_secs = spec.timeout.as_secs(), "task timed out; killing child");
                let _ = child.start_kill();
                let _ = child.wait().await;
                (RunStatus::TimedOut, ExitCode::TaskTimeout.code())
            }
            _ = cancel.cancelled() => {
                tracing::debug!(command = %program, "cancelled; killing child");
                let _ = child.start_kill();
                let _ = child.wait().await;
                (RunStatus::Cancelled, -1)
            }
        };
        let duration = start.elapsed().as_secs_f64();

        let stdout = collect(out_task).await?;
        let stderr = collect(err_task).await?;

        Ok(RunOutcome {
            status: status.0,
            exit_code: status.1,
            stdout,
            stderr,
            duration,
        })
    }
}

async fn collect(
    task: Option<tokio::task::JoinHandle<std::io::Result<StreamData>>>,
) -> Result<StreamData, RunnerError> {
    match task {
        Some(handle) => match handle.await {
            Ok(data) => Ok(data?),
            Err(join_error) => Err(RunnerError::Capture(std::io::Error::other(
                join_error.to_string(),
            ))),
        },
        None => Ok(StreamData::empty()),
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
