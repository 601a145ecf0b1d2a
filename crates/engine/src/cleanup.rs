// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-of-run cleanup and the alert-on-failure hook.
//!
//! Cleanup runs exactly once per process — signal paths and the normal
//! exit path both funnel here — and removes only session-owned scratch
//! files. The alert hook is bounded and never fatal to cleanup.

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tasker_core::limits::ALERT_HOOK_TIMEOUT_SECS;
use tasker_exec::TempTracker;

/// One-shot cleanup of session-created temp files.
#[derive(Debug, Clone)]
pub struct CleanupManager {
    tracker: TempTracker,
    ran: Arc<AtomicBool>,
}

impl CleanupManager {
    pub fn new(tracker: TempTracker) -> Self {
        CleanupManager {
            tracker,
            ran: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Remove tracked scratch files. Idempotent: the second and later
    /// calls are no-ops, so the signal path and the normal path cannot
    /// double-clean.
    pub fn run(&self) -> usize {
        if self.ran.swap(true, Ordering::SeqCst) {
            return 0;
        }
        let mut removed = 0;
        for path in self.tracker.take() {
            match std::fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
                Err(error) => {
                    tracing::warn!(path = %path.display(), %error, "temp file removal failed");
                }
            }
        }
        if removed > 0 {
            tracing::debug!(removed, "temp files cleaned");
        }
        removed
    }
}

/// Values exported to the alert script's environment.
#[derive(Debug, Clone, Default)]
pub struct AlertContext {
    pub log_file: String,
    pub state_file: String,
    pub task_file: String,
    pub failed_task: String,
    pub exit_code: i32,
    pub error: String,
}

/// Alert-on-failure hook: an operator-supplied executable invoked when a
/// workflow fails.
#[derive(Debug, Clone)]
pub struct AlertHook {
    path: PathBuf,
}

impl AlertHook {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        AlertHook { path: path.into() }
    }

    /// Invoke the hook with a hard timeout. Validation happens
    /// immediately before invocation: the path must be a regular file
    /// (no symlinks, no directories) with mode 700.
    pub async fn invoke(&self, ctx: &AlertContext) -> Result<(), String> {
        self.validate()?;

        let mut command = tokio::process::Command::new(&self.path);
        command
            .env("TASKER_LOG_FILE", &ctx.log_file)
            .env("TASKER_STATE_FILE", &ctx.state_file)
            .env("TASKER_TASK_FILE", &ctx.task_file)
            .env("TASKER_FAILED_TASK", &ctx.failed_task)
            .env("TASKER_EXIT_CODE", ctx.exit_code.to_string())
            .env("TASKER_ERROR", &ctx.error)
            .env(
                "TASKER_TIMESTAMP",
                chrono::Utc::now().to_rfc3339(),
            )
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = command
            .spawn()
            .map_err(|e| format!("alert hook spawn failed: {}", e))?;
        match tokio::time::timeout(
            Duration::from_secs(ALERT_HOOK_TIMEOUT_SECS),
            child.wait(),
        )
        .await
        {
            Ok(Ok(status)) if status.success() => Ok(()),
            Ok(Ok(status)) => Err(format!(
                "alert hook exited with {}",
                status.code().unwrap_or(-1)
            )),
            Ok(Err(error)) => Err(format!("alert hook wait failed: {}", error)),
            Err(_) => {
                let _ = child.start_kill();
                Err(format!(
                    "alert hook timed out after {}s",
                    ALERT_HOOK_TIMEOUT_SECS
                ))
            }
        }
    }

    fn validate(&self) -> Result<(), String> {
        let meta = std::fs::symlink_metadata(&self.path)
            .map_err(|e| format!("alert hook unreadable: {}", e))?;
        if meta.file_type().is_symlink() {
            return Err("alert hook must not be a symlink".to_string());
        }
        if !meta.is_file() {
            return Err("alert hook must be a regular file".to_string());
        }
        let mode = meta.permissions().mode() & 0o777;
        if mode != 0o700 {
            return Err(format!(
                "alert hook must have mode 700, found {:o}",
                mode
            ));
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
#[path = "cleanup_tests.rs"]
mod tests;
