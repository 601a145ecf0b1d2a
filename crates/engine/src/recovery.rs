// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Recovery-state persistence.
//!
//! Written before each dispatch when `--auto-recovery` is on, removed on
//! success. A later run with `--auto-recovery` resumes from the recorded
//! task; `--show-recovery-info` prints it.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tasker_core::task::TaskId;
use tasker_core::text::sanitize_filename;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryState {
    pub task_file: String,
    pub execution_id: String,
    pub current_task: TaskId,
    pub execution_path: Vec<TaskId>,
    pub updated_at: String,
}

impl RecoveryState {
    /// Per-workflow state file path inside `state_dir`, keyed by the task
    /// file name.
    pub fn path_for(state_dir: &Path, task_file: &Path) -> PathBuf {
        let name = task_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "workflow".to_string());
        state_dir.join(format!("{}.recovery.json", sanitize_filename(&name)))
    }

    /// Atomic write via temp-then-rename in the same directory.
    pub fn write(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(self)
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        std::fs::write(&tmp, body)?;
        std::fs::rename(&tmp, path)
    }

    pub fn load(path: &Path) -> std::io::Result<RecoveryState> {
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(|e| std::io::Error::other(e.to_string()))
    }

    /// Best-effort removal (the success path must not fail on it).
    pub fn remove(path: &Path) {
        let _ = std::fs::remove_file(path);
    }
}

#[cfg(test)]
#[path = "recovery_tests.rs"]
mod tests;
