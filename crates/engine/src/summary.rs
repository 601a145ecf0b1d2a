// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run summaries: the JSON artifact and the project TSV append.

use crate::controller::RunReport;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tasker_core::limits::INLINE_SUBST_CAP;
use tasker_core::task::TaskId;
use tasker_core::text::{sanitize_filename, sanitize_tsv_field};
use tasker_core::ResultStore;

/// Retry window for the TSV append lock.
const TSV_LOCK_TIMEOUT: Duration = Duration::from_secs(5);
const TSV_LOCK_RETRY: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowMetadata {
    pub task_file: String,
    /// 8-hex run identifier
    pub execution_id: String,
    pub status: String,
    pub start_time: String,
    pub end_time: String,
    pub duration_seconds: f64,
    pub log_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSummary {
    pub total_tasks: usize,
    pub executed: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub timeouts: usize,
    pub execution_path: Vec<TaskId>,
    pub final_task: Option<TaskId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_info: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResultSummary {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

/// The `--output-json` artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub workflow_metadata: WorkflowMetadata,
    pub execution_summary: ExecutionSummary,
    pub task_results: BTreeMap<String, TaskResultSummary>,
    pub variables: BTreeMap<String, String>,
}

impl WorkflowSummary {
    /// Assemble the artifact from the run report and the result store.
    /// Stream content is bounded by the inline cap.
    pub fn build(
        metadata: WorkflowMetadata,
        report: &RunReport,
        store: &ResultStore,
        globals: &IndexMap<String, String>,
        total_tasks: usize,
    ) -> Self {
        let mut task_results = BTreeMap::new();
        let mut failed = 0;
        let mut timeouts = 0;
        for id in store.ids() {
            let Some(result) = store.get(id) else { continue };
            if !result.success && !result.skipped {
                failed += 1;
            }
            if result.timed_out() {
                timeouts += 1;
            }
            task_results.insert(
                id.to_string(),
                TaskResultSummary {
                    exit_code: result.exit_code,
                    stdout: result.stdout.inline(INLINE_SUBST_CAP),
                    stderr: result.stderr.inline(INLINE_SUBST_CAP),
                    success: result.success,
                },
            );
        }

        WorkflowSummary {
            workflow_metadata: metadata,
            execution_summary: ExecutionSummary {
                total_tasks,
                executed: store.len(),
                succeeded: store.succeeded(),
                failed,
                timeouts,
                execution_path: report.execution_path.clone(),
                final_task: report.final_task,
                failure_info: report.failure.clone(),
            },
            task_results,
            variables: globals
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    /// Atomic write via temp-then-rename in the target directory.
    pub fn write(&self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let tmp = path.with_extension("tmp");
        let body = serde_json::to_vec_pretty(self)
            .map_err(|e| std::io::Error::other(e.to_string()))?;
        std::fs::write(&tmp, body)?;
        std::fs::rename(&tmp, path)
    }
}

/// Appends one TSV line per workflow execution to
/// `<logdir>/project/<PROJECT>.summary` under an exclusive lock file.
#[derive(Debug, Clone)]
pub struct SummaryWriter {
    log_dir: PathBuf,
}

impl SummaryWriter {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        SummaryWriter {
            log_dir: log_dir.into(),
        }
    }

    pub fn project_summary_path(&self, project: &str) -> PathBuf {
        self.log_dir
            .join("project")
            .join(format!("{}.summary", sanitize_filename(project)))
    }

    /// Append the run record: timestamp, status, exit_code, task_file,
    /// final_task_id, final_hostname, final_command, log_file_ref.
    pub fn append_project_record(
        &self,
        project: &str,
        report: &RunReport,
        store: &ResultStore,
        task_file: &str,
        final_command: &str,
        log_file: &str,
    ) -> std::io::Result<()> {
        let path = self.project_summary_path(project);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let final_hostname = report
            .final_task
            .and_then(|id| store.get(id))
            .map(|result| result.hostname)
            .unwrap_or_default();
        let fields = [
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            report.status.clone(),
            report.exit_code.to_string(),
            task_file.to_string(),
            report
                .final_task
                .map(|id| id.to_string())
                .unwrap_or_default(),
            final_hostname,
            final_command.to_string(),
            log_file.to_string(),
        ];
        let line = fields
            .iter()
            .map(|f| sanitize_tsv_field(f))
            .collect::<Vec<_>>()
            .join("\t");

        let _guard = TsvLock::acquire(&path)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        writeln!(file, "{}", line)
    }
}

/// Exclusive append lock: a sibling `.lock` file created exclusively,
/// retried up to the timeout.
struct TsvLock {
    path: PathBuf,
}

impl TsvLock {
    fn acquire(summary_path: &Path) -> std::io::Result<TsvLock> {
        let path = summary_path.with_extension("summary.lock");
        let deadline = std::time::Instant::now() + TSV_LOCK_TIMEOUT;
        loop {
            match std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
            {
                Ok(_) => return Ok(TsvLock { path }),
                Err(error) if error.kind() == std::io::ErrorKind::AlreadyExists => {
                    if std::time::Instant::now() >= deadline {
                        return Err(std::io::Error::new(
                            std::io::ErrorKind::TimedOut,
                            "project summary lock busy",
                        ));
                    }
                    std::thread::sleep(TSV_LOCK_RETRY);
                }
                Err(error) => return Err(error),
            }
        }
    }
}

impl Drop for TsvLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
#[path = "summary_tests.rs"]
mod tests;
