// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task results and the memory-or-file stream representation.

use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::{Path, PathBuf};

/// A captured output stream: small streams stay in memory, large ones are
/// backed by a session-owned scratch file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamData {
    Memory(String),
    File { path: PathBuf, size: u64 },
}

impl StreamData {
    /// Empty in-memory stream.
    pub fn empty() -> Self {
        StreamData::Memory(String::new())
    }

    /// Size in bytes.
    pub fn len(&self) -> u64 {
        match self {
            StreamData::Memory(s) => s.len() as u64,
            StreamData::File { size, .. } => *size,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Backing file path, when the stream spilled to disk.
    pub fn file_path(&self) -> Option<&Path> {
        match self {
            StreamData::Memory(_) => None,
            StreamData::File { path, .. } => Some(path),
        }
    }

    /// Stream content truncated to at most `cap` bytes, for inlining into
    /// argv or the summary. File-backed streams read only the prefix.
    pub fn inline(&self, cap: usize) -> String {
        match self {
            StreamData::Memory(s) => truncate_utf8(s, cap),
            StreamData::File { path, .. } => {
                let mut buf = vec![0u8; cap];
                let read = std::fs::File::open(path)
                    .and_then(|mut f| {
                        let mut total = 0;
                        loop {
                            let n = f.read(&mut buf[total..])?;
                            if n == 0 {
                                break;
                            }
                            total += n;
                            if total == buf.len() {
                                break;
                            }
                        }
                        Ok(total)
                    })
                    .unwrap_or(0);
                String::from_utf8_lossy(&buf[..read]).into_owned()
            }
        }
    }

    /// Count of lines in the stream (bounded by the inline cap for
    /// file-backed streams).
    pub fn line_count(&self, cap: usize) -> usize {
        let text = self.inline(cap);
        if text.is_empty() {
            0
        } else {
            text.lines().count()
        }
    }
}

/// Truncate at a char boundary at or below `cap` bytes.
fn truncate_utf8(s: &str, cap: usize) -> String {
    if s.len() <= cap {
        return s.to_string();
    }
    let mut end = cap;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

/// Result of one executed (or skipped) task. Created by the executing
/// strategy and retained for the workflow duration; loop iterations
/// overwrite, keeping the last.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub exit_code: i32,
    pub stdout: StreamData,
    pub stderr: StreamData,
    pub success: bool,
    pub skipped: bool,
    pub hostname: String,
    /// Wall-clock seconds spent in the child, zero when skipped
    pub duration: f64,
}

impl TaskResult {
    /// Result for a task whose `condition` guard evaluated false.
    pub fn skipped(hostname: impl Into<String>) -> Self {
        TaskResult {
            exit_code: -1,
            stdout: StreamData::empty(),
            stderr: StreamData::empty(),
            success: false,
            skipped: true,
            hostname: hostname.into(),
            duration: 0.0,
        }
    }

    /// Synthetic result for a non-executing node (decision, return).
    pub fn synthetic(success: bool) -> Self {
        TaskResult {
            exit_code: if success { 0 } else { 1 },
            stdout: StreamData::empty(),
            stderr: StreamData::empty(),
            success,
            skipped: false,
            hostname: String::new(),
            duration: 0.0,
        }
    }

    pub fn stdout_file(&self) -> Option<&Path> {
        self.stdout.file_path()
    }

    pub fn stderr_file(&self) -> Option<&Path> {
        self.stderr.file_path()
    }

    /// Whether this task ran a child that timed out.
    pub fn timed_out(&self) -> bool {
        self.exit_code == crate::ExitCode::TaskTimeout.code()
    }
}

/// Aggregate counters of a completed parallel or conditional block,
/// computed once on block completion and stored under the parent id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregate {
    pub success_count: usize,
    pub failed_count: usize,
    pub total_count: usize,
}

impl Aggregate {
    /// Count outcomes of a completed block. Cancelled subtasks have no
    /// result and leave `success_count + failed_count < total_count`.
    pub fn from_outcomes(outcomes: &[bool], total: usize) -> Self {
        let success_count = outcomes.iter().filter(|ok| **ok).count();
        Aggregate {
            success_count,
            failed_count: outcomes.len() - success_count,
            total_count: total,
        }
    }

    pub fn all_success(&self) -> bool {
        self.success_count == self.total_count
    }

    pub fn any_success(&self) -> bool {
        self.success_count > 0
    }

    pub fn majority_success(&self) -> bool {
        self.success_count * 2 > self.total_count
    }

    pub fn min_success(&self, n: usize) -> bool {
        self.success_count >= n
    }

    pub fn max_failed(&self, n: usize) -> bool {
        self.failed_count <= n
    }
}

#[cfg(test)]
#[path = "result_tests.rs"]
mod tests;
