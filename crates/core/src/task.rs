// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task record model.
//!
//! A [`TaskRecord`] is one record from a task file, immutable after parse.
//! Records are identified by a non-negative integer id, unique per file.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Task identifier. Auto-generated parallel subtasks live in the reserved
/// range computed by [`crate::limits::subtask_id`].
pub type TaskId = u32;

/// Field names that open or extend a task record and are therefore rejected
/// as global-variable names.
pub const RESERVED_FIELDS: &[&str] = &[
    "task",
    "hostname",
    "command",
    "arguments",
    "success",
    "condition",
    "exec",
    "timeout",
    "next",
    "on_success",
    "on_failure",
    "loop",
    "loop_break",
    "sleep",
    "return",
    "type",
    "tasks",
    "hostnames",
    "if_true_tasks",
    "if_false_tasks",
    "max_parallel",
    "retry_count",
    "retry_delay",
    "stdout_split",
    "stderr_split",
];

/// Result fields addressable as `@<id>_<field>@` from other tasks.
pub const RESULT_FIELDS: &[&str] = &[
    "stdout",
    "stderr",
    "exit",
    "success",
    "hostname",
    "duration",
    "stdout_file",
    "stderr_file",
    "success_count",
    "failed_count",
    "total_count",
];

/// Execution strategy of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Single command on a single host
    Normal,
    /// Fan-out over explicit subtasks or a hostname list
    Parallel,
    /// Branch into `if_true_tasks` / `if_false_tasks`
    Conditional,
    /// Non-executing routing node
    Decision,
    /// Terminate the workflow with an explicit exit code
    Return,
}

impl TaskType {
    /// Parse an explicit `type=` value.
    pub fn parse(value: &str) -> Option<TaskType> {
        match value {
            "normal" => Some(TaskType::Normal),
            "parallel" => Some(TaskType::Parallel),
            "conditional" => Some(TaskType::Conditional),
            "decision" => Some(TaskType::Decision),
            "return" => Some(TaskType::Return),
            _ => None,
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskType::Normal => write!(f, "normal"),
            TaskType::Parallel => write!(f, "parallel"),
            TaskType::Conditional => write!(f, "conditional"),
            TaskType::Decision => write!(f, "decision"),
            TaskType::Return => write!(f, "return"),
        }
    }
}

/// Delimiter keyword for `stdout_split` / `stderr_split`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Delimiter {
    Space,
    Whitespace,
    Tab,
    Comma,
    Semicolon,
    Colon,
    Pipe,
    Newline,
}

impl Delimiter {
    /// Parse a delimiter keyword (`semi` is accepted for `semicolon`).
    pub fn parse(word: &str) -> Option<Delimiter> {
        match word {
            "space" => Some(Delimiter::Space),
            "whitespace" => Some(Delimiter::Whitespace),
            "tab" => Some(Delimiter::Tab),
            "comma" => Some(Delimiter::Comma),
            "semicolon" | "semi" => Some(Delimiter::Semicolon),
            "colon" => Some(Delimiter::Colon),
            "pipe" => Some(Delimiter::Pipe),
            "newline" => Some(Delimiter::Newline),
            _ => None,
        }
    }

    /// Split `text` into fields by this delimiter.
    pub fn split(self, text: &str) -> Vec<&str> {
        match self {
            Delimiter::Space => text.split(' ').collect(),
            Delimiter::Whitespace => text.split_whitespace().collect(),
            Delimiter::Tab => text.split('\t').collect(),
            Delimiter::Comma => text.split(',').collect(),
            Delimiter::Semicolon => text.split(';').collect(),
            Delimiter::Colon => text.split(':').collect(),
            Delimiter::Pipe => text.split('|').collect(),
            Delimiter::Newline => text.lines().collect(),
        }
    }
}

/// Parsed `delimiter,index` split directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitSpec {
    pub delimiter: Delimiter,
    /// Zero-based field index.
    pub index: usize,
}

impl SplitSpec {
    /// Parse a `delimiter,index` value.
    pub fn parse(value: &str) -> Option<SplitSpec> {
        let (word, idx) = value.split_once(',')?;
        let delimiter = Delimiter::parse(word.trim())?;
        let index = idx.trim().parse().ok()?;
        Some(SplitSpec { delimiter, index })
    }

    /// Extract the selected field; `None` when the index is out of bounds
    /// (callers keep the original stream in that case).
    pub fn apply(self, text: &str) -> Option<String> {
        self.delimiter
            .split(text)
            .get(self.index)
            .map(|s| s.to_string())
    }
}

/// One record of a task file. Immutable after parse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: TaskId,
    pub task_type: TaskType,
    pub hostname: Option<String>,
    pub command: Option<String>,
    pub arguments: Option<String>,
    /// Execution-type name (`local`, `shell`, `pbrun`, ...)
    pub exec: Option<String>,
    /// Per-task timeout in seconds; overrides the CLI default
    pub timeout: Option<u64>,
    /// Post-task pause in seconds, outside the timeout window
    pub sleep: Option<u64>,
    /// Max loop iterations (effective with `next=loop`)
    pub loop_count: Option<u32>,
    /// Loop exit condition, evaluated after each iteration
    pub loop_break: Option<String>,
    /// Pre-execution guard; false means skip
    pub condition: Option<String>,
    /// Success expression; defaults to exit code 0
    pub success: Option<String>,
    /// Continuation expression or `never`/`always`/`loop`
    pub next: Option<String>,
    pub on_success: Option<TaskId>,
    pub on_failure: Option<TaskId>,
    /// Explicit workflow exit code for `return` records
    pub return_code: Option<i32>,
    pub stdout_split: Option<SplitSpec>,
    pub stderr_split: Option<SplitSpec>,
    /// Explicit subtask ids for a parallel record
    pub tasks: Vec<TaskId>,
    /// Hostname list for an auto-generated parallel record
    pub hostnames: Vec<String>,
    pub if_true_tasks: Vec<TaskId>,
    pub if_false_tasks: Vec<TaskId>,
    pub max_parallel: Option<usize>,
    /// Presence enables retry; attempts = 1 + retry_count
    pub retry_count: Option<u32>,
    pub retry_delay: Option<u64>,
}

impl TaskRecord {
    /// Minimal record for the given id and type; fields default to unset.
    pub fn new(id: TaskId, task_type: TaskType) -> Self {
        TaskRecord {
            id,
            task_type,
            hostname: None,
            command: None,
            arguments: None,
            exec: None,
            timeout: None,
            sleep: None,
            loop_count: None,
            loop_break: None,
            condition: None,
            success: None,
            next: None,
            on_success: None,
            on_failure: None,
            return_code: None,
            stdout_split: None,
            stderr_split: None,
            tasks: Vec::new(),
            hostnames: Vec::new(),
            if_true_tasks: Vec::new(),
            if_false_tasks: Vec::new(),
            max_parallel: None,
            retry_count: None,
            retry_delay: None,
        }
    }

    /// True if the record carries any routing parameter. Subtasks of
    /// parallel and conditional parents must return control and may not
    /// route.
    pub fn has_routing(&self) -> bool {
        self.next.is_some() || self.on_success.is_some() || self.on_failure.is_some()
    }

    /// Timeout to apply, falling back to the run-wide default.
    pub fn effective_timeout(&self, default_secs: u64) -> u64 {
        self.timeout.unwrap_or(default_secs)
    }

    /// Whether `next=loop` re-execution is configured.
    pub fn is_looping(&self) -> bool {
        self.loop_count.is_some() && self.next.as_deref() == Some("loop")
    }

    /// Ids this record hands control to, in declaration order.
    /// Sequential fall-through (`id + 1`) is not included.
    pub fn routed_ids(&self) -> Vec<TaskId> {
        let mut ids = Vec::new();
        ids.extend(self.on_success);
        ids.extend(self.on_failure);
        ids.extend(self.tasks.iter().copied());
        ids.extend(self.if_true_tasks.iter().copied());
        ids.extend(self.if_false_tasks.iter().copied());
        ids
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
