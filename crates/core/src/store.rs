// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thread-safe task-result map with cross-task variable lookup.

use crate::limits::INLINE_SUBST_CAP;
use crate::result::{Aggregate, TaskResult};
use crate::task::TaskId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Shared store of completed task results. Writers are the task executors;
/// readers are the condition evaluator and the summary writer. Critical
/// sections are short — values are cloned out.
#[derive(Debug, Clone, Default)]
pub struct ResultStore {
    inner: Arc<Mutex<Inner>>,
}

#[derive(Debug, Default)]
struct Inner {
    results: HashMap<TaskId, TaskResult>,
    aggregates: HashMap<TaskId, Aggregate>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the result of an executed task. Loop iterations overwrite,
    /// keeping only the last.
    pub fn insert(&self, id: TaskId, result: TaskResult) {
        self.inner.lock().results.insert(id, result);
    }

    pub fn get(&self, id: TaskId) -> Option<TaskResult> {
        self.inner.lock().results.get(&id).cloned()
    }

    pub fn contains(&self, id: TaskId) -> bool {
        self.inner.lock().results.contains_key(&id)
    }

    /// Store the aggregate counters of a completed parallel or conditional
    /// block under its parent id.
    pub fn set_aggregate(&self, id: TaskId, aggregate: Aggregate) {
        self.inner.lock().aggregates.insert(id, aggregate);
    }

    pub fn aggregate(&self, id: TaskId) -> Option<Aggregate> {
        self.inner.lock().aggregates.get(&id).copied()
    }

    /// Executed task ids, unordered.
    pub fn ids(&self) -> Vec<TaskId> {
        self.inner.lock().results.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().results.is_empty()
    }

    /// Count of executed tasks whose success expression held.
    pub fn succeeded(&self) -> usize {
        self.inner
            .lock()
            .results
            .values()
            .filter(|r| r.success)
            .count()
    }

    /// Resolve a cross-task reference `<id>_<field>`.
    ///
    /// Stream fields are truncated to the inline cap to keep rendered argv
    /// bounded; `_file` fields yield the backing path unchanged. Returns
    /// `None` when the task has no result, the field is unknown, or a
    /// `_file`/aggregate field has no value.
    pub fn variable(&self, id: TaskId, field: &str) -> Option<String> {
        match field {
            "success_count" | "failed_count" | "total_count" => {
                let agg = self.aggregate(id)?;
                Some(match field {
                    "success_count" => agg.success_count.to_string(),
                    "failed_count" => agg.failed_count.to_string(),
                    _ => agg.total_count.to_string(),
                })
            }
            _ => {
                let result = self.get(id)?;
                match field {
                    "stdout" => Some(result.stdout.inline(INLINE_SUBST_CAP)),
                    "stderr" => Some(result.stderr.inline(INLINE_SUBST_CAP)),
                    "exit" => Some(result.exit_code.to_string()),
                    "success" => Some(result.success.to_string()),
                    "hostname" => Some(result.hostname.clone()),
                    "duration" => Some(format!("{:.3}", result.duration)),
                    "stdout_file" => result.stdout_file().map(|p| p.display().to_string()),
                    "stderr_file" => result.stderr_file().map(|p| p.display().to_string()),
                    _ => None,
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
