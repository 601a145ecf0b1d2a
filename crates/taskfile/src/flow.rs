// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Flow validation: routing graph, reachability, subtask constraints.

use crate::diagnostic::Diagnostic;
use indexmap::IndexMap;
use std::collections::{HashSet, VecDeque};
use tasker_core::limits::{HANDLER_FLOOR, HANDLER_RANGE};
use tasker_core::task::{TaskId, TaskRecord, TaskType};

/// Validate routing across the whole record set, starting from
/// `start_task`.
pub fn check_flow(
    records: &IndexMap<TaskId, TaskRecord>,
    start_task: TaskId,
) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();

    if records.is_empty() {
        return diagnostics;
    }

    if !records.contains_key(&start_task) {
        diagnostics.push(Diagnostic::error(
            format!("task.{}", start_task),
            "start task does not exist",
        ));
        return diagnostics;
    }

    check_subtask_routing(records, &mut diagnostics);
    check_loops(records, &mut diagnostics);
    check_reachability(records, start_task, &mut diagnostics);

    diagnostics
}

/// Ids referenced as subtasks of a parallel or conditional parent.
fn subtask_ids(records: &IndexMap<TaskId, TaskRecord>) -> HashSet<TaskId> {
    let mut ids = HashSet::new();
    for record in records.values() {
        ids.extend(record.tasks.iter().copied());
        ids.extend(record.if_true_tasks.iter().copied());
        ids.extend(record.if_false_tasks.iter().copied());
    }
    ids
}

/// Subtasks must return control to their parent; routing parameters on
/// them would escape the block.
fn check_subtask_routing(
    records: &IndexMap<TaskId, TaskRecord>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    for id in subtask_ids(records) {
        if let Some(record) = records.get(&id) {
            if record.has_routing() {
                diagnostics.push(Diagnostic::error(
                    format!("task.{}", id),
                    "subtask of a parallel/conditional block must not carry \
                     next/on_success/on_failure",
                ));
            }
        }
    }
}

/// `loop` only takes effect together with `next=loop`.
fn check_loops(records: &IndexMap<TaskId, TaskRecord>, diagnostics: &mut Vec<Diagnostic>) {
    for record in records.values() {
        if record.loop_count.is_some() && record.next.as_deref() != Some("loop") {
            diagnostics.push(Diagnostic::warning(
                format!("task.{}.loop", record.id),
                "'loop' has no effect without next=loop",
            ));
        }
        if record.loop_break.is_some() && record.loop_count.is_none() {
            diagnostics.push(Diagnostic::warning(
                format!("task.{}.loop_break", record.id),
                "'loop_break' has no effect without 'loop'",
            ));
        }
    }
}

/// BFS over `{sequential next, on_success, on_failure, branch lists,
/// parallel tasks}`. Unreachable ids are errors except in the special
/// handler ranges (90–99 and >= 100), which are intentional
/// error-handler / parallel-group conventions.
fn check_reachability(
    records: &IndexMap<TaskId, TaskRecord>,
    start_task: TaskId,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let mut seen = HashSet::new();
    let mut queue = VecDeque::new();
    seen.insert(start_task);
    queue.push_back(start_task);

    while let Some(id) = queue.pop_front() {
        let Some(record) = records.get(&id) else {
            continue;
        };
        let mut targets = record.routed_ids();
        // Sequential fall-through, unless the record explicitly ends the
        // workflow. Routing through `next` expressions still lands on
        // id + 1 when true.
        let terminal = record.next.as_deref() == Some("never")
            || record.task_type == TaskType::Return;
        if !terminal && records.contains_key(&(id + 1)) {
            targets.push(id + 1);
        }
        for target in targets {
            if seen.insert(target) {
                queue.push_back(target);
            }
        }
    }

    for record in records.values() {
        if seen.contains(&record.id) {
            continue;
        }
        if HANDLER_RANGE.contains(&record.id) || record.id >= HANDLER_FLOOR {
            continue;
        }
        diagnostics.push(Diagnostic::error(
            format!("task.{}", record.id),
            format!("task {} is unreachable from task {}", record.id, start_task),
        ));
    }
}

#[cfg(test)]
#[path = "flow_tests.rs"]
mod tests;
