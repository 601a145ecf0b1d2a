// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structural validation: raw fields → typed [`TaskRecord`]s.
//!
//! Conversion always runs (execution needs typed records even when
//! validation layers are skipped); range and required-field findings are
//! reported as diagnostics.

use crate::diagnostic::Diagnostic;
use crate::parser::{RawTask, TaskFile};
use indexmap::IndexMap;
use std::fmt::Display;
use std::ops::RangeInclusive;
use tasker_core::limits;
use tasker_core::task::{SplitSpec, TaskId, TaskRecord, TaskType};

/// Convert all raw records, collecting structural diagnostics.
pub fn build_records(file: &TaskFile) -> (IndexMap<TaskId, TaskRecord>, Vec<Diagnostic>) {
    let mut records = IndexMap::new();
    let mut diagnostics = Vec::new();

    for raw in &file.tasks {
        let record = build_one(raw, &mut diagnostics);
        records.insert(record.id, record);
    }

    // Required fields and cross-record references need the full id set.
    for record in records.values() {
        check_required(record, &records, &mut diagnostics);
    }

    (records, diagnostics)
}

fn build_one(raw: &RawTask, diagnostics: &mut Vec<Diagnostic>) -> TaskRecord {
    let loc = |field: &str| format!("task.{}.{}", raw.id, field);

    if raw.id >= limits::SUBTASK_ID_BASE {
        diagnostics.push(Diagnostic::error(
            format!("task.{}", raw.id),
            format!(
                "id {} is inside the reserved auto-generated range (>= {})",
                raw.id,
                limits::SUBTASK_ID_BASE
            ),
        ));
    }

    let mut record = TaskRecord::new(raw.id, TaskType::Normal);

    record.hostname = raw.fields.get("hostname").cloned();
    record.command = raw.fields.get("command").cloned();
    record.arguments = raw.fields.get("arguments").cloned();
    record.exec = raw.fields.get("exec").cloned();
    record.condition = raw.fields.get("condition").cloned();
    record.success = raw.fields.get("success").cloned();
    record.next = raw.fields.get("next").cloned();
    record.loop_break = raw.fields.get("loop_break").cloned();

    record.timeout = parse_ranged(raw, "timeout", limits::TIMEOUT_RANGE, diagnostics);
    record.sleep = parse_ranged(raw, "sleep", limits::SLEEP_RANGE, diagnostics);
    record.loop_count = parse_ranged(raw, "loop", limits::LOOP_RANGE, diagnostics);
    record.retry_count = parse_ranged(raw, "retry_count", limits::RETRY_COUNT_RANGE, diagnostics);
    record.retry_delay = parse_ranged(raw, "retry_delay", limits::RETRY_DELAY_RANGE, diagnostics);
    record.max_parallel =
        parse_ranged(raw, "max_parallel", limits::MAX_PARALLEL_RANGE, diagnostics);

    record.on_success = parse_plain(raw, "on_success", diagnostics);
    record.on_failure = parse_plain(raw, "on_failure", diagnostics);
    record.return_code = parse_plain(raw, "return", diagnostics);

    for (field, slot) in [
        ("stdout_split", &mut record.stdout_split),
        ("stderr_split", &mut record.stderr_split),
    ] {
        if let Some(value) = raw.fields.get(field) {
            match SplitSpec::parse(value) {
                Some(spec) => *slot = Some(spec),
                None => diagnostics.push(Diagnostic::error(
                    loc(field),
                    format!("expected 'delimiter,index', got '{}'", value),
                )),
            }
        }
    }

    record.tasks = parse_id_list(raw, "tasks", diagnostics);
    record.if_true_tasks = parse_id_list(raw, "if_true_tasks", diagnostics);
    record.if_false_tasks = parse_id_list(raw, "if_false_tasks", diagnostics);
    record.hostnames = raw
        .fields
        .get("hostnames")
        .map(|v| {
            v.split(',')
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
                .collect()
        })
        .unwrap_or_default();

    record.task_type = derive_type(raw, &record, diagnostics);
    record
}

/// Explicit `type=` wins; otherwise the type is derived from the fields.
/// A decision record is indistinguishable from a normal one by fields
/// alone, so `type=decision` must be explicit.
fn derive_type(raw: &RawTask, record: &TaskRecord, diagnostics: &mut Vec<Diagnostic>) -> TaskType {
    if let Some(value) = raw.fields.get("type") {
        match TaskType::parse(value) {
            Some(t) => return t,
            None => {
                diagnostics.push(Diagnostic::error(
                    format!("task.{}.type", raw.id),
                    format!("unknown task type '{}'", value),
                ));
                return TaskType::Normal;
            }
        }
    }
    if !record.tasks.is_empty() || !record.hostnames.is_empty() {
        TaskType::Parallel
    } else if !record.if_true_tasks.is_empty() || !record.if_false_tasks.is_empty() {
        TaskType::Conditional
    } else if record.return_code.is_some() && record.command.is_none() {
        TaskType::Return
    } else {
        TaskType::Normal
    }
}

fn check_required(
    record: &TaskRecord,
    records: &IndexMap<TaskId, TaskRecord>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let loc = |field: &str| format!("task.{}.{}", record.id, field);

    match record.task_type {
        TaskType::Normal => {
            if record.command.is_none() {
                diagnostics.push(Diagnostic::error(loc("command"), "command is required"));
            }
            if record.hostname.is_none() {
                diagnostics.push(Diagnostic::error(loc("hostname"), "hostname is required"));
            }
        }
        TaskType::Parallel => {
            match (record.tasks.is_empty(), record.hostnames.is_empty()) {
                (true, true) => diagnostics.push(Diagnostic::error(
                    format!("task.{}", record.id),
                    "parallel task requires 'tasks' or 'hostnames'",
                )),
                (false, false) => diagnostics.push(Diagnostic::error(
                    format!("task.{}", record.id),
                    "'tasks' and 'hostnames' are mutually exclusive",
                )),
                (true, false) => {
                    if !limits::HOSTNAMES_RANGE.contains(&record.hostnames.len()) {
                        diagnostics.push(Diagnostic::error(
                            loc("hostnames"),
                            format!(
                                "hostname count {} outside {}..={}",
                                record.hostnames.len(),
                                limits::HOSTNAMES_RANGE.start(),
                                limits::HOSTNAMES_RANGE.end()
                            ),
                        ));
                    }
                    if record.command.is_none() {
                        diagnostics.push(Diagnostic::error(
                            loc("command"),
                            "command is required with 'hostnames'",
                        ));
                    }
                }
                (false, true) => {
                    for id in &record.tasks {
                        if !records.contains_key(id) {
                            diagnostics.push(Diagnostic::error(
                                loc("tasks"),
                                format!("references unknown task {}", id),
                            ));
                        }
                    }
                }
            }
        }
        TaskType::Conditional => {
            if record.condition.is_none() {
                diagnostics.push(Diagnostic::error(loc("condition"), "condition is required"));
            }
            if record.if_true_tasks.is_empty() && record.if_false_tasks.is_empty() {
                diagnostics.push(Diagnostic::error(
                    format!("task.{}", record.id),
                    "conditional task requires 'if_true_tasks' or 'if_false_tasks'",
                ));
            }
            for (field, list) in [
                ("if_true_tasks", &record.if_true_tasks),
                ("if_false_tasks", &record.if_false_tasks),
            ] {
                for id in list {
                    if !records.contains_key(id) {
                        diagnostics.push(Diagnostic::error(
                            loc(field),
                            format!("references unknown task {}", id),
                        ));
                    }
                }
            }
        }
        TaskType::Decision => {
            if record.success.is_none() {
                diagnostics.push(Diagnostic::error(
                    loc("success"),
                    "decision task requires a success expression",
                ));
            }
            if record.next.is_none() && record.on_success.is_none() && record.on_failure.is_none() {
                diagnostics.push(Diagnostic::error(
                    format!("task.{}", record.id),
                    "decision task requires 'next', 'on_success', or 'on_failure'",
                ));
            }
        }
        TaskType::Return => {
            if record.return_code.is_none() {
                diagnostics.push(Diagnostic::error(
                    loc("return"),
                    "return task requires an exit code",
                ));
            }
        }
    }

    for (field, target) in [
        ("on_success", record.on_success),
        ("on_failure", record.on_failure),
    ] {
        if let Some(id) = target {
            if !records.contains_key(&id) {
                diagnostics.push(Diagnostic::error(
                    loc(field),
                    format!("references unknown task {}", id),
                ));
            }
        }
    }
}

fn parse_ranged<T>(
    raw: &RawTask,
    field: &str,
    range: RangeInclusive<T>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<T>
where
    T: std::str::FromStr + PartialOrd + Display + Copy,
{
    let value = raw.fields.get(field)?;
    match value.parse::<T>() {
        Ok(n) if range.contains(&n) => Some(n),
        Ok(n) => {
            diagnostics.push(Diagnostic::error(
                format!("task.{}.{}", raw.id, field),
                format!("{} outside {}..={}", n, range.start(), range.end()),
            ));
            None
        }
        Err(_) => {
            diagnostics.push(Diagnostic::error(
                format!("task.{}.{}", raw.id, field),
                format!("'{}' is not a number", value),
            ));
            None
        }
    }
}

fn parse_plain<T: std::str::FromStr>(
    raw: &RawTask,
    field: &str,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<T> {
    let value = raw.fields.get(field)?;
    match value.parse::<T>() {
        Ok(n) => Some(n),
        Err(_) => {
            diagnostics.push(Diagnostic::error(
                format!("task.{}.{}", raw.id, field),
                format!("'{}' is not a number", value),
            ));
            None
        }
    }
}

fn parse_id_list(raw: &RawTask, field: &str, diagnostics: &mut Vec<Diagnostic>) -> Vec<TaskId> {
    let Some(value) = raw.fields.get(field) else {
        return Vec::new();
    };
    let mut ids = Vec::new();
    for part in value.split(',') {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        match part.parse() {
            Ok(id) => ids.push(id),
            Err(_) => diagnostics.push(Diagnostic::error(
                format!("task.{}.{}", raw.id, field),
                format!("'{}' is not a task id", part),
            )),
        }
    }
    if ids.is_empty() {
        diagnostics.push(Diagnostic::error(
            format!("task.{}.{}", raw.id, field),
            "list must not be empty",
        ));
    }
    ids
}

#[cfg(test)]
#[path = "records_tests.rs"]
mod tests;
