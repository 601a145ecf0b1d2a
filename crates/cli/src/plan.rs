// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `--show-plan` rendering.

use indexmap::IndexMap;
use tasker_core::task::{TaskId, TaskRecord, TaskType};

/// Render the execution plan as human-readable lines.
pub fn render(records: &IndexMap<TaskId, TaskRecord>, globals: &IndexMap<String, String>) -> String {
    let mut out = String::new();

    if !globals.is_empty() {
        out.push_str("Globals:\n");
        for (name, value) in globals {
            out.push_str(&format!("  {} = {}\n", name, value));
        }
        out.push('\n');
    }

    out.push_str(&format!("Tasks ({}):\n", records.len()));
    for record in records.values() {
        out.push_str(&render_task(record));
    }
    out
}

fn render_task(record: &TaskRecord) -> String {
    let mut line = format!("  [{}] {}", record.id, record.task_type);

    match record.task_type {
        TaskType::Parallel if !record.hostnames.is_empty() => {
            line.push_str(&format!(
                " {} hosts, max_parallel={}",
                record.hostnames.len(),
                record
                    .max_parallel
                    .unwrap_or(tasker_core::limits::DEFAULT_MAX_PARALLEL)
            ));
        }
        TaskType::Parallel => {
            line.push_str(&format!(" tasks={:?}", record.tasks));
        }
        TaskType::Conditional => {
            line.push_str(&format!(
                " if_true={:?} if_false={:?}",
                record.if_true_tasks, record.if_false_tasks
            ));
        }
        TaskType::Return => {
            line.push_str(&format!(" code={}", record.return_code.unwrap_or(0)));
        }
        _ => {}
    }

    if let (Some(hostname), Some(command)) = (&record.hostname, &record.command) {
        line.push_str(&format!(
            ": {} on {}",
            summarize(command, record.arguments.as_deref()),
            hostname
        ));
    } else if let Some(command) = &record.command {
        line.push_str(&format!(": {}", summarize(command, record.arguments.as_deref())));
    }

    let mut routes = Vec::new();
    if let Some(target) = record.on_success {
        routes.push(format!("on_success->{}", target));
    }
    if let Some(target) = record.on_failure {
        routes.push(format!("on_failure->{}", target));
    }
    if let Some(next) = &record.next {
        routes.push(format!("next={}", next));
    }
    if let Some(count) = record.loop_count {
        routes.push(format!("loop={}", count));
    }
    if !routes.is_empty() {
        line.push_str(&format!("  ({})", routes.join(", ")));
    }
    line.push('\n');
    line
}

fn summarize(command: &str, arguments: Option<&str>) -> String {
    match arguments {
        Some(arguments) => format!("{} {}", command, arguments),
        None => command.to_string(),
    }
}

#[cfg(test)]
#[path = "plan_tests.rs"]
mod tests;
