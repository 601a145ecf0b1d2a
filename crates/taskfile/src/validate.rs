// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Validation orchestration across the layers.

use crate::diagnostic::Diagnostic;
use crate::flow::check_flow;
use crate::parser::TaskFile;
use crate::records::build_records;
use crate::security::check_security;
use crate::varcheck::check_variables;
use indexmap::IndexMap;
use tasker_core::task::{TaskId, TaskRecord, TaskType};

/// Expression-grammar check, injected by the caller (the engine owns the
/// expression parser; taking a callback avoids a dependency cycle).
pub type ExprCheck<'a> = &'a dyn Fn(&str) -> Result<(), String>;

/// Which layers to run, wired from the `--skip-*` CLI flags.
#[derive(Debug, Clone)]
pub struct ValidationOptions {
    pub start_task: TaskId,
    pub skip_task_validation: bool,
    pub skip_security_validation: bool,
    /// Execution types granted shell-metacharacter leniency.
    pub shell_execs: Vec<String>,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        ValidationOptions {
            start_task: 0,
            skip_task_validation: false,
            skip_security_validation: false,
            shell_execs: vec!["shell".to_string(), "bash".to_string()],
        }
    }
}

/// Build typed records and run the requested validation layers.
///
/// Structural conversion always runs and its findings are always
/// reported — execution cannot proceed on records it could not type.
/// Flow, variable, and expression checks are suppressed by
/// `skip_task_validation`; security findings by
/// `skip_security_validation`.
pub fn validate(
    file: &TaskFile,
    options: &ValidationOptions,
    expr_check: ExprCheck<'_>,
) -> (IndexMap<TaskId, TaskRecord>, Vec<Diagnostic>) {
    let (records, mut diagnostics) = build_records(file);

    if !options.skip_task_validation {
        diagnostics.extend(check_flow(&records, options.start_task));
        diagnostics.extend(check_variables(&records, &file.globals));
        diagnostics.extend(check_expressions(&records, expr_check));
    }
    if !options.skip_security_validation {
        diagnostics.extend(check_security(&records, &options.shell_execs));
    }

    (records, diagnostics)
}

/// Parse every expression string once so grammar errors surface before
/// execution.
fn check_expressions(
    records: &IndexMap<TaskId, TaskRecord>,
    expr_check: ExprCheck<'_>,
) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for record in records.values() {
        for (field, value) in [
            ("condition", record.condition.as_deref()),
            ("success", record.success.as_deref()),
            ("next", record.next.as_deref()),
            ("loop_break", record.loop_break.as_deref()),
        ] {
            let Some(text) = value else { continue };
            if let Err(message) = expr_check(text) {
                diagnostics.push(Diagnostic::error(
                    format!("task.{}.{}", record.id, field),
                    message,
                ));
            }
        }
    }
    diagnostics
}

/// Unique `(hostname, exec)` pairs for host validation. Hostnames that
/// contain substitution tokens are skipped — they are only known at
/// runtime. Each pair is probed exactly once.
pub fn host_pairs(records: &IndexMap<TaskId, TaskRecord>) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    let mut push = |hostname: &str, exec: &str| {
        if hostname.contains('@') || hostname == "localhost" {
            return;
        }
        let pair = (hostname.to_string(), exec.to_string());
        if !pairs.contains(&pair) {
            pairs.push(pair);
        }
    };
    for record in records.values() {
        let exec = record.exec.as_deref().unwrap_or("local");
        if record.task_type == TaskType::Parallel {
            for hostname in &record.hostnames {
                push(hostname, exec);
            }
        } else if let Some(hostname) = record.hostname.as_deref() {
            push(hostname, exec);
        }
    }
    pairs
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
