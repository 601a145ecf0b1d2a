// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Security validation of command and argument strings.
//!
//! Context-aware: shell metacharacters are legitimate under `exec=shell`
//! (the operator asked for a shell), and rejected everywhere else.

use crate::diagnostic::Diagnostic;
use indexmap::IndexMap;
use std::sync::OnceLock;
use tasker_core::limits::{COMMAND_HARD_LIMIT, COMMAND_STRICT_LIMIT};
use tasker_core::task::{TaskId, TaskRecord};

#[allow(clippy::unwrap_used)] // literal pattern always compiles
fn metachar_pattern() -> &'static regex::Regex {
    static PATTERN: OnceLock<regex::Regex> = OnceLock::new();
    PATTERN.get_or_init(|| regex::Regex::new(r"[;&|<>`]|\$\(").unwrap())
}

#[allow(clippy::unwrap_used)] // literal pattern always compiles
fn format_string_pattern() -> &'static regex::Regex {
    static PATTERN: OnceLock<regex::Regex> = OnceLock::new();
    PATTERN.get_or_init(|| regex::Regex::new(r"%n|(%s){4,}").unwrap())
}

/// Scan every record's `command` and `arguments`. `shell_execs` names the
/// execution types that get shell-metacharacter leniency.
pub fn check_security(
    records: &IndexMap<TaskId, TaskRecord>,
    shell_execs: &[String],
) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for record in records.values() {
        let is_shell = record
            .exec
            .as_deref()
            .map(|e| shell_execs.iter().any(|s| s == e))
            .unwrap_or(false);
        for (field, value) in [
            ("command", record.command.as_deref()),
            ("arguments", record.arguments.as_deref()),
        ] {
            if let Some(text) = value {
                check_text(record.id, field, text, is_shell, &mut diagnostics);
            }
        }
    }
    diagnostics
}

fn check_text(
    id: TaskId,
    field: &str,
    text: &str,
    is_shell: bool,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let loc = format!("task.{}.{}", id, field);

    if text.contains('\0') {
        diagnostics.push(Diagnostic::error(loc.clone(), "contains a null byte"));
        return;
    }

    if text.len() > COMMAND_HARD_LIMIT {
        diagnostics.push(Diagnostic::error(
            loc.clone(),
            format!("length {} exceeds the {} limit", text.len(), COMMAND_HARD_LIMIT),
        ));
        return;
    }

    if !is_shell {
        if text.len() > COMMAND_STRICT_LIMIT {
            diagnostics.push(Diagnostic::error(
                loc.clone(),
                format!(
                    "length {} exceeds the {} limit for non-shell execution",
                    text.len(),
                    COMMAND_STRICT_LIMIT
                ),
            ));
        }
        if let Some(found) = metachar_pattern().find(text) {
            diagnostics.push(Diagnostic::error(
                loc.clone(),
                format!(
                    "shell metacharacter '{}' requires exec=shell",
                    found.as_str()
                ),
            ));
        }
    }

    if text.contains("../") || text.ends_with("/..") {
        diagnostics.push(Diagnostic::error(loc.clone(), "path traversal sequence"));
    }

    if format_string_pattern().is_match(text) {
        diagnostics.push(Diagnostic::error(loc.clone(), "format-string pattern"));
    }
}

#[cfg(test)]
#[path = "security_tests.rs"]
mod tests;
