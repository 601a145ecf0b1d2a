// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Variable-resolution validation.
//!
//! Every `@NAME@` token must be a global, a cross-task result reference,
//! or the literal `@task@` inside a parallel-hostnames record.

use crate::diagnostic::Diagnostic;
use indexmap::IndexMap;
use std::sync::OnceLock;
use tasker_core::task::{TaskId, TaskRecord, TaskType, RESULT_FIELDS};

#[allow(clippy::unwrap_used)] // literal pattern always compiles
fn token_pattern() -> &'static regex::Regex {
    static PATTERN: OnceLock<regex::Regex> = OnceLock::new();
    PATTERN.get_or_init(|| regex::Regex::new(r"@([A-Za-z0-9_]+)@").unwrap())
}

/// Fields whose text undergoes substitution at runtime.
fn substituted_fields(record: &TaskRecord) -> [(&'static str, Option<&str>); 7] {
    [
        ("hostname", record.hostname.as_deref()),
        ("command", record.command.as_deref()),
        ("arguments", record.arguments.as_deref()),
        ("condition", record.condition.as_deref()),
        ("success", record.success.as_deref()),
        ("next", record.next.as_deref()),
        ("loop_break", record.loop_break.as_deref()),
    ]
}

/// Check every token in every substituted field.
pub fn check_variables(
    records: &IndexMap<TaskId, TaskRecord>,
    globals: &IndexMap<String, String>,
) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    for record in records.values() {
        let in_hostnames_block =
            record.task_type == TaskType::Parallel && !record.hostnames.is_empty();
        for (field, value) in substituted_fields(record) {
            let Some(text) = value else { continue };
            for caps in token_pattern().captures_iter(text) {
                let token = &caps[1];
                if let Some(finding) =
                    check_token(token, records, globals, in_hostnames_block)
                {
                    diagnostics.push(Diagnostic::error(
                        format!("task.{}.{}", record.id, field),
                        finding,
                    ));
                }
            }
        }
    }
    diagnostics
}

/// Returns an error message when the token does not resolve.
fn check_token(
    token: &str,
    records: &IndexMap<TaskId, TaskRecord>,
    globals: &IndexMap<String, String>,
    in_hostnames_block: bool,
) -> Option<String> {
    if globals.contains_key(token) {
        return None;
    }
    if token == "task" {
        if in_hostnames_block {
            return None;
        }
        return Some("@task@ is only defined inside a parallel-hostnames task".to_string());
    }
    if let Some((id_part, field)) = token.split_once('_') {
        if let Ok(id) = id_part.parse::<TaskId>() {
            if !RESULT_FIELDS.contains(&field) {
                return Some(format!(
                    "unknown result field '{}'; valid fields: {}",
                    field,
                    RESULT_FIELDS.join(", ")
                ));
            }
            if !records.contains_key(&id) {
                return Some(format!("references unknown task {}", id));
            }
            return None;
        }
    }
    Some(format!("unknown variable '@{}@'", token))
}

#[cfg(test)]
#[path = "varcheck_tests.rs"]
mod tests;
