// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task-file parsing (line-oriented `key=value` format)
//!
//! Three-phase scan:
//!
//! 1. **Argument prelude** — from the first non-comment line, lines that
//!    start with `-` or `--` are file-defined CLI arguments; the phase ends
//!    at the first `key=value` line.
//! 2. **Global variables** — `KEY=VALUE` lines before the first `task=`
//!    line; environment variables in the value are expanded once here.
//! 3. **Task records** — a `task=<int>` line opens a record, subsequent
//!    `key=value` lines attach to it.

use crate::diagnostic::Diagnostic;
use indexmap::IndexMap;
use std::sync::OnceLock;
use tasker_core::task::{TaskId, RESERVED_FIELDS};
use thiserror::Error;

/// Errors that abort parsing (exit code 13).
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("line {line}: task id '{value}' is not an integer")]
    TaskIdNotInteger { line: usize, value: String },

    #[error("line {line}: duplicate task id {id}")]
    DuplicateTask { line: usize, id: TaskId },

    #[error("line {line}: '{name}' is a reserved field name and cannot be a global variable")]
    ReservedGlobal { line: usize, name: String },

    #[error("line {line}: unknown field '{name}'")]
    UnknownField { line: usize, name: String },

    #[error("line {line}: field '{name}' appears outside a task record")]
    FieldOutsideTask { line: usize, name: String },

    #[error("line {line}: expected 'key=value', got '{text}'")]
    MalformedLine { line: usize, text: String },

    #[error("line {line}: undefined environment variable '{name}' in global '{global}'")]
    UndefinedEnv {
        line: usize,
        name: String,
        global: String,
    },
}

/// Parser knobs, wired from CLI flags.
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Unknown record fields are errors instead of warnings.
    pub strict_fields: bool,
    /// Undefined environment variables in globals are errors instead of
    /// expanding to empty.
    pub strict_env: bool,
}

/// One raw task record: fields as written, before typed conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTask {
    pub id: TaskId,
    /// Line of the opening `task=` for diagnostics.
    pub line: usize,
    pub fields: IndexMap<String, String>,
}

/// A parsed task file: prelude arguments, globals, and raw records in
/// declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFile {
    /// File-defined CLI argument lines (each starts with `-` or `--`).
    pub prelude_args: Vec<String>,
    /// Global variables with environment expansion already applied.
    pub globals: IndexMap<String, String>,
    pub tasks: Vec<RawTask>,
}

impl TaskFile {
    pub fn task_ids(&self) -> Vec<TaskId> {
        self.tasks.iter().map(|t| t.id).collect()
    }

    pub fn get(&self, id: TaskId) -> Option<&RawTask> {
        self.tasks.iter().find(|t| t.id == id)
    }
}

enum Phase {
    Prelude,
    Globals,
    Tasks,
}

/// Parse a task file. Returns the file plus non-fatal warnings
/// (unknown fields outside strict mode).
pub fn parse_task_file(
    content: &str,
    options: &ParseOptions,
) -> Result<(TaskFile, Vec<Diagnostic>), ParseError> {
    let mut file = TaskFile::default();
    let mut warnings = Vec::new();
    let mut phase = Phase::Prelude;
    let mut current: Option<RawTask> = None;

    for (idx, raw_line) in content.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw_line.trim();

        // Full-line comments and blank section separators
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        // Phase 1: argument prelude
        if matches!(phase, Phase::Prelude) {
            if line.starts_with('-') {
                file.prelude_args.push(line.to_string());
                continue;
            }
            phase = Phase::Globals;
        }

        let (key, value) = match line.split_once('=') {
            Some((k, v)) => (k.trim(), v.trim()),
            None => {
                return Err(ParseError::MalformedLine {
                    line: line_no,
                    text: line.to_string(),
                })
            }
        };

        // A task= line opens a record in any phase.
        if key == "task" {
            let id: TaskId = value.parse().map_err(|_| ParseError::TaskIdNotInteger {
                line: line_no,
                value: value.to_string(),
            })?;
            if let Some(done) = current.take() {
                file.tasks.push(done);
            }
            if file.tasks.iter().any(|t| t.id == id) {
                return Err(ParseError::DuplicateTask { line: line_no, id });
            }
            current = Some(RawTask {
                id,
                line: line_no,
                fields: IndexMap::new(),
            });
            phase = Phase::Tasks;
            continue;
        }

        match phase {
            Phase::Prelude => unreachable!("prelude exited above"),
            Phase::Globals => {
                let lowered = key.to_ascii_lowercase();
                if RESERVED_FIELDS.contains(&lowered.as_str()) {
                    return Err(ParseError::ReservedGlobal {
                        line: line_no,
                        name: key.to_string(),
                    });
                }
                let expanded = expand_env(value, options.strict_env).map_err(|name| {
                    ParseError::UndefinedEnv {
                        line: line_no,
                        name,
                        global: key.to_string(),
                    }
                })?;
                file.globals.insert(key.to_string(), expanded);
            }
            Phase::Tasks => {
                let field = key.to_ascii_lowercase();
                let record = match current.as_mut() {
                    Some(r) => r,
                    None => {
                        return Err(ParseError::FieldOutsideTask {
                            line: line_no,
                            name: field,
                        })
                    }
                };
                if !RESERVED_FIELDS.contains(&field.as_str()) {
                    if options.strict_fields {
                        return Err(ParseError::UnknownField {
                            line: line_no,
                            name: field,
                        });
                    }
                    warnings.push(Diagnostic::warning(
                        format!("task.{}.{}", record.id, field),
                        format!("unknown field '{}' ignored", field),
                    ));
                    continue;
                }
                record.fields.insert(field, value.to_string());
            }
        }
    }

    if let Some(done) = current.take() {
        file.tasks.push(done);
    }

    Ok((file, warnings))
}

#[allow(clippy::unwrap_used)] // literal pattern always compiles
fn env_pattern() -> &'static regex::Regex {
    static PATTERN: OnceLock<regex::Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)").unwrap()
    })
}

/// Expand `$NAME` and `${NAME}` once against the process environment.
/// Undefined names expand to empty, or fail the parse in strict mode.
fn expand_env(value: &str, strict: bool) -> Result<String, String> {
    let mut missing = None;
    let expanded = env_pattern().replace_all(value, |caps: &regex::Captures<'_>| {
        let name = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or_default();
        match std::env::var(name) {
            Ok(v) => v,
            Err(_) => {
                if strict && missing.is_none() {
                    missing = Some(name.to_string());
                }
                String::new()
            }
        }
    });
    match missing {
        Some(name) => Err(name),
        None => Ok(expanded.into_owned()),
    }
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod tests;
