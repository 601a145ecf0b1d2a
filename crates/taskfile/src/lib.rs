// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tasker-taskfile: task-file parsing and validation
//!
//! Parses the plain-text `key=value` task-file format into raw records,
//! then validates them in layers (structural, flow/reachability, security,
//! variable resolution), producing typed [`tasker_core::TaskRecord`]s and a
//! list of diagnostics.

pub mod diagnostic;
pub mod flow;
pub mod parser;
pub mod records;
pub mod security;
pub mod validate;
pub mod varcheck;

pub use diagnostic::{has_errors, Diagnostic, Severity};
pub use parser::{parse_task_file, ParseError, ParseOptions, RawTask, TaskFile};
pub use validate::{host_pairs, validate, ExprCheck, ValidationOptions};
