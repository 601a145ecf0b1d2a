// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Variable substitution.
//!
//! Replaces `@TOKEN@` occurrences in a fixed-point loop with a hard pass
//! bound instead of cycle detection; self-referential chains terminate
//! deterministically. Stream references are truncated to the inline cap
//! (ARG_MAX protection); `_file` references pass the path unchanged.

use indexmap::IndexMap;
use tasker_core::limits::MAX_EXPANSION_PASSES;
use tasker_core::task::TaskId;
use tasker_core::ResultStore;

/// Lookup environment for one substitution.
#[derive(Debug, Clone, Copy)]
pub struct SubstEnv<'a> {
    pub globals: &'a IndexMap<String, String>,
    pub store: &'a ResultStore,
    /// Value of the literal `@task@` token, defined while rendering the
    /// auto-generated subtasks of a parallel-hostnames block.
    pub task_token: Option<TaskId>,
}

impl<'a> SubstEnv<'a> {
    pub fn new(globals: &'a IndexMap<String, String>, store: &'a ResultStore) -> Self {
        SubstEnv {
            globals,
            store,
            task_token: None,
        }
    }

    pub fn with_task_token(mut self, id: TaskId) -> Self {
        self.task_token = Some(id);
        self
    }

    fn lookup(&self, token: &str) -> Option<String> {
        if let Some(value) = self.globals.get(token) {
            return Some(value.clone());
        }
        if token == "task" {
            return self.task_token.map(|id| id.to_string());
        }
        let (id_part, field) = token.split_once('_')?;
        let id: TaskId = id_part.parse().ok()?;
        self.store.variable(id, field)
    }
}

/// Replace `@TOKEN@` occurrences until a fixed point, bounded by
/// [`MAX_EXPANSION_PASSES`]. Unresolvable tokens stay literal (validation
/// reports them ahead of time unless skipped).
pub fn substitute(text: &str, env: &SubstEnv<'_>) -> String {
    let mut current = text.to_string();
    for _ in 0..MAX_EXPANSION_PASSES {
        let (next, changed) = substitute_once(&current, env);
        if !changed {
            return next;
        }
        current = next;
    }
    current
}

fn substitute_once(text: &str, env: &SubstEnv<'_>) -> (String, bool) {
    let mut out = String::with_capacity(text.len());
    let mut changed = false;
    let mut rest = text;

    while let Some(start) = rest.find('@') {
        let after = &rest[start + 1..];
        let Some(len) = after.find('@') else {
            // No closing marker: emit the remainder untouched.
            break;
        };
        let token = &after[..len];
        let is_token = !token.is_empty()
            && token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_');

        out.push_str(&rest[..start]);
        if is_token {
            match env.lookup(token) {
                Some(value) => {
                    out.push_str(&value);
                    changed = true;
                }
                None => {
                    tracing::warn!(token, "unresolved substitution token left in place");
                    out.push('@');
                    out.push_str(token);
                    out.push('@');
                }
            }
            rest = &after[len + 1..];
        } else {
            // Not a token (e.g. an email address): keep the '@' and rescan
            // from the next character.
            out.push('@');
            rest = after;
        }
    }
    out.push_str(rest);
    (out, changed)
}

#[cfg(test)]
#[path = "subst_tests.rs"]
mod tests;
