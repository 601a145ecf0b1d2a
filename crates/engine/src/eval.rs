// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Expression evaluation against task results and aggregates.
//!
//! Expressions are parsed once (validation time) and evaluated here at
//! runtime. "False" means "do not proceed" in the `next` context, "skip"
//! in the `condition` context, and "fail" in the `success` context.

use crate::expr::{CmpOp, Expr, Predicate, Stream};
use crate::subst::{substitute, SubstEnv};
use tasker_core::limits::INLINE_SUBST_CAP;
use tasker_core::{Aggregate, TaskResult};

/// Everything a predicate can look at.
#[derive(Debug, Clone, Copy, Default)]
pub struct EvalContext<'a> {
    /// Result the stream/exit predicates inspect (the task being
    /// evaluated, or the most recent result for decision nodes).
    pub current: Option<&'a TaskResult>,
    /// Block counters for the aggregate keywords.
    pub aggregate: Option<Aggregate>,
    /// Pre-computed success for the `success` keyword; falls back to
    /// `exit_code == 0` of the current result.
    pub success: Option<bool>,
}

impl<'a> EvalContext<'a> {
    pub fn for_result(result: &'a TaskResult) -> Self {
        EvalContext {
            current: Some(result),
            aggregate: None,
            success: None,
        }
    }

    pub fn for_aggregate(aggregate: Aggregate) -> Self {
        EvalContext {
            current: None,
            aggregate: Some(aggregate),
            success: None,
        }
    }
}

/// Evaluate an expression tree. Short-circuits left to right.
pub fn evaluate(expr: &Expr, ctx: &EvalContext<'_>, env: &SubstEnv<'_>) -> bool {
    match expr {
        Expr::Or(terms) => terms.iter().any(|t| evaluate(t, ctx, env)),
        Expr::And(terms) => terms.iter().all(|t| evaluate(t, ctx, env)),
        Expr::Pred(pred) => evaluate_predicate(pred, ctx, env),
    }
}

fn evaluate_predicate(pred: &Predicate, ctx: &EvalContext<'_>, env: &SubstEnv<'_>) -> bool {
    match pred {
        Predicate::Always => true,
        Predicate::Never => false,
        // `loop` is routing syntax handled by the sequential executor; as
        // a plain predicate it keeps the iteration going.
        Predicate::Loop => true,
        Predicate::Success => ctx
            .success
            .or_else(|| ctx.current.map(|r| r.exit_code == 0))
            .unwrap_or(false),

        Predicate::ExitCode(code) => ctx.current.map(|r| r.exit_code == *code).unwrap_or(false),

        Predicate::StreamMatch {
            stream,
            pattern,
            negate,
        } => {
            let text = stream_text(ctx, *stream);
            let matched = if pattern.is_empty() {
                text.trim().is_empty()
            } else {
                text.contains(pattern.as_str())
            };
            matched != *negate
        }

        Predicate::StreamCmp { stream, op, value } => {
            let text = stream_text(ctx, *stream);
            let text = text.trim();
            match (text.parse::<f64>(), value.trim().parse::<f64>()) {
                (Ok(l), Ok(r)) => op.compare_numeric(l, r),
                _ => op.compare_text(text, value.trim()),
            }
        }

        Predicate::StreamCount { stream, op, value } => {
            let count = ctx
                .current
                .map(|r| {
                    let data = match stream {
                        Stream::Stdout => &r.stdout,
                        Stream::Stderr => &r.stderr,
                    };
                    data.line_count(INLINE_SUBST_CAP) as u64
                })
                .unwrap_or(0);
            op.compare_numeric(count as f64, *value as f64)
        }

        Predicate::VarCmp { left, op, right } => {
            let left = substitute(left, env);
            let right = substitute(right, env);
            compare_values(&left, *op, &right)
        }

        Predicate::AllSuccess => ctx.aggregate.map(|a| a.all_success()).unwrap_or(false),
        Predicate::AnySuccess => ctx.aggregate.map(|a| a.any_success()).unwrap_or(false),
        Predicate::MajoritySuccess => ctx
            .aggregate
            .map(|a| a.majority_success())
            .unwrap_or(false),
        Predicate::MinSuccess(n) => ctx.aggregate.map(|a| a.min_success(*n)).unwrap_or(false),
        Predicate::MaxFailed(n) => ctx.aggregate.map(|a| a.max_failed(*n)).unwrap_or(false),
    }
}

/// Numeric comparison when both sides parse as numbers, string equality
/// otherwise; ordering operators are false on non-numeric operands.
fn compare_values(left: &str, op: CmpOp, right: &str) -> bool {
    match (left.trim().parse::<f64>(), right.trim().parse::<f64>()) {
        (Ok(l), Ok(r)) => op.compare_numeric(l, r),
        _ => op.compare_text(left.trim(), right.trim()),
    }
}

fn stream_text(ctx: &EvalContext<'_>, stream: Stream) -> String {
    ctx.current
        .map(|r| {
            let data = match stream {
                Stream::Stdout => &r.stdout,
                Stream::Stderr => &r.stderr,
            };
            data.inline(INLINE_SUBST_CAP)
        })
        .unwrap_or_default()
}

#[cfg(test)]
#[path = "eval_tests.rs"]
mod tests;
