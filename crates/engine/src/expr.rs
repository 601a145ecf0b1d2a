// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Expression language for `success`, `next`, `condition`, and
//! `loop_break` fields.
//!
//! Grammar:
//!
//! ```text
//! expr     := orExpr
//! orExpr   := andExpr (('|' | 'OR')  andExpr)*
//! andExpr  := atom    (('&' | 'AND') atom)*
//! atom     := '(' expr ')' | predicate
//! ```
//!
//! Grouping is supported at one level only; nested parentheses are
//! rejected explicitly. Expressions are parsed once at validation time
//! and evaluated at runtime.

use std::fmt;
use thiserror::Error;

/// Errors from the expression parser.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExprError {
    #[error("empty expression")]
    Empty,

    #[error("nested parentheses are not supported")]
    NestedParens,

    #[error("unbalanced parentheses")]
    UnbalancedParens,

    #[error("dangling operator near '{0}'")]
    DanglingOperator(String),

    #[error("unknown predicate '{0}'")]
    UnknownPredicate(String),

    #[error("invalid number in '{0}'")]
    InvalidNumber(String),
}

/// Which captured stream a predicate inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

impl fmt::Display for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stream::Stdout => write!(f, "stdout"),
            Stream::Stderr => write!(f, "stderr"),
        }
    }
}

/// Comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    /// Operators by descending length, so `!=` wins over `=`.
    const ALL: [(&'static str, CmpOp); 6] = [
        ("!=", CmpOp::Ne),
        ("<=", CmpOp::Le),
        (">=", CmpOp::Ge),
        ("=", CmpOp::Eq),
        ("<", CmpOp::Lt),
        (">", CmpOp::Gt),
    ];

    pub fn compare_numeric(self, left: f64, right: f64) -> bool {
        match self {
            CmpOp::Eq => left == right,
            CmpOp::Ne => left != right,
            CmpOp::Lt => left < right,
            CmpOp::Le => left <= right,
            CmpOp::Gt => left > right,
            CmpOp::Ge => left >= right,
        }
    }

    /// String comparison; ordering operators are numeric-only and false
    /// on non-numeric operands.
    pub fn compare_text(self, left: &str, right: &str) -> bool {
        match self {
            CmpOp::Eq => left == right,
            CmpOp::Ne => left != right,
            _ => false,
        }
    }
}

/// Leaf predicate.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `exit_N`
    ExitCode(i32),
    /// `stdout~PAT` / `stderr!~PAT`; empty pattern means "is empty"
    StreamMatch {
        stream: Stream,
        pattern: String,
        negate: bool,
    },
    /// `stdout=V`, `stdout!=V`, `stdout<N` ...
    StreamCmp {
        stream: Stream,
        op: CmpOp,
        value: String,
    },
    /// `stdout_count=N`, `stdout_count<N`, `stdout_count>N`
    StreamCount {
        stream: Stream,
        op: CmpOp,
        value: u64,
    },
    /// `LEFT <op> RIGHT` with substitution tokens as operands
    VarCmp {
        left: String,
        op: CmpOp,
        right: String,
    },
    Always,
    Never,
    Success,
    Loop,
    AllSuccess,
    AnySuccess,
    MajoritySuccess,
    /// `min_success=N`
    MinSuccess(usize),
    /// `max_failed=N`
    MaxFailed(usize),
}

/// Parsed expression tree. Evaluation short-circuits left to right.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Or(Vec<Expr>),
    And(Vec<Expr>),
    Pred(Predicate),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    LParen,
    RParen,
    Or,
    And,
    Word(String),
}

fn tokenize(input: &str) -> Result<Vec<Token>, ExprError> {
    let mut tokens = Vec::new();
    let mut word = String::new();
    let flush = |word: &mut String, tokens: &mut Vec<Token>| {
        if !word.is_empty() {
            let w = std::mem::take(word);
            match w.as_str() {
                "OR" => tokens.push(Token::Or),
                "AND" => tokens.push(Token::And),
                _ => tokens.push(Token::Word(w)),
            }
        }
    };
    for c in input.chars() {
        match c {
            '(' => {
                flush(&mut word, &mut tokens);
                tokens.push(Token::LParen);
            }
            ')' => {
                flush(&mut word, &mut tokens);
                tokens.push(Token::RParen);
            }
            '|' => {
                flush(&mut word, &mut tokens);
                tokens.push(Token::Or);
            }
            '&' => {
                flush(&mut word, &mut tokens);
                tokens.push(Token::And);
            }
            c if c.is_whitespace() => flush(&mut word, &mut tokens),
            c => word.push(c),
        }
    }
    flush(&mut word, &mut tokens);
    Ok(tokens)
}

/// Parse an expression string into its tree.
pub fn parse_expression(input: &str) -> Result<Expr, ExprError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.or_expr(0)?;
    if parser.pos != parser.tokens.len() {
        return Err(ExprError::UnbalancedParens);
    }
    Ok(expr)
}

/// Grammar check for validation: parse and discard.
pub fn check_expression(input: &str) -> Result<(), String> {
    parse_expression(input).map(|_| ()).map_err(|e| e.to_string())
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn or_expr(&mut self, depth: usize) -> Result<Expr, ExprError> {
        let mut terms = vec![self.and_expr(depth)?];
        while matches!(self.peek(), Some(Token::Or)) {
            self.pos += 1;
            terms.push(self.and_expr(depth)?);
        }
        Ok(collapse(terms, Expr::Or))
    }

    fn and_expr(&mut self, depth: usize) -> Result<Expr, ExprError> {
        let mut terms = vec![self.atom(depth)?];
        while matches!(self.peek(), Some(Token::And)) {
            self.pos += 1;
            terms.push(self.atom(depth)?);
        }
        Ok(collapse(terms, Expr::And))
    }

    fn atom(&mut self, depth: usize) -> Result<Expr, ExprError> {
        match self.peek() {
            None => Err(ExprError::Empty),
            Some(Token::LParen) => {
                if depth >= 1 {
                    return Err(ExprError::NestedParens);
                }
                self.pos += 1;
                let inner = self.or_expr(depth + 1)?;
                match self.peek() {
                    Some(Token::RParen) => {
                        self.pos += 1;
                        Ok(inner)
                    }
                    _ => Err(ExprError::UnbalancedParens),
                }
            }
            Some(Token::RParen) => Err(ExprError::UnbalancedParens),
            Some(Token::Or) | Some(Token::And) => {
                Err(ExprError::DanglingOperator(self.rest_text()))
            }
            Some(Token::Word(_)) => {
                // A predicate may span several words (`@X@ = 5`); join the
                // run of words up to the next operator or paren.
                let mut parts = Vec::new();
                while let Some(Token::Word(w)) = self.peek() {
                    parts.push(w.clone());
                    self.pos += 1;
                }
                let text = parts.join(" ");
                parse_predicate(&text).map(Expr::Pred)
            }
        }
    }

    fn rest_text(&self) -> String {
        self.tokens[self.pos..]
            .iter()
            .map(|t| match t {
                Token::LParen => "(".to_string(),
                Token::RParen => ")".to_string(),
                Token::Or => "|".to_string(),
                Token::And => "&".to_string(),
                Token::Word(w) => w.clone(),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// A single term stays a leaf; several combine under the operator.
fn collapse(mut terms: Vec<Expr>, combine: fn(Vec<Expr>) -> Expr) -> Expr {
    if terms.len() == 1 {
        terms.swap_remove(0)
    } else {
        combine(terms)
    }
}

fn parse_predicate(text: &str) -> Result<Predicate, ExprError> {
    // Keywords first — they are exact matches.
    match text {
        "always" => return Ok(Predicate::Always),
        "never" => return Ok(Predicate::Never),
        "success" => return Ok(Predicate::Success),
        "loop" => return Ok(Predicate::Loop),
        "all_success" => return Ok(Predicate::AllSuccess),
        "any_success" => return Ok(Predicate::AnySuccess),
        "majority_success" => return Ok(Predicate::MajoritySuccess),
        _ => {}
    }

    if let Some(rest) = text.strip_prefix("min_success=") {
        let n = rest
            .trim()
            .parse()
            .map_err(|_| ExprError::InvalidNumber(text.to_string()))?;
        return Ok(Predicate::MinSuccess(n));
    }
    if let Some(rest) = text.strip_prefix("max_failed=") {
        let n = rest
            .trim()
            .parse()
            .map_err(|_| ExprError::InvalidNumber(text.to_string()))?;
        return Ok(Predicate::MaxFailed(n));
    }

    if let Some(rest) = text.strip_prefix("exit_") {
        let code = rest
            .trim()
            .parse()
            .map_err(|_| ExprError::InvalidNumber(text.to_string()))?;
        return Ok(Predicate::ExitCode(code));
    }

    for (stream, name) in [(Stream::Stdout, "stdout"), (Stream::Stderr, "stderr")] {
        // stdout_count<op>N
        if let Some(rest) = text.strip_prefix(&format!("{}_count", name)) {
            let (op, value) = split_operator(rest)
                .ok_or_else(|| ExprError::UnknownPredicate(text.to_string()))?;
            let value = value
                .trim()
                .parse()
                .map_err(|_| ExprError::InvalidNumber(text.to_string()))?;
            return Ok(Predicate::StreamCount { stream, op, value });
        }
        if let Some(rest) = text.strip_prefix(name) {
            // stdout!~PAT / stdout~PAT
            if let Some(pattern) = rest.strip_prefix("!~") {
                return Ok(Predicate::StreamMatch {
                    stream,
                    pattern: pattern.trim().to_string(),
                    negate: true,
                });
            }
            if let Some(pattern) = rest.strip_prefix('~') {
                return Ok(Predicate::StreamMatch {
                    stream,
                    pattern: pattern.trim().to_string(),
                    negate: false,
                });
            }
            // stdout<op>V
            if let Some((op, value)) = split_operator(rest) {
                return Ok(Predicate::StreamCmp {
                    stream,
                    op,
                    value: value.trim().to_string(),
                });
            }
        }
    }

    // General comparison: LEFT <op> RIGHT (substitution tokens as operands)
    if let Some((left, op, right)) = split_comparison(text) {
        return Ok(Predicate::VarCmp { left, op, right });
    }

    Err(ExprError::UnknownPredicate(text.to_string()))
}

/// Split `<op>VALUE` where the operator is the leading token.
fn split_operator(text: &str) -> Option<(CmpOp, &str)> {
    let trimmed = text.trim_start();
    for (symbol, op) in CmpOp::ALL {
        if let Some(rest) = trimmed.strip_prefix(symbol) {
            return Some((op, rest));
        }
    }
    None
}

/// Split `LEFT<op>RIGHT` on the first operator occurrence.
fn split_comparison(text: &str) -> Option<(String, CmpOp, String)> {
    let mut best: Option<(usize, &'static str, CmpOp)> = None;
    for (symbol, op) in CmpOp::ALL {
        if let Some(idx) = text.find(symbol) {
            let better = match best {
                None => true,
                // Earlier match wins; at the same index the longer symbol
                // wins (`!=` over `=`).
                Some((bidx, bsym, _)) => idx < bidx || (idx == bidx && symbol.len() > bsym.len()),
            };
            if better {
                best = Some((idx, symbol, op));
            }
        }
    }
    let (idx, symbol, op) = best?;
    let left = text[..idx].trim();
    let right = text[idx + symbol.len()..].trim();
    if left.is_empty() {
        return None;
    }
    Some((left.to_string(), op, right.to_string()))
}

#[cfg(test)]
#[path = "expr_tests.rs"]
mod tests;
