// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Small text helpers: filename/TSV sanitizers and duration formatting.

/// Replace characters that are illegal or awkward in filenames.
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '<' | '>' | '/' | '\\' | '|' | '?' | '*' | ':' | '"' | '\0' => '_',
            c if c.is_whitespace() => '_',
            c => c,
        })
        .collect()
}

/// Flatten a value for a TAB-separated summary line: tabs and newlines
/// become single spaces.
pub fn sanitize_tsv_field(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            '\t' | '\n' | '\r' => ' ',
            c => c,
        })
        .collect()
}

/// Render a duration in seconds for logs and summaries.
pub fn format_duration(secs: f64) -> String {
    if secs >= 60.0 {
        let mins = (secs / 60.0).floor();
        format!("{}m{:.1}s", mins as u64, secs - mins * 60.0)
    } else {
        format!("{:.2}s", secs)
    }
}

#[cfg(test)]
#[path = "text_tests.rs"]
mod tests;
