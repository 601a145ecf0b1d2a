// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::diagnostic::has_errors;
use crate::parser::{parse_task_file, ParseOptions};

fn accept_all(_: &str) -> Result<(), String> {
    Ok(())
}

fn parsed(content: &str) -> TaskFile {
    parse_task_file(content, &ParseOptions::default()).unwrap().0
}

#[test]
fn clean_file_validates() {
    let file = parsed(
        "task=0\nhostname=web1\ncommand=echo\narguments=hi\n\
         task=1\nhostname=web2\ncommand=true\n",
    );
    let (records, diagnostics) = validate(&file, &ValidationOptions::default(), &accept_all);
    assert_eq!(records.len(), 2);
    assert!(!has_errors(&diagnostics), "{diagnostics:?}");
}

#[test]
fn skip_task_validation_suppresses_flow_findings() {
    let file = parsed(
        "task=0\nhostname=h\ncommand=true\nnext=never\n\
         task=5\nhostname=h\ncommand=true\narguments=@NOPE@\n",
    );
    let options = ValidationOptions {
        skip_task_validation: true,
        ..ValidationOptions::default()
    };
    let (_, diagnostics) = validate(&file, &options, &accept_all);
    assert!(!has_errors(&diagnostics), "{diagnostics:?}");
}

#[test]
fn skip_security_suppresses_metachar_findings() {
    let file = parsed("task=0\nhostname=h\ncommand=rm;ls\n");
    let options = ValidationOptions {
        skip_security_validation: true,
        ..ValidationOptions::default()
    };
    let (_, diagnostics) = validate(&file, &options, &accept_all);
    assert!(!has_errors(&diagnostics), "{diagnostics:?}");
}

#[test]
fn expression_errors_are_located() {
    let file = parsed("task=0\nhostname=h\ncommand=true\nsuccess=((bad\n");
    let reject = |text: &str| -> Result<(), String> {
        if text.contains("((") {
            Err("nested parentheses are not supported".to_string())
        } else {
            Ok(())
        }
    };
    let (_, diagnostics) = validate(&file, &ValidationOptions::default(), &reject);
    assert!(diagnostics
        .iter()
        .any(|d| d.location == "task.0.success" && d.message.contains("nested")));
}

#[test]
fn host_pairs_are_unique_and_skip_placeholders() {
    let file = parsed(
        "task=0\nhostname=web1\ncommand=true\nexec=pbrun\n\
         task=1\nhostname=web1\ncommand=true\nexec=pbrun\n\
         task=2\nhostname=@TARGET@\ncommand=true\n\
         task=3\ntype=parallel\nhostnames=web2,web3\ncommand=true\nexec=wwrs\n",
    );
    let (records, _) = validate(&file, &ValidationOptions::default(), &accept_all);
    let pairs = host_pairs(&records);
    assert_eq!(
        pairs,
        vec![
            ("web1".to_string(), "pbrun".to_string()),
            ("web2".to_string(), "wwrs".to_string()),
            ("web3".to_string(), "wwrs".to_string()),
        ]
    );
}

#[test]
fn localhost_is_never_probed() {
    let file = parsed("task=0\nhostname=localhost\ncommand=true\n");
    let (records, _) = validate(&file, &ValidationOptions::default(), &accept_all);
    assert!(host_pairs(&records).is_empty());
}
