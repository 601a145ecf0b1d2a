// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tasker_core::limits::INLINE_SUBST_CAP;
use tasker_core::{StreamData, TaskResult};

fn globals(pairs: &[(&str, &str)]) -> IndexMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn result_with_stdout(stdout: StreamData) -> TaskResult {
    TaskResult {
        exit_code: 0,
        stdout,
        stderr: StreamData::empty(),
        success: true,
        skipped: false,
        hostname: "web1".to_string(),
        duration: 0.5,
    }
}

#[test]
fn plain_text_passes_through() {
    let globals = globals(&[]);
    let store = ResultStore::new();
    let env = SubstEnv::new(&globals, &store);
    assert_eq!(substitute("no tokens here", &env), "no tokens here");
}

#[test]
fn global_token_replaced() {
    let globals = globals(&[("NAME", "alpha")]);
    let store = ResultStore::new();
    let env = SubstEnv::new(&globals, &store);
    assert_eq!(substitute("run @NAME@ now", &env), "run alpha now");
}

#[test]
fn chained_globals_resolve_to_fixed_point() {
    let globals = globals(&[("A", "@B@"), ("B", "@C@"), ("C", "final")]);
    let store = ResultStore::new();
    let env = SubstEnv::new(&globals, &store);
    assert_eq!(substitute("@A@", &env), "final");
}

#[test]
fn self_reference_terminates_in_bounded_passes() {
    let globals = globals(&[("LOOP", "x@LOOP@")]);
    let store = ResultStore::new();
    let env = SubstEnv::new(&globals, &store);
    let expanded = substitute("@LOOP@", &env);
    // One 'x' per pass, then the literal token remains.
    assert_eq!(expanded, format!("{}@LOOP@", "x".repeat(MAX_EXPANSION_PASSES)));
}

#[test]
fn task_result_tokens() {
    let globals = globals(&[]);
    let store = ResultStore::new();
    store.insert(0, result_with_stdout(StreamData::Memory("hello".into())));
    let env = SubstEnv::new(&globals, &store);
    assert_eq!(substitute("@0_stdout@ world", &env), "hello world");
    assert_eq!(substitute("code=@0_exit@", &env), "code=0");
    assert_eq!(substitute("host=@0_hostname@", &env), "host=web1");
}

#[test]
fn large_stream_inline_is_truncated() {
    let globals = globals(&[]);
    let store = ResultStore::new();
    let big = "y".repeat(INLINE_SUBST_CAP + 4096);
    store.insert(0, result_with_stdout(StreamData::Memory(big)));
    let env = SubstEnv::new(&globals, &store);
    let expanded = substitute("@0_stdout@", &env);
    assert_eq!(expanded.len(), INLINE_SUBST_CAP);
}

#[test]
fn file_token_passes_path_unchanged() {
    let globals = globals(&[]);
    let store = ResultStore::new();
    store.insert(
        0,
        result_with_stdout(StreamData::File {
            path: "/tmp/tasker_stdout_xyz".into(),
            size: 5 * 1024 * 1024,
        }),
    );
    let env = SubstEnv::new(&globals, &store);
    assert_eq!(
        substitute("cat @0_stdout_file@", &env),
        "cat /tmp/tasker_stdout_xyz"
    );
}

#[test]
fn task_token_inside_hostnames_block() {
    let globals = globals(&[]);
    let store = ResultStore::new();
    let env = SubstEnv::new(&globals, &store).with_task_token(100_001);
    assert_eq!(substitute("id=@task@", &env), "id=100001");
}

#[test]
fn task_token_without_context_stays_literal() {
    let globals = globals(&[]);
    let store = ResultStore::new();
    let env = SubstEnv::new(&globals, &store);
    assert_eq!(substitute("id=@task@", &env), "id=@task@");
}

#[test]
fn unresolved_token_stays_literal() {
    let globals = globals(&[]);
    let store = ResultStore::new();
    let env = SubstEnv::new(&globals, &store);
    assert_eq!(substitute("@MISSING@", &env), "@MISSING@");
    assert_eq!(substitute("@7_stdout@", &env), "@7_stdout@");
}

#[test]
fn non_token_at_signs_untouched() {
    let globals = globals(&[("USER", "ops")]);
    let store = ResultStore::new();
    let env = SubstEnv::new(&globals, &store);
    assert_eq!(substitute("mail ops@example.com", &env), "mail ops@example.com");
    assert_eq!(substitute("@USER@@example.com", &env), "ops@example.com");
}

#[test]
fn lone_at_sign_untouched() {
    let globals = globals(&[]);
    let store = ResultStore::new();
    let env = SubstEnv::new(&globals, &store);
    assert_eq!(substitute("a @ b", &env), "a @ b");
}
