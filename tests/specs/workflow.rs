//! Sequential workflow specs: routing, substitution, condition skips,
//! loops, decisions, returns.

use crate::prelude::*;

#[test]
fn success_route_follows_on_success() {
    let ws = Workspace::new();
    let file = ws.file(
        "s1.txt",
        "task=0\nhostname=localhost\ncommand=echo\narguments=OK\nsuccess=exit_0\n\
         on_success=1\non_failure=99\n\
         task=1\nhostname=localhost\ncommand=echo\narguments=done\n\
         task=99\nreturn=7\n",
    );
    let (code, summary) = ws.run_json(&file, &[]);
    assert_eq!(code, 0);
    assert_eq!(execution_path(&summary), vec![0, 1]);
    assert!(task_result(&summary, "0")["stdout"]
        .as_str()
        .unwrap()
        .contains("OK"));
}

#[test]
fn failure_route_reaches_return_task() {
    let ws = Workspace::new();
    let file = ws.file(
        "route.txt",
        "task=0\nhostname=localhost\ncommand=false\n\
         on_success=1\non_failure=99\n\
         task=1\nhostname=localhost\ncommand=echo\narguments=done\n\
         task=99\nreturn=7\n",
    );
    let (code, summary) = ws.run_json(&file, &[]);
    assert_eq!(code, 7);
    assert_eq!(execution_path(&summary), vec![0, 99]);
}

#[test]
fn cross_task_substitution_into_arguments() {
    let ws = Workspace::new();
    let file = ws.file(
        "s2.txt",
        "task=0\nhostname=localhost\ncommand=echo\narguments=hello\n\
         task=1\nhostname=localhost\ncommand=echo\narguments=@0_stdout@ world\n",
    );
    let (code, summary) = ws.run_json(&file, &[]);
    assert_eq!(code, 0);
    assert!(task_result(&summary, "1")["stdout"]
        .as_str()
        .unwrap()
        .contains("hello world"));
}

#[test]
fn global_variables_substitute() {
    let ws = Workspace::new();
    let file = ws.file(
        "globals.txt",
        "GREETING=bonjour\n\
         task=0\nhostname=localhost\ncommand=echo\narguments=@GREETING@\n",
    );
    let (code, summary) = ws.run_json(&file, &[]);
    assert_eq!(code, 0);
    assert!(task_result(&summary, "0")["stdout"]
        .as_str()
        .unwrap()
        .contains("bonjour"));
    assert_eq!(summary["variables"]["GREETING"], "bonjour");
}

#[test]
fn condition_false_skips_but_workflow_continues() {
    let ws = Workspace::new();
    // Task 0 exits 1 (declared success), task 1 is guarded on exit 0 and
    // skips, task 2 runs unconditionally.
    let file = ws.file(
        "s3.txt",
        "task=0\nhostname=localhost\ncommand=false\nsuccess=exit_1\n\
         task=1\nhostname=localhost\ncommand=echo\narguments=guarded\ncondition=@0_exit@=0\n\
         task=2\nhostname=localhost\ncommand=echo\narguments=always\n",
    );
    let (code, summary) = ws.run_json(&file, &[]);
    assert_eq!(code, 0);
    assert_eq!(execution_path(&summary), vec![0, 1, 2]);
    let skipped = task_result(&summary, "1");
    assert_eq!(skipped["exit_code"], -1);
    assert_eq!(skipped["success"], false);
    assert!(task_result(&summary, "2")["stdout"]
        .as_str()
        .unwrap()
        .contains("always"));
}

#[test]
fn next_expression_gates_continuation() {
    let ws = Workspace::new();
    let file = ws.file(
        "next.txt",
        "task=0\nhostname=localhost\ncommand=echo\narguments=ready\nnext=stdout~missing\n\
         task=1\nhostname=localhost\ncommand=echo\narguments=unreached\n",
    );
    let (code, summary) = ws.run_json(&file, &[]);
    assert_eq!(code, 14);
    assert_eq!(execution_path(&summary), vec![0]);
}

#[test]
fn failed_task_without_route_exits_18() {
    let ws = Workspace::new();
    let file = ws.file("fail.txt", "task=0\nhostname=localhost\ncommand=false\n");
    let (code, summary) = ws.run_json(&file, &[]);
    assert_eq!(code, 18);
    assert_eq!(summary["workflow_metadata"]["status"], "failed");
}

#[test]
fn task_timeout_exits_124() {
    let ws = Workspace::new();
    let file = ws.file(
        "timeout.txt",
        "task=0\nhostname=localhost\ncommand=sleep\narguments=30\ntimeout=5\n",
    );
    let start = std::time::Instant::now();
    let (code, summary) = ws.run_json(&file, &[]);
    assert!(start.elapsed().as_secs() < 20);
    assert_eq!(code, 124);
    assert_eq!(task_result(&summary, "0")["exit_code"], 124);
}

#[test]
fn retry_reruns_failing_task() {
    let ws = Workspace::new();
    // Succeeds once the witness file exists; the first attempt creates it.
    let file = ws.file(
        "retry.txt",
        "task=0\nhostname=localhost\nexec=shell\n\
         command=test -f witness || { touch witness; false; }\n\
         retry_count=2\nretry_delay=0\n",
    );
    let (code, _) = ws.run_json(&file, &[]);
    assert_eq!(code, 0);
}

#[test]
fn loop_with_break_condition() {
    let ws = Workspace::new();
    // Each iteration appends a line; the loop breaks once three exist.
    let file = ws.file(
        "loop.txt",
        "task=0\nhostname=localhost\nexec=shell\n\
         command=echo tick >> ticks; cat ticks\n\
         loop=10\nnext=loop\nloop_break=stdout_count>=3\n",
    );
    let (code, _) = ws.run_json(&file, &[]);
    assert_eq!(code, 0);
    let ticks = std::fs::read_to_string(ws.path().join("ticks")).unwrap();
    assert_eq!(ticks.lines().count(), 3);
}

#[test]
fn decision_task_routes_without_executing() {
    let ws = Workspace::new();
    let file = ws.file(
        "decision.txt",
        "task=0\nhostname=localhost\ncommand=echo\narguments=42\n\
         task=1\ntype=decision\nsuccess=@0_stdout@=42\non_success=2\non_failure=9\n\
         task=2\nhostname=localhost\ncommand=echo\narguments=chosen\n\
         task=9\nhostname=localhost\ncommand=echo\narguments=rejected\n",
    );
    let (code, summary) = ws.run_json(&file, &[]);
    assert_eq!(code, 0);
    assert_eq!(execution_path(&summary), vec![0, 1, 2]);
}

#[test]
fn conditional_branch_selection() {
    let ws = Workspace::new();
    let file = ws.file(
        "cond.txt",
        "task=0\nhostname=localhost\ncommand=echo\narguments=prod\n\
         task=1\ncondition=@0_stdout@=prod\nif_true_tasks=100\nif_false_tasks=101\non_success=2\n\
         task=2\nhostname=localhost\ncommand=echo\narguments=after\n\
         task=100\nhostname=localhost\nexec=shell\ncommand=echo yes > branch\n\
         task=101\nhostname=localhost\nexec=shell\ncommand=echo no > branch\n",
    );
    let (code, summary) = ws.run_json(&file, &[]);
    assert_eq!(code, 0);
    assert_eq!(execution_path(&summary), vec![0, 1, 2]);
    let branch = std::fs::read_to_string(ws.path().join("branch")).unwrap();
    assert_eq!(branch.trim(), "yes");
}

#[test]
fn stdout_split_selects_a_field() {
    let ws = Workspace::new();
    let file = ws.file(
        "split.txt",
        "task=0\nhostname=localhost\ncommand=echo\narguments=alpha beta gamma\n\
         stdout_split=space,1\n\
         task=1\nhostname=localhost\ncommand=echo\narguments=got:@0_stdout@\n",
    );
    let (code, summary) = ws.run_json(&file, &[]);
    assert_eq!(code, 0);
    assert!(task_result(&summary, "1")["stdout"]
        .as_str()
        .unwrap()
        .contains("got:beta"));
}

#[test]
fn start_from_begins_mid_workflow() {
    let ws = Workspace::new();
    let file = ws.file(
        "start.txt",
        "task=0\nhostname=localhost\ncommand=false\n\
         task=1\nhostname=localhost\ncommand=echo\narguments=second\n",
    );
    let (code, summary) = ws.run_json(&file, &["--start-from", "1"]);
    assert_eq!(code, 0);
    assert_eq!(execution_path(&summary), vec![1]);
}
