//! CLI surface specs: help, argument errors, plan, validation paths.

use crate::prelude::*;

#[test]
fn help_lists_the_surface() {
    let ws = Workspace::new();
    let output = ws.tasker().arg("--help").output().unwrap();
    assert!(output.status.success());
    let text = String::from_utf8_lossy(&output.stdout);
    for flag in [
        "--run",
        "--project",
        "--log-dir",
        "--validate-only",
        "--show-plan",
        "--start-from",
        "--auto-recovery",
        "--instance-check",
        "--output-json",
        "--alert-on-failure",
    ] {
        assert!(text.contains(flag), "help is missing {flag}");
    }
}

#[test]
fn version_prints() {
    let ws = Workspace::new();
    ws.tasker().arg("--version").assert().success();
}

#[test]
fn missing_task_file_argument_exits_10() {
    let ws = Workspace::new();
    ws.tasker().assert().code(10);
}

#[test]
fn nonexistent_task_file_exits_11() {
    let ws = Workspace::new();
    ws.tasker()
        .arg("no-such-file.txt")
        .arg("-r")
        .assert()
        .code(11);
}

#[test]
fn empty_task_file_exits_12() {
    let ws = Workspace::new();
    let file = ws.file("empty.txt", "\n\n# only comments\n\n");
    ws.tasker().arg(&file).arg("-r").assert().code(12);
}

#[test]
fn parse_error_exits_13() {
    let ws = Workspace::new();
    let file = ws.file("bad.txt", "task=zero\nhostname=h\ncommand=true\n");
    ws.tasker().arg(&file).arg("-r").assert().code(13);
}

#[test]
fn duplicate_task_id_exits_13() {
    let ws = Workspace::new();
    let file = ws.file(
        "dup.txt",
        "task=1\nhostname=h\ncommand=true\ntask=1\nhostname=h\ncommand=true\n",
    );
    ws.tasker().arg(&file).arg("-r").assert().code(13);
}

#[test]
fn validation_failure_exits_20() {
    let ws = Workspace::new();
    // Normal task without a command.
    let file = ws.file("invalid.txt", "task=0\nhostname=web1\n");
    ws.tasker().arg(&file).arg("-r").assert().code(20);
}

#[test]
fn unknown_exec_type_exits_24() {
    let ws = Workspace::new();
    let file = ws.file(
        "exec.txt",
        "task=0\nhostname=localhost\ncommand=true\nexec=p7s\n",
    );
    ws.tasker().arg(&file).arg("-r").assert().code(24);
}

#[test]
fn validate_only_passes_clean_file() {
    let ws = Workspace::new();
    let file = ws.file("ok.txt", "task=0\nhostname=localhost\ncommand=true\n");
    let output = ws
        .tasker()
        .arg(&file)
        .arg("--validate-only")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(0));
    let text = String::from_utf8_lossy(&output.stdout);
    assert!(text.contains("validated"));
}

#[test]
fn validation_reports_unreachable_tasks() {
    let ws = Workspace::new();
    let file = ws.file(
        "unreachable.txt",
        "task=0\nhostname=h\ncommand=true\nnext=never\ntask=5\nhostname=h\ncommand=true\n",
    );
    let output = ws
        .tasker()
        .arg(&file)
        .arg("--validate-only")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(20));
    let text = String::from_utf8_lossy(&output.stderr);
    assert!(text.contains("unreachable"));
}

#[test]
fn skip_validation_allows_unreachable_tasks() {
    let ws = Workspace::new();
    let file = ws.file(
        "unreachable.txt",
        "task=0\nhostname=h\ncommand=true\nnext=never\ntask=5\nhostname=h\ncommand=true\n",
    );
    ws.tasker()
        .arg(&file)
        .arg("-r")
        .arg("--skip-validation")
        .assert()
        .code(0);
}

#[test]
fn security_validation_blocks_metacharacters() {
    let ws = Workspace::new();
    let file = ws.file("sec.txt", "task=0\nhostname=h\ncommand=rm;ls\n");
    ws.tasker().arg(&file).arg("-r").assert().code(20);
}

#[test]
fn shell_exec_permits_metacharacters() {
    let ws = Workspace::new();
    let file = ws.file(
        "shell.txt",
        "task=0\nhostname=localhost\nexec=shell\ncommand=echo one | wc -l\n",
    );
    ws.tasker().arg(&file).arg("-r").assert().code(0);
}

#[test]
fn without_run_flag_shows_the_plan() {
    let ws = Workspace::new();
    let file = ws.file(
        "plan.txt",
        "task=0\nhostname=web1\ncommand=echo\narguments=hi\n",
    );
    let output = ws.tasker().arg(&file).output().unwrap();
    assert_eq!(output.status.code(), Some(0));
    let text = String::from_utf8_lossy(&output.stdout);
    assert!(text.contains("[0] normal"));
    assert!(text.contains("echo hi"));
}

#[test]
fn file_prelude_arguments_apply() {
    let ws = Workspace::new();
    // The file itself demands a project summary.
    let file = ws.file(
        "prelude.txt",
        "--project preluded\n--log-dir logs\n\ntask=0\nhostname=localhost\ncommand=true\n",
    );
    ws.tasker().arg(&file).arg("-r").assert().code(0);
    let summary = ws.log_dir().join("project").join("preluded.summary");
    assert!(summary.exists(), "prelude --project must take effect");
}

#[test]
fn cli_value_beats_file_prelude() {
    let ws = Workspace::new();
    let file = ws.file(
        "prelude.txt",
        "--project fromfile\n--log-dir logs\n\ntask=0\nhostname=localhost\ncommand=true\n",
    );
    ws.tasker()
        .arg(&file)
        .arg("-r")
        .arg("-p")
        .arg("fromcli")
        .assert()
        .code(0);
    assert!(ws.log_dir().join("project").join("fromcli.summary").exists());
    assert!(!ws.log_dir().join("project").join("fromfile.summary").exists());
}

#[test]
fn show_effective_args_prints_merged_settings() {
    let ws = Workspace::new();
    let file = ws.file(
        "eff.txt",
        "--timeout 77\n\ntask=0\nhostname=localhost\ncommand=true\n",
    );
    let output = ws
        .tasker()
        .arg(&file)
        .arg("--show-effective-args")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(0));
    let text = String::from_utf8_lossy(&output.stdout);
    assert!(text.contains("timeout     = 77"));
}

#[test]
fn env_defaults_apply() {
    let ws = Workspace::new();
    let file = ws.file("env.txt", "task=0\nhostname=localhost\ncommand=true\n");
    let output = ws
        .tasker()
        .env("TASK_EXECUTOR_TIMEOUT", "123")
        .arg(&file)
        .arg("--show-effective-args")
        .output()
        .unwrap();
    let text = String::from_utf8_lossy(&output.stdout);
    assert!(text.contains("timeout     = 123"));
}
