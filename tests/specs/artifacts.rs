//! Persisted-artifact specs: JSON summary, project TSV, log files,
//! alert hook.

use crate::prelude::*;

#[test]
fn json_summary_shape() {
    let ws = Workspace::new();
    let file = ws.file(
        "shape.txt",
        "ENV=prod\ntask=0\nhostname=localhost\ncommand=echo\narguments=hi\n",
    );
    let (code, summary) = ws.run_json(&file, &[]);
    assert_eq!(code, 0);

    let metadata = &summary["workflow_metadata"];
    assert_eq!(metadata["status"], "success");
    assert_eq!(metadata["execution_id"].as_str().unwrap().len(), 8);
    assert!(metadata["task_file"].as_str().unwrap().contains("shape.txt"));
    assert!(metadata["duration_seconds"].as_f64().unwrap() >= 0.0);

    let exec = &summary["execution_summary"];
    assert_eq!(exec["total_tasks"], 1);
    assert_eq!(exec["executed"], 1);
    assert_eq!(exec["succeeded"], 1);
    assert_eq!(exec["failed"], 0);
    assert_eq!(exec["final_task"], 0);

    let result = task_result(&summary, "0");
    assert_eq!(result["exit_code"], 0);
    assert_eq!(result["success"], true);
    assert_eq!(summary["variables"]["ENV"], "prod");
}

#[test]
fn json_summary_written_on_failure_too() {
    let ws = Workspace::new();
    let file = ws.file("fail.txt", "task=0\nhostname=localhost\ncommand=false\n");
    let (code, summary) = ws.run_json(&file, &[]);
    assert_eq!(code, 18);
    assert_eq!(summary["workflow_metadata"]["status"], "failed");
    assert!(summary["execution_summary"]["failure_info"]
        .as_str()
        .unwrap()
        .contains("task 0"));
}

#[test]
fn project_tsv_appends_one_line_per_run() {
    let ws = Workspace::new();
    let file = ws.file("p.txt", "task=0\nhostname=localhost\ncommand=true\n");
    for _ in 0..2 {
        ws.tasker()
            .arg(&file)
            .arg("-r")
            .arg("-p")
            .arg("billing")
            .arg("-l")
            .arg(ws.log_dir())
            .assert()
            .code(0);
    }
    let summary_path = ws.log_dir().join("project").join("billing.summary");
    let content = std::fs::read_to_string(&summary_path).unwrap();
    assert_eq!(content.lines().count(), 2);
    let fields: Vec<&str> = content.lines().next().unwrap().split('\t').collect();
    assert_eq!(fields.len(), 8);
    assert_eq!(fields[1], "success");
    assert_eq!(fields[2], "0");
}

#[test]
fn log_file_is_created_in_log_dir() {
    let ws = Workspace::new();
    let file = ws.file("l.txt", "task=0\nhostname=localhost\ncommand=true\n");
    ws.tasker()
        .arg(&file)
        .arg("-r")
        .arg("-l")
        .arg(ws.log_dir())
        .assert()
        .code(0);
    let logs: Vec<_> = std::fs::read_dir(ws.log_dir())
        .unwrap()
        .filter_map(|e| {
            let name = e.unwrap().file_name().to_string_lossy().into_owned();
            (name.starts_with("tasker_") && name.ends_with(".log")).then_some(name)
        })
        .collect();
    assert_eq!(logs.len(), 1, "one timestamped log file: {logs:?}");
}

#[test]
fn alert_hook_fires_on_failure() {
    let ws = Workspace::new();
    let witness = ws.path().join("alert_witness");
    let hook = ws.script(
        "alert.sh",
        &format!(
            "#!/bin/sh\necho \"$TASKER_FAILED_TASK $TASKER_EXIT_CODE\" > {}\n",
            witness.display()
        ),
        0o700,
    );
    let file = ws.file("fail.txt", "task=0\nhostname=localhost\ncommand=false\n");
    ws.tasker()
        .arg(&file)
        .arg("-r")
        .arg("--alert-on-failure")
        .arg(&hook)
        .assert()
        .code(18);
    let written = std::fs::read_to_string(&witness).unwrap();
    assert_eq!(written.trim(), "0 18");
}

#[test]
fn alert_hook_does_not_fire_on_success() {
    let ws = Workspace::new();
    let witness = ws.path().join("alert_witness");
    let hook = ws.script(
        "alert.sh",
        &format!("#!/bin/sh\ntouch {}\n", witness.display()),
        0o700,
    );
    let file = ws.file("ok.txt", "task=0\nhostname=localhost\ncommand=true\n");
    ws.tasker()
        .arg(&file)
        .arg("-r")
        .arg("--alert-on-failure")
        .arg(&hook)
        .assert()
        .code(0);
    assert!(!witness.exists());
}

#[test]
fn fire_and_forget_masks_task_failures() {
    let ws = Workspace::new();
    let file = ws.file("fail.txt", "task=0\nhostname=localhost\ncommand=false\n");
    ws.tasker()
        .arg(&file)
        .arg("-r")
        .arg("--fire-and-forget")
        .assert()
        .code(0);
}
