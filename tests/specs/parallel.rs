//! Parallel block specs: fan-out, aggregates, master timeout.

use crate::prelude::*;

#[test]
fn hostnames_fan_out_with_min_success() {
    let ws = Workspace::new();
    // Five synthesized subtasks; the one whose id ends in 1 fails.
    let file = ws.file(
        "s4.txt",
        "task=0\ntype=parallel\nhostnames=h1,h2,h3,h4,h5\nexec=shell\n\
         command=test @task@ != 100001\nmax_parallel=3\n\
         success=min_success=4\non_success=1\n\
         task=1\nhostname=localhost\ncommand=echo\narguments=continued\n",
    );
    let (code, summary) = ws.run_json(&file, &["--skip-host-validation"]);
    assert_eq!(code, 0);
    assert_eq!(execution_path(&summary), vec![0, 1]);
    // The parent records the aggregate verdict.
    assert_eq!(task_result(&summary, "0")["success"], true);
    // Four subtask results in the reserved range succeeded.
    let succeeded = (0..5)
        .filter(|i| task_result(&summary, &format!("10000{i}"))["success"] == true)
        .count();
    assert_eq!(succeeded, 4);
}

#[test]
fn aggregate_counters_are_referencable() {
    let ws = Workspace::new();
    let file = ws.file(
        "counters.txt",
        "task=0\ntype=parallel\nhostnames=a,b,c\ncommand=true\n\
         task=1\nhostname=localhost\ncommand=echo\n\
         arguments=@0_success_count@/@0_total_count@ failed=@0_failed_count@\n",
    );
    let (code, summary) = ws.run_json(&file, &[]);
    assert_eq!(code, 0);
    assert!(task_result(&summary, "1")["stdout"]
        .as_str()
        .unwrap()
        .contains("3/3 failed=0"));
}

#[test]
fn all_success_is_the_default_criterion() {
    let ws = Workspace::new();
    let file = ws.file(
        "default.txt",
        "task=0\ntype=parallel\nhostnames=a,b\nexec=shell\ncommand=test @task@ = 100000\n",
    );
    let (code, _) = ws.run_json(&file, &[]);
    // One of two fails, no min_success relief: exit 16.
    assert_eq!(code, 16);
}

#[test]
fn explicit_task_list_runs_each_subtask() {
    let ws = Workspace::new();
    let file = ws.file(
        "explicit.txt",
        "task=0\ntype=parallel\ntasks=100,101\non_success=1\n\
         task=1\nhostname=localhost\ncommand=echo\narguments=after\n\
         task=100\nhostname=localhost\nexec=shell\ncommand=echo a > out_a\n\
         task=101\nhostname=localhost\nexec=shell\ncommand=echo b > out_b\n",
    );
    let (code, summary) = ws.run_json(&file, &[]);
    assert_eq!(code, 0);
    assert_eq!(execution_path(&summary), vec![0, 1]);
    assert!(ws.path().join("out_a").exists());
    assert!(ws.path().join("out_b").exists());
}

#[test]
fn master_timeout_cuts_the_block_short() {
    let ws = Workspace::new();
    let file = ws.file(
        "s6.txt",
        "task=0\ntype=parallel\nhostnames=h1,h2,h3\ncommand=sleep\narguments=60\ntimeout=5\n",
    );
    let start = std::time::Instant::now();
    let (code, summary) = ws.run_json(&file, &[]);
    assert!(
        start.elapsed().as_secs() < 30,
        "the block must not wait for the 60s sleeps"
    );
    assert_eq!(code, 124);
    let agg_success = summary["execution_summary"]["succeeded"].as_u64().unwrap();
    assert_eq!(agg_success, 0);
}

#[test]
fn subtask_retries_are_per_host() {
    let ws = Workspace::new();
    // Each subtask fails once (its witness file is absent), then passes.
    let file = ws.file(
        "retry.txt",
        "task=0\ntype=parallel\nhostnames=a,b\nexec=shell\n\
         command=test -f w@task@ || { touch w@task@; false; }\n\
         retry_count=1\nretry_delay=0\n",
    );
    let (code, _) = ws.run_json(&file, &[]);
    assert_eq!(code, 0);
}
