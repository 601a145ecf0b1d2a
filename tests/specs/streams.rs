//! Large-output specs: spill to scratch files, inline truncation, file
//! references, cleanup.

use crate::prelude::*;

#[test]
fn large_output_inline_is_capped_and_file_passes_whole() {
    let ws = Workspace::new();
    // Task 0 emits 5 MiB; task 1 inlines it (capped at 100 KiB of argv);
    // task 2 reads the backing file and sees every byte.
    let file = ws.file(
        "s5.txt",
        "task=0\nhostname=localhost\nexec=shell\ncommand=yes x | head -c 5242880\n\
         task=1\nhostname=localhost\nexec=shell\ncommand=printf %s '@0_stdout@' | wc -c\n\
         task=2\nhostname=localhost\nexec=shell\ncommand=wc -c < @0_stdout_file@\n",
    );
    let (code, summary) = ws.run_json(&file, &[]);
    assert_eq!(code, 0);

    let inlined: u64 = task_result(&summary, "1")["stdout"]
        .as_str()
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    assert!(inlined <= 102_400, "inline substitution must be capped: {inlined}");
    assert!(inlined > 0);

    let full: u64 = task_result(&summary, "2")["stdout"]
        .as_str()
        .unwrap()
        .trim()
        .parse()
        .unwrap();
    assert_eq!(full, 5_242_880, "file reference must see the whole stream");

    // Scratch files are removed by cleanup.
    assert!(
        ws.scratch_files().is_empty(),
        "leftover scratch files: {:?}",
        ws.scratch_files()
    );
}

#[test]
fn small_output_leaves_no_scratch_files() {
    let ws = Workspace::new();
    let file = ws.file(
        "small.txt",
        "task=0\nhostname=localhost\ncommand=echo\narguments=tiny\n",
    );
    let (code, _) = ws.run_json(&file, &[]);
    assert_eq!(code, 0);
    assert!(ws.scratch_files().is_empty());
}

#[test]
fn scratch_files_cleaned_on_failure_too() {
    let ws = Workspace::new();
    let file = ws.file(
        "failing.txt",
        "task=0\nhostname=localhost\nexec=shell\ncommand=yes x | head -c 2097152; false\n",
    );
    let (code, _) = ws.run_json(&file, &[]);
    assert_eq!(code, 18);
    assert!(ws.scratch_files().is_empty());
}

#[test]
fn stderr_is_captured_separately() {
    let ws = Workspace::new();
    let file = ws.file(
        "stderr.txt",
        "task=0\nhostname=localhost\nexec=shell\ncommand=echo out; echo err >&2\n",
    );
    let (code, summary) = ws.run_json(&file, &[]);
    assert_eq!(code, 0);
    let result = task_result(&summary, "0");
    assert!(result["stdout"].as_str().unwrap().contains("out"));
    assert!(result["stderr"].as_str().unwrap().contains("err"));
}

#[test]
fn success_can_inspect_stderr() {
    let ws = Workspace::new();
    let file = ws.file(
        "quiet.txt",
        "task=0\nhostname=localhost\nexec=shell\ncommand=echo ok\nsuccess=exit_0 & stderr~\n",
    );
    let (code, _) = ws.run_json(&file, &[]);
    assert_eq!(code, 0);
}
