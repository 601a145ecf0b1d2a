//! Test helpers for behavioral specifications.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::path::{Path, PathBuf};

/// A temp workspace holding task files, logs, and scratch space.
pub struct Workspace {
    temp: tempfile::TempDir,
}

impl Workspace {
    pub fn new() -> Workspace {
        Workspace {
            temp: tempfile::tempdir().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    pub fn log_dir(&self) -> PathBuf {
        self.path().join("logs")
    }

    /// Write a file into the workspace and return its path.
    pub fn file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    /// An executable file with the given mode.
    pub fn script(&self, name: &str, content: &str, mode: u32) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = self.file(name, content);
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(mode);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    /// A tasker command rooted in this workspace: scratch files and logs
    /// land inside it so every run is hermetic.
    pub fn tasker(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::Command::cargo_bin("tasker").unwrap();
        cmd.current_dir(self.path());
        cmd.env("TMPDIR", self.path());
        cmd.env_remove("TASK_EXECUTOR_TYPE");
        cmd.env_remove("TASK_EXECUTOR_LOG");
        cmd.env_remove("TASK_EXECUTOR_TIMEOUT");
        cmd
    }

    /// Run a task file with `-r` plus extra flags; returns the JSON
    /// summary parsed from `summary.json`.
    pub fn run_json(&self, task_file: &Path, extra: &[&str]) -> (i32, serde_json::Value) {
        let json_path = self.path().join("summary.json");
        let mut cmd = self.tasker();
        cmd.arg(task_file)
            .arg("-r")
            .arg("--output-json")
            .arg(&json_path);
        for flag in extra {
            cmd.arg(flag);
        }
        let output = cmd.output().unwrap();
        let code = output.status.code().unwrap_or(-1);
        let summary = std::fs::read_to_string(&json_path)
            .ok()
            .and_then(|text| serde_json::from_str(&text).ok())
            .unwrap_or(serde_json::Value::Null);
        (code, summary)
    }

    /// Leftover scratch files from captures, if any.
    pub fn scratch_files(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.path())
            .unwrap()
            .filter_map(|entry| {
                let path = entry.unwrap().path();
                let name = path.file_name()?.to_string_lossy().into_owned();
                (name.starts_with("tasker_stdout_") || name.starts_with("tasker_stderr_"))
                    .then_some(path)
            })
            .collect()
    }
}

/// Execution path as task ids from a parsed summary.
pub fn execution_path(summary: &serde_json::Value) -> Vec<u64> {
    summary["execution_summary"]["execution_path"]
        .as_array()
        .map(|ids| ids.iter().filter_map(|v| v.as_u64()).collect())
        .unwrap_or_default()
}

/// One task's result object from a parsed summary.
pub fn task_result<'a>(summary: &'a serde_json::Value, id: &str) -> &'a serde_json::Value {
    &summary["task_results"][id]
}
