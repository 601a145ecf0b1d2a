// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Logging sink setup.
//!
//! With a log directory configured (flag or `TASK_EXECUTOR_LOG`), lines
//! go to `<logdir>/tasker_YYYYMMDD_HHMMSS.log`; otherwise, and whenever
//! the file cannot be opened, stderr is the fallback sink.

use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Initialize tracing. Returns the log file path when one was opened.
pub fn init(log_dir: Option<&Path>, filter: &str) -> Option<PathBuf> {
    let env_filter = EnvFilter::try_new(filter).unwrap_or_else(|_| EnvFilter::new("info"));

    if let Some(dir) = log_dir {
        match open_log_file(dir) {
            Ok((path, file)) => {
                tracing_subscriber::fmt()
                    .with_env_filter(env_filter)
                    .with_writer(std::sync::Arc::new(file))
                    .with_ansi(false)
                    .init();
                return Some(path);
            }
            Err(error) => {
                eprintln!(
                    "tasker: cannot open log file in {}: {}; logging to stderr",
                    dir.display(),
                    error
                );
            }
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();
    None
}

fn open_log_file(dir: &Path) -> std::io::Result<(PathBuf, std::fs::File)> {
    std::fs::create_dir_all(dir)?;
    let name = format!(
        "tasker_{}.log",
        chrono::Local::now().format("%Y%m%d_%H%M%S")
    );
    let path = dir.join(name);
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)?;
    Ok((path, file))
}
