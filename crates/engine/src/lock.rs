// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Instance locking (opt-in).
//!
//! The lock is keyed by a SHA-256 over the canonicalized task-file
//! contents plus the resolved globals, so the same workflow cannot run
//! twice concurrently while distinct workflows never contend. The lock
//! file holds the owner's PID; a lock whose owner is gone is stale and
//! reclaimed.

use indexmap::IndexMap;
use sha2::{Digest, Sha256};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LockError {
    #[error("workflow instance already running (pid {pid})")]
    AlreadyRunning { pid: u32 },

    #[error("lock file error: {0}")]
    Io(#[from] std::io::Error),
}

/// Held instance lock; released on drop and on all exit paths.
#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
}

impl InstanceLock {
    /// `workflow_<hex16>.lock`, from the content hash.
    pub fn lock_file_name(task_file_content: &str, globals: &IndexMap<String, String>) -> String {
        let mut hasher = Sha256::new();
        // Canonical form: the file text followed by sorted KEY=VALUE
        // lines of the resolved globals.
        hasher.update(task_file_content.as_bytes());
        let mut keys: Vec<_> = globals.keys().collect();
        keys.sort();
        for key in keys {
            hasher.update(key.as_bytes());
            hasher.update(b"=");
            hasher.update(globals.get(key).map(String::as_str).unwrap_or("").as_bytes());
            hasher.update(b"\n");
        }
        let digest = hasher.finalize();
        let hex: String = digest.iter().take(8).map(|b| format!("{:02x}", b)).collect();
        format!("workflow_{}.lock", hex)
    }

    /// Acquire the lock in `lock_dir`. A live holder fails with
    /// [`LockError::AlreadyRunning`] unless `force`; a dead holder's lock
    /// is reclaimed.
    pub fn acquire(
        lock_dir: &Path,
        task_file_content: &str,
        globals: &IndexMap<String, String>,
        force: bool,
    ) -> Result<InstanceLock, LockError> {
        std::fs::create_dir_all(lock_dir)?;
        let path = lock_dir.join(Self::lock_file_name(task_file_content, globals));

        match Self::try_create(&path) {
            Ok(()) => Ok(InstanceLock { path }),
            Err(error) if error.kind() == std::io::ErrorKind::AlreadyExists => {
                let holder = Self::read_holder(&path);
                match holder {
                    Some(pid) if process_alive(pid) && !force => {
                        Err(LockError::AlreadyRunning { pid })
                    }
                    Some(pid) if process_alive(pid) => {
                        tracing::warn!(pid, path = %path.display(), "forcing lock takeover from live process");
                        std::fs::remove_file(&path)?;
                        Self::try_create(&path)?;
                        Ok(InstanceLock { path })
                    }
                    _ => {
                        tracing::info!(path = %path.display(), "reclaiming stale lock");
                        std::fs::remove_file(&path)?;
                        Self::try_create(&path)?;
                        Ok(InstanceLock { path })
                    }
                }
            }
            Err(error) => Err(error.into()),
        }
    }

    fn try_create(path: &Path) -> std::io::Result<()> {
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)?;
        write!(file, "{}", std::process::id())
    }

    fn read_holder(path: &Path) -> Option<u32> {
        std::fs::read_to_string(path).ok()?.trim().parse().ok()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Explicit release; identical to dropping the guard.
    pub fn release(self) {}
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        if let Err(error) = std::fs::remove_file(&self.path) {
            if error.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(path = %self.path.display(), %error, "lock release failed");
            }
        }
    }
}

/// Liveness by `/proc/<pid>` presence; on non-procfs platforms assume
/// alive (never reclaim a lock we cannot verify).
fn process_alive(pid: u32) -> bool {
    if Path::new("/proc").is_dir() {
        Path::new(&format!("/proc/{}", pid)).exists()
    } else {
        true
    }
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
