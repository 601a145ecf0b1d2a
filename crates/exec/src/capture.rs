// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Streaming output capture with in-memory→tempfile switchover.
//!
//! Streams stay in memory until they reach the 1 MiB threshold, then spill
//! to a uniquely named scratch file in the system temp directory. An
//! absolute per-stream cap bounds disk use; bytes past it are dropped with
//! a single diagnostic. Scratch files are registered with the session
//! [`TempTracker`] so cleanup removes exactly the files this run created.

use parking_lot::Mutex;
use std::path::PathBuf;
use std::sync::Arc;
use tasker_core::limits::{MEMORY_THRESHOLD, READ_CHUNK, STREAM_CAP};
use tasker_core::StreamData;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

/// Capture thresholds, overridable in tests.
#[derive(Debug, Clone, Copy)]
pub struct CaptureLimits {
    /// Bytes held in memory before spilling to a file.
    pub memory_threshold: usize,
    /// Absolute per-stream cap.
    pub stream_cap: u64,
}

impl Default for CaptureLimits {
    fn default() -> Self {
        CaptureLimits {
            memory_threshold: MEMORY_THRESHOLD,
            stream_cap: STREAM_CAP,
        }
    }
}

/// Registry of scratch files created by this session. Cleanup deletes only
/// paths recorded here — files from other sessions are never touched.
#[derive(Debug, Clone, Default)]
pub struct TempTracker {
    paths: Arc<Mutex<Vec<PathBuf>>>,
}

impl TempTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, path: PathBuf) {
        self.paths.lock().push(path);
    }

    /// Snapshot of the tracked paths.
    pub fn tracked(&self) -> Vec<PathBuf> {
        self.paths.lock().clone()
    }

    /// Drain the registry, handing ownership of the paths to the caller.
    pub fn take(&self) -> Vec<PathBuf> {
        std::mem::take(&mut *self.paths.lock())
    }
}

/// Capture one stream to completion.
///
/// Reads in 8 KiB chunks so the caller thread never blocks on a slow
/// producer; the stdout and stderr captures of a child run as two
/// concurrent tasks.
pub async fn capture_stream<R>(
    mut reader: R,
    prefix: &'static str,
    limits: CaptureLimits,
    tracker: TempTracker,
) -> std::io::Result<StreamData>
where
    R: AsyncRead + Unpin,
{
    let mut buffer: Vec<u8> = Vec::new();
    let mut file: Option<(PathBuf, tokio::fs::File)> = None;
    let mut total: u64 = 0;
    let mut dropped: u64 = 0;
    let mut chunk = vec![0u8; READ_CHUNK];

    loop {
        let n = reader.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        let mut bytes = &chunk[..n];

        // Enforce the absolute cap; drain the reader so the child never
        // blocks on a full pipe.
        if total >= limits.stream_cap {
            dropped += n as u64;
            continue;
        }
        if total + n as u64 > limits.stream_cap {
            let keep = (limits.stream_cap - total) as usize;
            dropped += (n - keep) as u64;
            bytes = &bytes[..keep];
        }
        total += bytes.len() as u64;

        match file.as_mut() {
            Some((_, f)) => f.write_all(bytes).await?,
            None => {
                if buffer.len() + bytes.len() <= limits.memory_threshold {
                    buffer.extend_from_slice(bytes);
                } else {
                    // Threshold crossed: flush the buffer to a scratch file
                    // and continue on disk.
                    let (path, mut f) = open_scratch(prefix, &tracker)?;
                    f.write_all(&buffer).await?;
                    f.write_all(bytes).await?;
                    buffer.clear();
                    file = Some((path, f));
                }
            }
        }
    }

    if dropped > 0 {
        tracing::warn!(
            prefix,
            dropped,
            cap = limits.stream_cap,
            "stream exceeded capture cap; excess bytes dropped"
        );
    }

    match file {
        Some((path, mut f)) => {
            f.flush().await?;
            Ok(StreamData::File { path, size: total })
        }
        None => Ok(StreamData::Memory(
            String::from_utf8_lossy(&buffer).into_owned(),
        )),
    }
}

/// Create a uniquely named scratch file and register it with the session
/// tracker before any bytes land in it.
fn open_scratch(
    prefix: &str,
    tracker: &TempTracker,
) -> std::io::Result<(PathBuf, tokio::fs::File)> {
    let (file, path) = tempfile::Builder::new()
        .prefix(prefix)
        .tempfile()
        .map(|t| {
            let (file, temp_path) = t.into_parts();
            (file, temp_path.keep())
        })?;
    let path = path.map_err(|e| std::io::Error::other(e.to_string()))?;
    tracker.register(path.clone());
    Ok((path, tokio::fs::File::from_std(file)))
}

#[cfg(test)]
#[path = "capture_tests.rs"]
mod tests;
