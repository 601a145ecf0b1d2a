// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host validation probes: DNS resolution plus the execution type's
//! connectivity test. A unique `(hostname, exec)` pair is probed exactly
//! once per run.

use crate::cancel::Cancel;
use crate::config::{ExecConfig, ValidationTest};
use crate::runner::{CommandSpec, RunStatus, Runner};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;
use thiserror::Error;

/// Probe timeout; connectivity checks should be fast or fail.
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Error)]
pub enum ProbeError {
    #[error("hostname '{hostname}' did not resolve")]
    Resolution { hostname: String },

    #[error("connection test to '{hostname}' via {exec} failed: {detail}")]
    Connection {
        hostname: String,
        exec: String,
        detail: String,
    },

    #[error("execution type '{exec}' binary '{binary}' not found in PATH")]
    BinaryMissing { exec: String, binary: String },
}

/// Check PATH for an executable. Absolute paths are checked directly.
pub fn binary_in_path(binary: &str) -> bool {
    let path = std::path::Path::new(binary);
    if path.is_absolute() {
        return path.is_file();
    }
    let Ok(path_var) = std::env::var("PATH") else {
        return false;
    };
    std::env::split_paths(&path_var).any(|dir| dir.join(binary).is_file())
}

/// Cached host prober.
#[derive(Debug)]
pub struct HostProbe {
    runner: Runner,
    /// Probe outcome per `(hostname, exec)`; `Ok(())` entries satisfy the
    /// probe-once rule for repeated pairs.
    cache: Mutex<HashMap<(String, String), Result<(), ProbeError>>>,
}

impl HostProbe {
    pub fn new(runner: Runner) -> Self {
        HostProbe {
            runner,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Validate one `(hostname, exec)` pair: the exec binary must be on
    /// PATH, the hostname must resolve, and the execution type's
    /// `validation_test` (when configured) must pass.
    pub async fn probe(
        &self,
        hostname: &str,
        exec: &str,
        config: &ExecConfig,
    ) -> Result<(), ProbeError> {
        let key = (hostname.to_string(), exec.to_string());
        if let Some(cached) = self.cache.lock().get(&key) {
            return cached.clone();
        }

        let outcome = self.probe_uncached(hostname, exec, config).await;
        self.cache.lock().insert(key, outcome.clone());
        outcome
    }

    async fn probe_uncached(
        &self,
        hostname: &str,
        exec: &str,
        config: &ExecConfig,
    ) -> Result<(), ProbeError> {
        if let Some(binary) = config.binary(exec) {
            if !binary_in_path(binary) {
                return Err(ProbeError::BinaryMissing {
                    exec: exec.to_string(),
                    binary: binary.to_string(),
                });
            }
        }

        if !resolves(hostname).await {
            return Err(ProbeError::Resolution {
                hostname: hostname.to_string(),
            });
        }

        if let Some(test) = config.validation_test(exec) {
            self.run_validation_test(hostname, exec, test).await?;
        }

        tracing::debug!(hostname, exec, "host probe passed");
        Ok(())
    }

    async fn run_validation_test(
        &self,
        hostname: &str,
        exec: &str,
        test: &ValidationTest,
    ) -> Result<(), ProbeError> {
        let mut argv = vec![test.command.clone()];
        argv.extend(
            test.arguments
                .iter()
                .map(|arg| arg.replace("{hostname}", hostname)),
        );

        let spec = CommandSpec {
            argv,
            timeout: PROBE_TIMEOUT,
        };
        let outcome = self
            .runner
            .run(&spec, &Cancel::never())
            .await
            .map_err(|e| ProbeError::Connection {
                hostname: hostname.to_string(),
                exec: exec.to_string(),
                detail: e.to_string(),
            })?;

        if outcome.status != RunStatus::Completed {
            return Err(ProbeError::Connection {
                hostname: hostname.to_string(),
                exec: exec.to_string(),
                detail: "connection test timed out".to_string(),
            });
        }
        if let Some(expected) = test.expected_exit {
            if outcome.exit_code != expected {
                return Err(ProbeError::Connection {
                    hostname: hostname.to_string(),
                    exec: exec.to_string(),
                    detail: format!(
                        "expected exit {}, got {}",
                        expected, outcome.exit_code
                    ),
                });
            }
        }
        if let Some(expected) = &test.expected_output {
            let stdout = outcome.stdout.inline(4096);
            if !stdout.contains(expected.as_str()) {
                return Err(ProbeError::Connection {
                    hostname: hostname.to_string(),
                    exec: exec.to_string(),
                    detail: format!("output did not contain '{}'", expected),
                });
            }
        }
        Ok(())
    }
}

/// DNS check via the system resolver. The port is irrelevant; resolution
/// is all that matters.
async fn resolves(hostname: &str) -> bool {
    tokio::net::lookup_host((hostname, 0))
        .await
        .map(|mut addrs| addrs.next().is_some())
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "probe_tests.rs"]
mod tests;
