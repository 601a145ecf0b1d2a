// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! tasker - declarative workflow executor

mod args;
mod logging;
mod plan;
mod run;

use args::Cli;
use clap::Parser;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use tasker_core::ExitCode;

fn main() {
    let cli = Cli::parse();

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(error) => {
            eprintln!("tasker: failed to start runtime: {}", error);
            std::process::exit(ExitCode::InvalidArguments.code());
        }
    };

    let code = runtime.block_on(entry(cli));
    std::process::exit(code);
}

async fn entry(cli: Cli) -> i32 {
    let (source, cancel) = tasker_exec::cancel_pair();
    let source = Arc::new(source);

    // Which signal fired last, for the exit-code convention:
    // SIGINT -> 130, SIGTERM -> 15.
    let signal_seen = Arc::new(AtomicI32::new(0));
    spawn_signal_listeners(Arc::clone(&source), Arc::clone(&signal_seen));

    let code = match run::execute(cli, source, cancel).await {
        Ok(code) => code,
        Err(failure) => {
            eprintln!("tasker: {}", failure.message);
            failure.code
        }
    };

    match signal_seen.load(Ordering::SeqCst) {
        0 => code,
        libc_sigint if libc_sigint == SIGINT_CODE => ExitCode::UserInterrupt.code(),
        _ => ExitCode::Interrupted.code(),
    }
}

const SIGINT_CODE: i32 = 2;
const SIGTERM_CODE: i32 = 15;

fn spawn_signal_listeners(source: Arc<tasker_exec::CancelSource>, seen: Arc<AtomicI32>) {
    {
        let source = Arc::clone(&source);
        let seen = Arc::clone(&seen);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("SIGINT received; cancelling workflow");
                seen.store(SIGINT_CODE, Ordering::SeqCst);
                source.cancel();
            }
        });
    }
    tokio::spawn(async move {
        let Ok(mut sigterm) =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        else {
            return;
        };
        if sigterm.recv().await.is_some() {
            tracing::warn!("SIGTERM received; cancelling workflow");
            seen.store(SIGTERM_CODE, Ordering::SeqCst);
            source.cancel();
        }
    });
}
