// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cancellation propagation.
//!
//! A single [`CancelSource`] (held by the controller) fans out to cloned
//! [`Cancel`] handles polled by workers at safe points: before a spawn,
//! between retries, between loop iterations, and inside the child wait.

use tokio::sync::watch;

/// Write side of the shutdown flag.
#[derive(Debug)]
pub struct CancelSource {
    tx: watch::Sender<bool>,
}

/// Read side; cheap to clone, one per worker.
#[derive(Debug, Clone)]
pub struct Cancel {
    rx: watch::Receiver<bool>,
}

/// Create a connected source/handle pair.
pub fn cancel_pair() -> (CancelSource, Cancel) {
    let (tx, rx) = watch::channel(false);
    (CancelSource { tx }, Cancel { rx })
}

impl CancelSource {
    /// Trip the flag. Idempotent.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    pub fn subscribe(&self) -> Cancel {
        Cancel {
            rx: self.tx.subscribe(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Cancel {
    /// Non-blocking check for the safe-point polls.
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once cancellation is requested. Never resolves if the
    /// source is dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                // Source dropped uncancelled: park forever.
                std::future::pending::<()>().await;
            }
        }
    }

    /// A handle that never fires, for contexts without a controller.
    pub fn never() -> Cancel {
        let (_tx, rx) = watch::channel(false);
        Cancel { rx }
    }
}

#[cfg(test)]
#[path = "cancel_tests.rs"]
mod tests;
