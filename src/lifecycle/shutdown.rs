//! Shutdown completion handoff.
//!
//! The watcher owns a [`CompletionToken`]; the main flow owns the matching
//! [`Completion`]. `fire` consumes the token, so it can fire at most once.

use std::time::Duration;

use tokio::sync::oneshot;

use crate::http::ShutdownError;
use crate::lifecycle::signals::ShutdownSignal;

/// What happened during shutdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Event that started shutdown; `None` if the signal source closed instead.
    pub signal: Option<ShutdownSignal>,
    /// Outcome of the drain.
    pub result: Result<(), ShutdownError>,
    /// Time from the event to the end of shutdown.
    pub elapsed: Duration,
}

/// Create a linked token/completion pair.
pub fn completion() -> (CompletionToken, Completion) {
    let (tx, rx) = oneshot::channel();
    (CompletionToken { tx }, Completion { rx })
}

/// One-shot signal that shutdown work has finished.
#[derive(Debug)]
pub struct CompletionToken {
    tx: oneshot::Sender<ShutdownReport>,
}

impl CompletionToken {
    /// Fire the token. Consumes it.
    pub fn fire(self, report: ShutdownReport) {
        // The main flow may have given up waiting; nothing to do then.
        let _ = self.tx.send(report);
    }
}

/// Receiving side of a [`CompletionToken`].
#[derive(Debug)]
pub struct Completion {
    rx: oneshot::Receiver<ShutdownReport>,
}

impl Completion {
    /// Wait for the token to fire.
    ///
    /// Returns `None` if the token was dropped without firing, which only
    /// happens when the watcher task panicked or was aborted.
    pub async fn wait(self) -> Option<ShutdownReport> {
        self.rx.await.ok()
    }
}
