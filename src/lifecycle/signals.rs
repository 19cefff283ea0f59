//! OS signal handling and the shutdown watcher.
//!
//! # Responsibilities
//! - Register signal handlers (Ctrl-C, SIGINT, SIGTERM)
//! - Translate signals to [`ShutdownSignal`] events on a channel
//! - Turn the first event into one deadline-bounded server shutdown
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - The watcher reads events from a [`SignalSource`], never from the OS
//!   directly, so tests and the main flow can inject synthetic events
//! - First event wins; the watcher does not loop or retry
//! - Parent cancellation shortens the shutdown deadline but does not end
//!   the wait for a signal

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::http::{DeadlineCause, HttpServer};
use crate::lifecycle::shutdown::{CompletionToken, ShutdownReport};

/// Deadline for draining in-flight requests once a signal arrives.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// What asked the process to shut down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    /// Ctrl-C on platforms without Unix signals.
    Interrupt,
    /// SIGINT (also what Ctrl-C delivers on Unix).
    SigInt,
    /// SIGTERM.
    SigTerm,
    /// The listener could not start or broke; raised by the process itself.
    ListenerFailed,
}

impl std::fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ShutdownSignal::Interrupt => "interrupt",
            ShutdownSignal::SigInt => "SIGINT",
            ShutdownSignal::SigTerm => "SIGTERM",
            ShutdownSignal::ListenerFailed => "listener failed",
        })
    }
}

/// Sending half of a [`SignalSource`]. Cheap to clone.
#[derive(Debug, Clone)]
pub struct ShutdownTrigger {
    tx: mpsc::Sender<ShutdownSignal>,
}

impl ShutdownTrigger {
    /// Raise a shutdown event.
    ///
    /// Returns `false` if an earlier event is still pending or the watcher is gone.
    pub fn trigger(&self, signal: ShutdownSignal) -> bool {
        self.tx.try_send(signal).is_ok()
    }

    /// Whether the receiving source has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Single-subscription stream of shutdown events.
#[derive(Debug)]
pub struct SignalSource {
    rx: mpsc::Receiver<ShutdownSignal>,
}

impl SignalSource {
    /// Source fed only by the returned trigger.
    pub fn channel() -> (ShutdownTrigger, SignalSource) {
        let (tx, rx) = mpsc::channel(1);
        (ShutdownTrigger { tx }, SignalSource { rx })
    }

    /// Source fed by process signals, plus a trigger for synthetic events.
    ///
    /// Handlers are registered before this returns and stay installed for
    /// the life of the process. Must be called inside a Tokio runtime.
    pub fn os() -> std::io::Result<(ShutdownTrigger, SignalSource)> {
        let (trigger, source) = Self::channel();
        forward_os_signals(trigger.clone())?;
        Ok((trigger, source))
    }

    /// Next shutdown event, or `None` once every trigger is gone.
    pub async fn recv(&mut self) -> Option<ShutdownSignal> {
        self.rx.recv().await
    }
}

#[cfg(unix)]
fn forward_os_signals(trigger: ShutdownTrigger) -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;

    tokio::spawn(async move {
        loop {
            let received = tokio::select! {
                Some(()) = sigint.recv() => ShutdownSignal::SigInt,
                Some(()) = sigterm.recv() => ShutdownSignal::SigTerm,
                else => break,
            };
            tracing::debug!(signal = %received, "Received OS signal");
            if trigger.is_closed() {
                break;
            }
            trigger.trigger(received);
        }
    });
    Ok(())
}

#[cfg(not(unix))]
fn forward_os_signals(trigger: ShutdownTrigger) -> std::io::Result<()> {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!(signal = %ShutdownSignal::Interrupt, "Received OS signal");
            if trigger.is_closed() {
                break;
            }
            trigger.trigger(ShutdownSignal::Interrupt);
        }
    });
    Ok(())
}

/// Waits for the first shutdown event and shuts the server down.
pub struct SignalWatcher {
    server: Arc<HttpServer>,
    source: SignalSource,
    done: CompletionToken,
    timeout: Duration,
}

impl SignalWatcher {
    pub fn new(server: Arc<HttpServer>, source: SignalSource, done: CompletionToken) -> Self {
        Self {
            server,
            source,
            done,
            timeout: SHUTDOWN_TIMEOUT,
        }
    }

    /// Override the drain deadline (defaults to [`SHUTDOWN_TIMEOUT`]).
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Block until a shutdown event arrives, shut the server down, then fire
    /// the completion token.
    ///
    /// `parent` being cancelled does not end the wait; it only cuts the
    /// shutdown deadline short. A source that closes without an event counts
    /// as a shutdown request, since no event can arrive after that.
    pub async fn run(mut self, parent: CancellationToken) {
        let signal = self.source.recv().await;
        let started = Instant::now();

        match signal {
            Some(signal) => tracing::info!(signal = %signal, "stopping server"),
            None => tracing::warn!("signal source closed, stopping server"),
        }

        let cancelled = parent.child_token();
        let deadline = started + self.timeout;
        let result = self
            .server
            .shutdown(async move {
                tokio::select! {
                    _ = tokio::time::sleep_until(deadline) => DeadlineCause::Elapsed,
                    _ = cancelled.cancelled() => DeadlineCause::Cancelled,
                }
            })
            .await;

        if let Err(e) = &result {
            tracing::info!(error = %e, "http server shutdown error");
        }

        self.done.fire(ShutdownReport {
            signal,
            result,
            elapsed: started.elapsed(),
        });
    }
}
