//! Startup orchestration.
//!
//! # Responsibilities
//! - Start the signal watcher alongside the server
//! - Serve on the calling task until the listener returns
//! - Tell apart a coordinated close from a listener failure
//! - Hold the caller until the shutdown completion token fires
//!
//! # Design Decisions
//! - A listener failure raises a synthetic shutdown event, so the process
//!   exits promptly instead of waiting for a signal that may never come
//! - The completion token is the only way out, on success and failure alike

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::http::{HttpServer, ServeError};
use crate::lifecycle::shutdown::{completion, ShutdownReport};
use crate::lifecycle::signals::{
    ShutdownSignal, ShutdownTrigger, SignalSource, SignalWatcher, SHUTDOWN_TIMEOUT,
};

/// How a [`Lifecycle::run`] ended.
#[derive(Debug)]
pub struct RunSummary {
    /// Listener failure, if serving ended for any reason other than shutdown.
    pub serve_error: Option<ServeError>,
    /// Report from the watcher; `None` only if the watcher died without firing.
    pub shutdown: Option<ShutdownReport>,
}

impl RunSummary {
    /// Whether the process should exit successfully.
    pub fn is_clean(&self) -> bool {
        self.serve_error.is_none() && self.shutdown.is_some()
    }
}

/// Couples an [`HttpServer`] with the signal watcher that stops it.
pub struct Lifecycle {
    server: Arc<HttpServer>,
    trigger: ShutdownTrigger,
    source: SignalSource,
    shutdown_timeout: Duration,
}

impl Lifecycle {
    /// `trigger` must feed `source`; it is used to raise synthetic events.
    pub fn new(server: Arc<HttpServer>, trigger: ShutdownTrigger, source: SignalSource) -> Self {
        Self {
            server,
            trigger,
            source,
            shutdown_timeout: SHUTDOWN_TIMEOUT,
        }
    }

    /// Override the drain deadline (defaults to [`SHUTDOWN_TIMEOUT`]).
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Serve until a shutdown event has been fully handled.
    pub async fn run(self, parent: CancellationToken) -> RunSummary {
        let (done, completion) = completion();
        let watcher = SignalWatcher::new(Arc::clone(&self.server), self.source, done)
            .with_timeout(self.shutdown_timeout);
        tokio::spawn(watcher.run(parent));

        let serve_error = match self.server.listen_and_serve().await {
            Ok(never) => match never {},
            Err(e) if e.is_server_closed() => None,
            Err(e) => {
                tracing::error!(error = %e, "http server ListenAndServe error");
                if !self.trigger.trigger(ShutdownSignal::ListenerFailed) {
                    tracing::debug!("shutdown already requested");
                }
                Some(e)
            }
        };

        let shutdown = completion.wait().await;
        if shutdown.is_none() {
            tracing::error!("shutdown watcher exited without completing");
        }

        tracing::info!("http server stopped");

        RunSummary {
            serve_error,
            shutdown,
        }
    }
}
