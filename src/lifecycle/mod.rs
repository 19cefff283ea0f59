//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Spawn watcher → listen_and_serve on the calling task
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT/Ctrl-C → SignalSource → SignalWatcher
//!     → HttpServer::shutdown (10 s deadline)
//!
//! Shutdown (shutdown.rs):
//!     Watcher fires CompletionToken → main flow returns
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: stop accept, drain, force-close at the deadline
//! - Shutdown is attempted exactly once and never escalates to a crash
//! - Listener failure is turned into a shutdown event, not a hang

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{completion, Completion, CompletionToken, ShutdownReport};
pub use signals::{ShutdownSignal, ShutdownTrigger, SignalSource, SignalWatcher, SHUTDOWN_TIMEOUT};
pub use startup::{Lifecycle, RunSummary};
