//! Resilience patterns.
//!
//! # Data Flow
//! ```text
//! Accept failure (transient)
//!     → backoff.rs (exponential delay with jitter)
//!     → retry accept
//! ```
//!
//! # Design Decisions
//! - Jitter avoids synchronized retries across processes
//! - Delays are capped so recovery is noticed quickly

pub mod backoff;
