//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML, path from --config or CONFIG_PATH)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → Config (validated, immutable)
//!     → handed to the HTTP server and observability setup
//! ```
//!
//! # Design Decisions
//! - Config is loaded once before the server starts and never changes
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod duration;
pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::Config;
pub use schema::Environment;
pub use schema::HttpServerConfig;
pub use schema::ObservabilityConfig;
