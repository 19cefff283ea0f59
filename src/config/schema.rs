//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from the TOML config file.
//! Durations are written in humantime notation (`4s`, `1m 30s`).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::duration;

/// Root configuration for the service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct Config {
    /// Deployment environment; selects log format and verbosity.
    pub env: Environment,

    /// HTTP listener settings.
    pub http_server: HttpServerConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Deployment environment tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Developer machine: human-readable logs, debug level.
    #[default]
    Local,
    /// Shared development stage: JSON logs, debug level.
    Dev,
    /// Production: JSON logs, info level.
    Prod,
}

impl Environment {
    /// Lowercase tag as written in the config file.
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Local => "local",
            Environment::Dev => "dev",
            Environment::Prod => "prod",
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpServerConfig {
    /// Bind address (e.g., "localhost:8082" or "0.0.0.0:8080").
    pub address: String,

    /// Read and write timeout applied to every request.
    #[serde(with = "duration")]
    pub timeout: Duration,

    /// How long a keep-alive connection may sit idle between requests.
    #[serde(with = "duration")]
    pub idle_timeout: Duration,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            address: "localhost:8082".to_string(),
            timeout: Duration::from_secs(4),
            idle_timeout: Duration::from_secs(60),
            max_connections: 10_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Prometheus scrape endpoint bind address. Disabled when unset.
    pub metrics_address: Option<String>,
}
