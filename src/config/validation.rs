//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, connection limit > 0)
//! - Check addresses are usable before the listener is bound
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: Config → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use crate::config::schema::Config;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("http_server.address must not be empty")]
    EmptyAddress,

    #[error("http_server.address '{0}' must be in host:port form")]
    MissingPort(String),

    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    #[error("http_server.max_connections must be greater than zero")]
    ZeroConnections,

    #[error("observability.metrics_address '{0}' is not a socket address")]
    InvalidMetricsAddress(String),
}

/// Validate a parsed configuration, collecting every problem.
pub fn validate_config(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let http = &config.http_server;

    let address = http.address.trim();
    if address.is_empty() {
        errors.push(ValidationError::EmptyAddress);
    } else if !has_port(address) {
        errors.push(ValidationError::MissingPort(http.address.clone()));
    }

    if http.timeout.is_zero() {
        errors.push(ValidationError::ZeroDuration("http_server.timeout"));
    }
    if http.idle_timeout.is_zero() {
        errors.push(ValidationError::ZeroDuration("http_server.idle_timeout"));
    }
    if http.max_connections == 0 {
        errors.push(ValidationError::ZeroConnections);
    }

    if let Some(metrics) = &config.observability.metrics_address {
        if metrics.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidMetricsAddress(metrics.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// `host:port`, `:port` and `[v6]:port` are accepted; the port must be numeric.
fn has_port(address: &str) -> bool {
    match address.rsplit_once(':') {
        Some((host, port)) => {
            !port.is_empty()
                && port.parse::<u16>().is_ok()
                && (!host.contains(':') || host.starts_with('['))
        }
        None => false,
    }
}
