//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global tracing subscriber
//! - Pick format and default level from the deployment environment
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - JSON format for dev/prod, pretty format for local development
//! - `RUST_LOG` overrides the environment's default level

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Environment;

/// Default filter directive for an environment when `RUST_LOG` is unset.
pub fn default_directive(env: Environment) -> &'static str {
    match env {
        Environment::Local | Environment::Dev => "graceful_server=debug,tower_http=debug,info",
        Environment::Prod => "info",
    }
}

/// Install the global subscriber. Must be called once, before anything logs.
pub fn init(env: Environment) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| default_directive(env).into());

    let registry = tracing_subscriber::registry().with(filter);

    match env {
        Environment::Local => registry.with(tracing_subscriber::fmt::layer().pretty()).init(),
        Environment::Dev | Environment::Prod => registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .init(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prod_is_quieter_than_dev() {
        assert_eq!(default_directive(Environment::Prod), "info");
        assert!(default_directive(Environment::Dev).contains("graceful_server=debug"));
        assert_eq!(
            default_directive(Environment::Local),
            default_directive(Environment::Dev)
        );
    }

    #[test]
    fn default_directives_parse() {
        for env in [Environment::Local, Environment::Dev, Environment::Prod] {
            assert!(EnvFilter::try_new(default_directive(env)).is_ok());
        }
    }
}
