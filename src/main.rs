use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;

use graceful_server::config::load_config;
use graceful_server::http::{health, middleware, HttpServer};
use graceful_server::lifecycle::{Lifecycle, SignalSource};
use graceful_server::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "graceful-server")]
#[command(about = "HTTP service with graceful shutdown", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, env = "CONFIG_PATH")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    logging::init(config.env);

    tracing::info!(
        env = %config.env,
        version = env!("CARGO_PKG_VERSION"),
        "starting graceful-server"
    );
    tracing::debug!("debug messages are enabled");

    if let Some(addr) = &config.observability.metrics_address {
        // Validated at load time.
        if let Ok(addr) = addr.parse() {
            metrics::init_metrics(addr);
        }
    }

    let parent = CancellationToken::new();
    let _cancel_on_exit = parent.clone().drop_guard();

    let app = middleware::apply(health::routes());

    tracing::info!(address = %config.http_server.address, "starting http server");
    let server = Arc::new(HttpServer::new(config.http_server.clone(), app));

    let (trigger, signals) = SignalSource::os()?;
    let summary = Lifecycle::new(server, trigger, signals).run(parent).await;

    Ok(if summary.is_clean() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
