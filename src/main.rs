//! Movies API server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ───────────────▶ request id ─▶ trace ─▶ timeout ─▶ rate limit ─▶ handlers
//!                                                          │
//!                                                          ├─ 429 {"detail": "Too Many Requests"}
//!                                                          └─ 500 {"detail": "Internal Server Error"} on panic
//!
//!     Background: idle sweeper evicts empty admission windows
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use movies_api::config::{load_config, validate_config, AppConfig, ConfigError};
use movies_api::lifecycle::{wait_for_signal, Shutdown};
use movies_api::observability::{init_logging, metrics};
use movies_api::HttpServer;

#[derive(Parser, Debug)]
#[command(name = "movies-api")]
#[command(about = "Movies API with per-client rate limiting")]
struct Args {
    /// Path to a TOML configuration file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override listener.bind_address.
    #[arg(short, long)]
    bind: Option<String>,
}

fn resolve_config(args: &Args) -> Result<AppConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => AppConfig::default(),
    };
    if let Some(bind) = &args.bind {
        config.listener.bind_address = bind.clone();
    }
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = resolve_config(&args)?;

    init_logging(&config.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?args.config,
        "movies-api starting"
    );
    tracing::info!(
        bind_address = %config.listener.bind_address,
        environment = %config.app.environment,
        rate_limit_enabled = config.rate_limit.enabled,
        max_calls = config.rate_limit.max_calls,
        period_secs = config.rate_limit.period_secs,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        // Validation already checked that the address parses.
        if let Ok(addr) = config.observability.metrics_address.parse() {
            metrics::init_metrics(addr);
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let server = HttpServer::new(config)?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        wait_for_signal().await;
        shutdown.trigger();
    });

    server.run(listener, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
