//! Waitlist intake service.
//!
//! # Architecture Overview
//!
//! ```text
//!                  ┌────────────────────────────────────────────────────────────┐
//!                  │                     WAITLIST SERVICE                       │
//!                  │                                                            │
//!  POST            │  ┌──────────┐   ┌──────────────┐   ┌──────────┐            │
//!  /api/waitlist ──┼─▶│  intake  │──▶│ rate limiter │──▶│ envelope │──┐         │
//!                  │  │ validate │   │  ip + email  │   │  codec   │  │         │
//!                  │  └──────────┘   └──────┬───────┘   └──────────┘  ▼         │
//!                  │                        │                  ┌──────────────┐  │
//!                  │                        ▼                  │ object store │  │
//!                  │                 ┌──────────────┐          │  signups/…   │  │
//!                  │                 │counter store │          └──────▲───────┘  │
//!                  │                 └──────────────┘                 │          │
//!  GET             │  ┌──────────┐   ┌──────────────┐   ┌─────────────┴──────┐   │
//!  /api/admin/* ───┼─▶│ auth gate│──▶│   dispatch   │──▶│ retrieval (fan-out │   │
//!                  │  │ + audit  │   │    table     │   │  fetch + decode)   │   │
//!                  │  └──────────┘   └──────────────┘   └────────────────────┘   │
//!                  └────────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use waitlist_intake::config::loader::{load_config, load_from_env};
use waitlist_intake::lifecycle::{build_state, signals, Shutdown};
use waitlist_intake::observability::{logging, metrics};
use waitlist_intake::HttpServer;

#[derive(Parser)]
#[command(name = "waitlist-intake", version, about = "Waitlist signup intake service")]
struct Args {
    /// Path to a TOML config file. Defaults plus WAITLIST_* env vars when omitted.
    #[arg(short, long, env = "WAITLIST_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => load_from_env()?,
    };

    logging::init_logging(&config.observability);
    tracing::info!("waitlist-intake v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        storage = config.storage.backend.as_str(),
        rate_limit_enabled = config.rate_limit.enabled,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let state = build_state(config).await?;
    let server = HttpServer::new(state);

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let server_task = tokio::spawn(server.run(listener, server_shutdown));

    signals::shutdown_on_signal(&shutdown).await;
    server_task.await??;

    tracing::info!("Shutdown complete");
    Ok(())
}
