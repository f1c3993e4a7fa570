//! Admission gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ request ID → trace span → timeout
//!                         │
//!                         ▼
//!                  ┌──────────────┐   jail / window / failures   ┌───────────────┐
//!                  │  admission   │ ◀──────────────────────────▶ │ counter store │
//!                  └──────┬───────┘                              │ memory/redis  │
//!                         ▼                                      └───────────────┘
//!                  ┌──────────────┐
//!                  │    retry     │  replays the inner chain on 5xx
//!                  └──────┬───────┘
//!                         ▼
//!                  ┌──────────────┐
//!                  │     auth     │  protected routes only
//!                  └──────┬───────┘
//!                         ▼
//!                      handler
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use admission_gateway::config::{load_config, GatewayConfig};
use admission_gateway::http::HttpServer;
use admission_gateway::lifecycle::{signals, startup, Shutdown};
use admission_gateway::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "admission-gateway", version, about)]
struct Args {
    /// Path to a TOML config file. Defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => GatewayConfig::default(),
    };

    logging::init_logging(&config.observability);

    tracing::info!("admission-gateway v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        capacity = config.admission.capacity,
        window_secs = config.admission.window_secs,
        max_retries = config.retry.max_retries,
        store = ?config.store.backend,
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

    let shutdown = Shutdown::new();
    let components = startup::build_components(&config, &shutdown).await?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    tokio::spawn(signals::shutdown_on_signal(shutdown.clone()));

    let server = HttpServer::new(config, components.store, components.verifier);
    server.run(listener, shutdown).await?;

    if let Some(sweeper) = components.sweeper {
        let _ = sweeper.await;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
