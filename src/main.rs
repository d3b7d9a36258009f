//! Donation Gateway
//!
//! A production token-donation service built with Tokio and Axum.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────┐
//!                    │                 DONATION GATEWAY                  │
//!                    │                                                   │
//!   SPA / CLI        │  ┌─────────┐   ┌──────────┐   ┌──────────────┐   │
//!   ─────────────────┼─▶│  http   │──▶│ donation │──▶│    chain     │───┼──▶ RPC node
//!                    │  │ server  │   │ service  │   │ gateway+pipe │   │
//!                    │  └─────────┘   └──────────┘   └──────────────┘   │
//!                    │       │             │                ▲           │
//!                    │       ▼             ▼                │           │
//!                    │  ┌─────────┐   ┌──────────┐   ┌──────────────┐   │
//!                    │  │ ranking │◀──│  cache   │◀──│  resilience  │   │
//!                    │  │ scanner │   │ snapshot │   │ retry/timeout│   │
//!                    │  └─────────┘   └──────────┘   └──────────────┘   │
//!                    │                                                   │
//!                    │  ┌────────────────────────────────────────────┐   │
//!                    │  │           Cross-Cutting Concerns           │   │
//!                    │  │  config reload │ observability │ lifecycle │   │
//!                    │  └────────────────────────────────────────────┘   │
//!                    └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;

use donation_gateway::chain::wallet::KeypairSigner;
use donation_gateway::config::loader::load_config;
use donation_gateway::config::watcher::ConfigWatcher;
use donation_gateway::http::HttpServer;
use donation_gateway::lifecycle::Shutdown;
use donation_gateway::observability::{logging, metrics};
use donation_gateway::ranking::refresher::LeaderboardRefresher;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("gateway.toml"));

    let config = match load_config(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {}: {}", config_path.display(), e);
            std::process::exit(1);
        }
    };

    logging::init_logging(&config.observability);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %config_path.display(),
        "donation-gateway starting"
    );

    tracing::info!(
        bind_address = %config.listener.bind_address,
        rpc_url = %config.chain.rpc_url,
        donation_address = %config.donation.donation_address,
        goal = config.donation.goal,
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

    let signer = match KeypairSigner::from_env_or_file(config.chain.keypair_path.as_deref()) {
        Ok(signer) => Arc::new(signer),
        Err(e) => {
            tracing::error!(error = %e, "Failed to load gateway wallet");
            std::process::exit(1);
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();

    let (watcher, config_updates) = ConfigWatcher::new(&config_path);
    let _watcher_handle = match watcher.run() {
        Ok(handle) => Some(handle),
        Err(e) => {
            tracing::warn!(error = %e, "Config watcher disabled");
            None
        }
    };

    let server = HttpServer::new(config.clone(), signer)?;

    if config.leaderboard.background_refresh {
        let inner = server.state().inner.load_full();
        let refresher = LeaderboardRefresher::new(
            inner.cache.clone(),
            inner.scanner.clone(),
            config.leaderboard.refresh_interval_secs,
        );
        let refresher_shutdown = shutdown.subscribe();
        tokio::spawn(async move {
            refresher.run(refresher_shutdown).await;
        });
    }

    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            shutdown.trigger();
        }
    });

    server.run(listener, config_updates, server_shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
