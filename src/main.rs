//! Token Arena Server - authoritative battle server driven by market data
//!
//! This is the main entry point. It handles:
//! - The arena task that owns the match and ticks it on a schedule
//! - WebSocket connections that stream battle events to viewers
//! - HTTP endpoints for health and match state

mod app;
mod config;
mod game;
mod http;
mod market;
mod util;
mod ws;

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::app::AppState;
use crate::config::Config;
use crate::http::build_router;
use crate::market::{MarketFeed, MockMarketFeed};
use crate::util::time::init_server_time;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    // Initialize server time tracking
    init_server_time();

    info!("Starting Token Arena Server");
    info!("Server address: {}", config.server_addr);
    info!(
        token_a = %config.tokens.a.symbol,
        token_b = %config.tokens.b.symbol,
        rounds_to_win = config.game.rounds_to_win,
        "Match configured"
    );

    if config.operator_jwt_secret.is_none() {
        warn!("OPERATOR_JWT_SECRET not set, admin commands are disabled");
    }

    let feed: Arc<dyn MarketFeed> = Arc::new(MockMarketFeed::new(&config.mock));
    info!(
        manual_mode = config.mock.manual_mode,
        volatility = config.mock.volatility,
        "Using simulated market feed"
    );

    // Create application state and spawn the arena
    let addr: SocketAddr = config.server_addr;
    let (state, arena) = AppState::new(config, feed);
    tokio::spawn(arena.run());

    // Build router
    let router = build_router(state);

    // Start server
    let listener = TcpListener::bind(addr).await?;

    info!("Server listening on {}", addr);
    info!("Health check: http://{}/health", addr);
    info!("WebSocket endpoint: ws://{}/ws", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
