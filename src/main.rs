//! Perpetual futures trading agent — full run: trade loop plus the operator
//! dashboard HTTP/WebSocket surface (spec §6). See `src/bin/server.rs` for
//! the headless, push-metrics-only variant.

use anyhow::Result;
use perpetual_agent::application::system::Runtime;
use perpetual_agent::config::Config;
use perpetual_agent::infrastructure::dashboard::{self, AppState};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn, Level};
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    info!("perpetual-agent {} starting", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    if config.enable_live_trading {
        warn!("LIVE TRADING ENABLED — orders will be sent to the real exchange");
    }
    info!(symbols = ?config.symbols, mode = ?config.strategy_mode, dry_run = config.dry_run, "configuration loaded");

    let runtime = Runtime::build(config).await?;
    let state = Arc::new(AppState {
        orchestrator: Arc::clone(&runtime.orchestrator),
        pool: runtime.pool.clone(),
        starting_balance: runtime.config.starting_balance,
        backtest: Arc::clone(&runtime.backtest),
    });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let trade_loop = {
        let orchestrator = Arc::clone(&runtime.orchestrator);
        let shutdown_rx = shutdown_rx.clone();
        tokio::spawn(async move { orchestrator.run(shutdown_rx).await })
    };

    let web_port = runtime.config.web_port;
    let dashboard_server = tokio::spawn(async move { dashboard::serve(state, web_port, shutdown_rx).await });

    info!("agent running, press Ctrl+C to shut down");
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);

    let _ = trade_loop.await;
    if let Err(err) = dashboard_server.await? {
        warn!(%err, "dashboard server exited with an error");
    }

    info!("shutdown complete");
    Ok(())
}
