//! Headless trading agent - no HTTP dashboard, no incoming connections.
//!
//! Metrics are pushed via structured JSON logs to stdout, suitable for
//! log-aggregator collection (Loki, Fluentd, CloudWatch Logs) instead of
//! scraping an HTTP endpoint.
//!
//! # Environment Variables
//! - `OBSERVABILITY_INTERVAL_SECONDS` - interval between metric snapshots (default: 60)
//!
//! Metrics are printed with the `METRICS_JSON:` prefix, one line per snapshot.

use anyhow::Result;
use perpetual_agent::application::system::Runtime;
use perpetual_agent::config::Config;
use perpetual_agent::infrastructure::observability::MetricsReporter;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn, Level};
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(tracing_subscriber::fmt::layer().with_target(false).pretty())
        .init();

    info!("perpetual-agent server {} starting (headless)", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;
    if config.enable_live_trading {
        warn!("LIVE TRADING ENABLED — orders will be sent to the real exchange");
    }

    let runtime = Runtime::build(config).await?;

    let interval_seconds = std::env::var("OBSERVABILITY_INTERVAL_SECONDS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(60);
    let reporter = MetricsReporter::new(runtime.orchestrator.ledger(), interval_seconds);
    tokio::spawn(async move { reporter.run().await });

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let orchestrator = Arc::clone(&runtime.orchestrator);
    let trade_loop = tokio::spawn(async move { orchestrator.run(shutdown_rx).await });

    info!("server running, press Ctrl+C to shut down");
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    let _ = shutdown_tx.send(true);
    let _ = trade_loop.await;

    info!("shutdown complete");
    Ok(())
}
