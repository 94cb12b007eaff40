use crate::application::ledger::PositionLedger;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Push-based metrics reporter: periodically logs a JSON snapshot of ledger
/// state to stdout, grounded on the teacher's
/// `infrastructure::observability::reporter::MetricsReporter`. No HTTP
/// server, only outbound structured logs.
pub struct MetricsReporter {
    ledger: Arc<PositionLedger>,
    start_time: Instant,
    interval: Duration,
}

#[derive(Serialize)]
struct MetricsSnapshot {
    timestamp: String,
    uptime_seconds: u64,
    version: String,
    balance: f64,
    open_positions: usize,
}

impl MetricsReporter {
    pub fn new(ledger: Arc<PositionLedger>, interval_seconds: u64) -> Self {
        Self {
            ledger,
            start_time: Instant::now(),
            interval: Duration::from_secs(interval_seconds),
        }
    }

    pub async fn run(self) {
        info!(interval = ?self.interval, "starting push-based metrics reporter");
        loop {
            tokio::time::sleep(self.interval).await;
            let snapshot = self.collect_snapshot().await;
            match serde_json::to_string(&snapshot) {
                Ok(json) => {
                    println!("METRICS_JSON:{}", json);
                    info!(
                        balance = snapshot.balance,
                        open_positions = snapshot.open_positions,
                        uptime_seconds = snapshot.uptime_seconds,
                        "metrics snapshot"
                    );
                }
                Err(e) => warn!(error = %e, "failed to serialize metrics snapshot"),
            }
        }
    }

    async fn collect_snapshot(&self) -> MetricsSnapshot {
        let balance = self.ledger.current_balance().await;
        let open_positions = self.ledger.active_positions().await.len();
        MetricsSnapshot {
            timestamp: chrono::Utc::now().to_rfc3339(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            balance: balance.to_f64().unwrap_or(0.0),
            open_positions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn snapshot_reflects_ledger_state() {
        let ledger = Arc::new(PositionLedger::new(dec!(10_000), 5));
        let reporter = MetricsReporter::new(ledger, 60);
        let snapshot = reporter.collect_snapshot().await;
        assert_eq!(snapshot.balance, 10_000.0);
        assert_eq!(snapshot.open_positions, 0);
    }
}
