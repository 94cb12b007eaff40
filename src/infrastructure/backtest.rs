use crate::domain::errors::BacktestError;
use crate::domain::ports::{BacktestHandle, BacktestRequest, BacktestRunner};
use async_trait::async_trait;

/// Stub `BacktestRunner` (spec §1, §6): the spec treats a production
/// historical-replay engine as out of scope and only requires the trait plus
/// a stand-in. Always reports unconfigured so the operator HTTP surface has
/// a real collaborator to call against `/api/backtest/run` and
/// `/api/backtest/stop` without pretending to replay anything.
#[derive(Default)]
pub struct NullBacktestRunner;

impl NullBacktestRunner {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BacktestRunner for NullBacktestRunner {
    async fn start(&self, _request: BacktestRequest) -> Result<BacktestHandle, BacktestError> {
        Err(BacktestError::NotConfigured)
    }

    async fn stop(&self, _run_id: &str) -> Result<(), BacktestError> {
        Err(BacktestError::NotConfigured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn start_reports_not_configured() {
        let runner = NullBacktestRunner::new();
        let request = BacktestRequest {
            symbol: "BTC-PERP".into(),
            interval: "1m".into(),
            from: chrono::Utc::now(),
            to: chrono::Utc::now(),
        };
        assert!(matches!(runner.start(request).await, Err(BacktestError::NotConfigured)));
    }

    #[tokio::test]
    async fn stop_reports_not_configured() {
        let runner = NullBacktestRunner::new();
        assert!(matches!(runner.stop("run-1").await, Err(BacktestError::NotConfigured)));
    }
}
