use crate::domain::regime::{RegimeEngine, RegimeSnapshot, RegimeThresholds};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Owns one `RegimeEngine` per symbol behind a single-writer lock, so the
/// orchestrator's per-symbol tasks can update and read regime state without
/// racing each other on the shared map (spec §5).
pub struct RegimeManager {
    thresholds: RegimeThresholds,
    engines: RwLock<HashMap<String, RegimeEngine>>,
}

impl RegimeManager {
    pub fn new(thresholds: RegimeThresholds) -> Self {
        Self {
            thresholds,
            engines: RwLock::new(HashMap::new()),
        }
    }

    /// Pushes the latest price and returns the (possibly cached) overlay
    /// snapshot for `symbol` (spec §4.D).
    pub async fn update(&self, symbol: &str, price: Decimal, now_millis: i64, force: bool) -> RegimeSnapshot {
        let mut engines = self.engines.write().await;
        let engine = engines
            .entry(symbol.to_string())
            .or_insert_with(|| RegimeEngine::new(self.thresholds));
        engine.push_price(price.to_f64().unwrap_or(0.0));
        engine.overlay(now_millis, force)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn tracks_independent_state_per_symbol() {
        let manager = RegimeManager::new(RegimeThresholds::default());
        for i in 0..10 {
            manager.update("BTC-PERP", dec!(100) + Decimal::from(i), 0, true).await;
        }
        let eth = manager.update("ETH-PERP", dec!(50), 0, true).await;
        assert_eq!(eth.regime, crate::domain::regime::Regime::Ranging);
    }
}
