use crate::domain::types::{Decision, IndicatorSet};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Immutable audit row appended to the persistent journal on every tick,
/// executed or not (spec §3, §4.I invariant "exactly one persisted record").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeDecisionRecord {
    pub timestamp: i64,
    pub symbol: String,
    pub decision: Decision,
    pub confidence: f64,
    pub reasoning: String,
    pub price: Decimal,
    pub indicators: IndicatorSet,
    pub executed: bool,
    pub order_id: Option<String>,
    pub error: Option<String>,
}

impl TradeDecisionRecord {
    pub fn hold(
        symbol: impl Into<String>,
        timestamp: i64,
        price: Decimal,
        indicators: IndicatorSet,
        reasoning: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            symbol: symbol.into(),
            decision: Decision::Hold,
            confidence: 0.0,
            reasoning: reasoning.into(),
            price,
            indicators,
            executed: false,
            order_id: None,
            error: None,
        }
    }

    pub fn executed(
        symbol: impl Into<String>,
        timestamp: i64,
        decision: Decision,
        confidence: f64,
        reasoning: impl Into<String>,
        price: Decimal,
        indicators: IndicatorSet,
        order_id: String,
    ) -> Self {
        Self {
            timestamp,
            symbol: symbol.into(),
            decision,
            confidence,
            reasoning: reasoning.into(),
            price,
            indicators,
            executed: true,
            order_id: Some(order_id),
            error: None,
        }
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}
