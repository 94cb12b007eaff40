use crate::domain::orderbook::OrderBookAnalysis;
use crate::domain::regime::ParameterOverlay;
use crate::domain::types::{Decision, EmaTrend, IndicatorSet};
use rust_decimal::Decimal;

/// Everything a strategy needs to produce a `Signal`, assembled once per
/// tick by the orchestrator (spec §4.E, §4.I step 4).
#[derive(Debug, Clone)]
pub struct SynthesisContext {
    pub symbol: String,
    pub current_price: Decimal,
    pub indicators: IndicatorSet,
    pub multi_tf: Option<IndicatorSet>,
    pub order_book: OrderBookAnalysis,
    pub dominant_trend: EmaTrend,
    pub has_open_position: bool,
    pub open_position_side: Option<crate::domain::types::OrderSide>,
    pub account_balance: Decimal,
    pub account_available: Decimal,
    pub recent_win_rate: f64,
    pub recent_trade_count: u32,
    pub contrarian: bool,
    pub overlay: ParameterOverlay,
}

impl SynthesisContext {
    /// Applies the counter-trend veto + trend-alignment bonus multiplier
    /// used by the ORDER_BOOK mode (spec §4.E item 1).
    pub fn trend_adjust(&self, decision: Decision, confidence: f64) -> (Decision, f64) {
        if decision == Decision::Hold {
            return (decision, confidence);
        }
        let aligned = match (decision, self.dominant_trend) {
            (Decision::Buy, EmaTrend::Bullish) | (Decision::Sell, EmaTrend::Bearish) => Some(true),
            (Decision::Buy, EmaTrend::Bearish) | (Decision::Sell, EmaTrend::Bullish) => Some(false),
            _ => None,
        };
        match aligned {
            Some(false) => (Decision::Hold, confidence),
            Some(true) => (decision, (confidence * 1.15).min(1.0)),
            None => {
                if confidence < 0.75 {
                    (Decision::Hold, confidence)
                } else {
                    (decision, (confidence * 1.05).min(1.0))
                }
            }
        }
    }

    /// Post-synthesis contrarian switch: swaps BUY/SELL, preserves HOLD
    /// (spec §4.E "Contrarian switch").
    pub fn apply_contrarian(&self, decision: Decision) -> Decision {
        if self.contrarian {
            decision.invert()
        } else {
            decision
        }
    }
}
