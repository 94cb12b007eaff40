use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MarketState {
    Consolidation,
    ImbalancedUp,
    ImbalancedDown,
    Balanced,
}

impl fmt::Display for MarketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketState::Consolidation => write!(f, "CONSOLIDATION"),
            MarketState::ImbalancedUp => write!(f, "IMBALANCED_UP"),
            MarketState::ImbalancedDown => write!(f, "IMBALANCED_DOWN"),
            MarketState::Balanced => write!(f, "BALANCED"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Wall {
    pub price: Decimal,
    pub size: Decimal,
    pub distance_pct: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LowVolumeNode {
    pub price: Decimal,
    pub distance_pct: f64,
}

/// Derived record produced by the Order-Book Analyzer (spec §3, §4.C).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBookAnalysis {
    pub symbol: String,
    pub imbalance_ratio: f64,
    pub spread_pct: f64,
    pub bid_pressure: f64,
    pub ask_pressure: f64,
    pub liquidity_score: f64,
    pub nearest_bid_wall: Option<Wall>,
    pub nearest_ask_wall: Option<Wall>,
    pub market_state: MarketState,
    pub aggression_score: f64,
    pub absorption_detected: bool,
    pub breakout_confirmed: bool,
    pub low_volume_node: Option<LowVolumeNode>,
}

impl OrderBookAnalysis {
    /// Invariant: bidPressure + askPressure == 1 (within floating tolerance).
    pub fn pressures_sum_to_one(&self) -> bool {
        (self.bid_pressure + self.ask_pressure - 1.0).abs() < 1e-9
    }
}
