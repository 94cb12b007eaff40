use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn opposite(self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderTimeInForce {
    Ioc,
    Gtc,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSpec {
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub limit_price: Decimal,
    pub tif: OrderTimeInForce,
    pub reduce_only: bool,
}

/// A single OHLCV bar, ordered ascending by `timestamp` (unix millis).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub symbol: String,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub timestamp: i64,
}

/// Directional trend derived from a fast/slow EMA pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EmaTrend {
    Bullish,
    Bearish,
    Neutral,
}

impl fmt::Display for EmaTrend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmaTrend::Bullish => write!(f, "bullish"),
            EmaTrend::Bearish => write!(f, "bearish"),
            EmaTrend::Neutral => write!(f, "neutral"),
        }
    }
}

/// The 0.2% separation band used to classify an EMA pair's trend (spec §3/§4.B).
pub const EMA_TREND_BAND: f64 = 0.002;

/// Classifies `fast`/`slow` into a trend per the EMA_TREND_BAND invariant.
/// Idempotent: re-classifying the classification's own implied ratio is a no-op.
pub fn classify_ema_trend(fast: f64, slow: f64) -> EmaTrend {
    if slow.abs() < f64::EPSILON {
        return EmaTrend::Neutral;
    }
    let divergence = (fast - slow).abs() / slow.abs();
    if divergence <= EMA_TREND_BAND {
        EmaTrend::Neutral
    } else if fast > slow {
        EmaTrend::Bullish
    } else {
        EmaTrend::Bearish
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmaPair {
    pub fast: Decimal,
    pub slow: Decimal,
}

/// Dense indicator record produced once per tick by the Indicator Engine (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IndicatorSet {
    pub rsi_7: f64,
    pub rsi_14: f64,
    pub rsi_21: f64,

    pub ema_5_13: Option<EmaPair>,
    pub ema_12_26: Option<EmaPair>,
    pub ema_20_50: Option<EmaPair>,

    pub macd_5_13_5: MacdValue,
    pub macd_12_26_9: MacdValue,

    pub bb_10_1_5: BollingerBands,
    pub bb_20_2: BollingerBands,

    pub atr_7: f64,
    pub atr_14: f64,

    pub sma_10: f64,
    pub sma_20: f64,
    pub sma_50: f64,

    pub volume_current: f64,
    pub volume_avg_20: f64,
    pub volume_avg_50: f64,
    pub volume_ratio: f64,
    pub volume_is_high: bool,

    pub last_close: f64,
}

impl IndicatorSet {
    /// EMA trend derived from the (12,26) pair — the canonical "dominant" trend
    /// referenced by the Strategy Synthesizer's counter-trend veto (spec §4.E).
    pub fn dominant_trend(&self) -> EmaTrend {
        use rust_decimal::prelude::ToPrimitive;
        match self.ema_12_26 {
            Some(pair) => classify_ema_trend(
                pair.fast.to_f64().unwrap_or(0.0),
                pair.slow.to_f64().unwrap_or(0.0),
            ),
            None => EmaTrend::Neutral,
        }
    }

    /// Invariant check: every numeric field must be finite (spec §3).
    pub fn all_finite(&self) -> bool {
        let scalars = [
            self.rsi_7,
            self.rsi_14,
            self.rsi_21,
            self.atr_7,
            self.atr_14,
            self.sma_10,
            self.sma_20,
            self.sma_50,
            self.volume_current,
            self.volume_avg_20,
            self.volume_avg_50,
            self.volume_ratio,
            self.last_close,
            self.macd_5_13_5.line,
            self.macd_5_13_5.signal,
            self.macd_5_13_5.histogram,
            self.macd_12_26_9.line,
            self.macd_12_26_9.signal,
            self.macd_12_26_9.histogram,
            self.bb_10_1_5.upper,
            self.bb_10_1_5.middle,
            self.bb_10_1_5.lower,
            self.bb_20_2.upper,
            self.bb_20_2.middle,
            self.bb_20_2.lower,
        ];
        scalars.iter().all(|v| v.is_finite())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct MacdValue {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

/// One level of an order book side.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Decimal,
    pub size: Decimal,
}

/// Raw L2 snapshot: bids descending by price, asks ascending by price (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub symbol: String,
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
    pub timestamp: i64,
}

impl OrderBookSnapshot {
    pub fn best_bid(&self) -> Option<BookLevel> {
        self.bids.first().copied()
    }

    pub fn best_ask(&self) -> Option<BookLevel> {
        self.asks.first().copied()
    }

    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(b), Some(a)) => Some((b.price + a.price) / Decimal::from(2)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Buy,
    Sell,
    Hold,
}

impl Decision {
    /// Swaps BUY/SELL, preserving HOLD — used by the contrarian switch (spec §4.E).
    pub fn invert(self) -> Self {
        match self {
            Decision::Buy => Decision::Sell,
            Decision::Sell => Decision::Buy,
            Decision::Hold => Decision::Hold,
        }
    }

    pub fn to_side(self) -> Option<OrderSide> {
        match self {
            Decision::Buy => Some(OrderSide::Buy),
            Decision::Sell => Some(OrderSide::Sell),
            Decision::Hold => None,
        }
    }
}

impl From<OrderSide> for Decision {
    fn from(side: OrderSide) -> Self {
        match side {
            OrderSide::Buy => Decision::Buy,
            OrderSide::Sell => Decision::Sell,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Buy => write!(f, "BUY"),
            Decision::Sell => write!(f, "SELL"),
            Decision::Hold => write!(f, "HOLD"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ema_trend_classification_matches_spec_ratios() {
        // fast/slow of 1.003, 1.000, 0.997 against slow=1.0
        assert_eq!(classify_ema_trend(1.003, 1.000), EmaTrend::Bullish);
        assert_eq!(classify_ema_trend(1.000, 1.000), EmaTrend::Neutral);
        assert_eq!(classify_ema_trend(0.997, 1.000), EmaTrend::Bearish);
    }

    #[test]
    fn ema_trend_classification_is_idempotent() {
        let t1 = classify_ema_trend(1.003, 1.000);
        // Re-running classification on the same inputs always yields the same verdict.
        let t2 = classify_ema_trend(1.003, 1.000);
        assert_eq!(t1, t2);
    }

    #[test]
    fn decision_invert_preserves_hold() {
        assert_eq!(Decision::Hold.invert(), Decision::Hold);
        assert_eq!(Decision::Buy.invert(), Decision::Sell);
        assert_eq!(Decision::Sell.invert(), Decision::Buy);
    }
}
