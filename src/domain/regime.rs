use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Regime {
    TrendingUp,
    TrendingDown,
    Ranging,
    HighVolatility,
    LowVolatility,
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Regime::TrendingUp => write!(f, "TRENDING_UP"),
            Regime::TrendingDown => write!(f, "TRENDING_DOWN"),
            Regime::Ranging => write!(f, "RANGING"),
            Regime::HighVolatility => write!(f, "HIGH_VOLATILITY"),
            Regime::LowVolatility => write!(f, "LOW_VOLATILITY"),
        }
    }
}

/// Multiplicative/overriding overlay applied on top of static defaults
/// once a regime is classified (spec §4.D).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ParameterOverlay {
    pub strong_imbalance_threshold: f64,
    pub weak_imbalance_threshold: f64,
    pub max_spread_pct: f64,
    pub min_liquidity_score: f64,
    pub pressure_threshold: f64,
    pub min_trade_confidence: f64,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub position_size_multiplier: f64,
}

impl ParameterOverlay {
    pub fn static_default() -> Self {
        Self {
            strong_imbalance_threshold: 0.35,
            weak_imbalance_threshold: 0.12,
            max_spread_pct: 0.15,
            min_liquidity_score: 30.0,
            pressure_threshold: 0.6,
            min_trade_confidence: 0.70,
            stop_loss_pct: 1.0,
            take_profit_pct: 2.0,
            position_size_multiplier: 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RegimeSnapshot {
    pub regime: Regime,
    pub volatility: f64,
    pub trend_strength: f64,
    pub overlay: ParameterOverlay,
    pub updated_at_millis: i64,
}

/// Thresholds driving the ordered regime decision table (spec §4.D).
#[derive(Debug, Clone, Copy)]
pub struct RegimeThresholds {
    pub high_volatility: f64,
    pub low_volatility: f64,
    pub trend_strength: f64,
}

impl Default for RegimeThresholds {
    fn default() -> Self {
        Self {
            high_volatility: 0.08,
            low_volatility: 0.015,
            trend_strength: 0.35,
        }
    }
}

const CACHE_EXPIRY_MILLIS: i64 = 60_000;
const MAX_HISTORY: usize = 100;

/// Per-symbol volatility/trend tracker driving regime classification and
/// the parameter overlay (spec §4.D), generalized from the teacher's
/// `MarketRegimeDetector` (single trending/ranging/volatile classifier) to the
/// spec's 5-way regime table plus a 60s-cached overlay.
pub struct RegimeEngine {
    thresholds: RegimeThresholds,
    price_history: Vec<f64>,
    cached: Option<RegimeSnapshot>,
}

impl RegimeEngine {
    pub fn new(thresholds: RegimeThresholds) -> Self {
        Self {
            thresholds,
            price_history: Vec::with_capacity(MAX_HISTORY),
            cached: None,
        }
    }

    pub fn push_price(&mut self, price: f64) {
        self.price_history.push(price);
        if self.price_history.len() > MAX_HISTORY {
            self.price_history.remove(0);
        }
    }

    /// Returns the cached overlay unless it has expired or `force` is set
    /// (the `forceUpdate` caller contract from spec §4.D).
    pub fn overlay(&mut self, now_millis: i64, force: bool) -> RegimeSnapshot {
        let expired = self
            .cached
            .map(|s| now_millis - s.updated_at_millis > CACHE_EXPIRY_MILLIS)
            .unwrap_or(true);
        if !force && !expired {
            return self.cached.expect("checked above");
        }
        let snapshot = self.classify(now_millis);
        self.cached = Some(snapshot);
        snapshot
    }

    fn classify(&self, now_millis: i64) -> RegimeSnapshot {
        if self.price_history.len() < 3 {
            return RegimeSnapshot {
                regime: Regime::Ranging,
                volatility: 0.0,
                trend_strength: 0.0,
                overlay: ParameterOverlay::static_default(),
                updated_at_millis: now_millis,
            };
        }

        let volatility = Self::log_return_volatility(&self.price_history);
        let trend_strength = Self::normalized_trend_strength(&self.price_history);

        // Ordered decision table, first match wins (spec §4.D).
        let regime = if volatility > self.thresholds.high_volatility {
            Regime::HighVolatility
        } else if volatility < self.thresholds.low_volatility {
            Regime::LowVolatility
        } else if trend_strength > self.thresholds.trend_strength {
            Regime::TrendingUp
        } else if trend_strength < -self.thresholds.trend_strength {
            Regime::TrendingDown
        } else {
            Regime::Ranging
        };

        RegimeSnapshot {
            regime,
            volatility,
            trend_strength,
            overlay: Self::overlay_for(regime),
            updated_at_millis: now_millis,
        }
    }

    fn overlay_for(regime: Regime) -> ParameterOverlay {
        let base = ParameterOverlay::static_default();
        match regime {
            Regime::HighVolatility => ParameterOverlay {
                strong_imbalance_threshold: base.strong_imbalance_threshold * 1.3,
                weak_imbalance_threshold: base.weak_imbalance_threshold * 1.3,
                max_spread_pct: base.max_spread_pct * 1.5,
                min_liquidity_score: base.min_liquidity_score * 1.2,
                min_trade_confidence: (base.min_trade_confidence + 0.1).min(0.95),
                stop_loss_pct: base.stop_loss_pct * 1.5,
                take_profit_pct: base.take_profit_pct * 1.5,
                position_size_multiplier: base.position_size_multiplier * 0.6,
                ..base
            },
            Regime::LowVolatility => ParameterOverlay {
                strong_imbalance_threshold: base.strong_imbalance_threshold * 0.8,
                weak_imbalance_threshold: base.weak_imbalance_threshold * 0.8,
                max_spread_pct: base.max_spread_pct * 0.7,
                stop_loss_pct: base.stop_loss_pct * 0.7,
                take_profit_pct: base.take_profit_pct * 0.7,
                position_size_multiplier: base.position_size_multiplier * 1.1,
                ..base
            },
            Regime::TrendingUp | Regime::TrendingDown => ParameterOverlay {
                min_trade_confidence: (base.min_trade_confidence - 0.05).max(0.5),
                take_profit_pct: base.take_profit_pct * 1.25,
                position_size_multiplier: base.position_size_multiplier * 1.15,
                ..base
            },
            Regime::Ranging => base,
        }
    }

    fn log_return_volatility(prices: &[f64]) -> f64 {
        if prices.len() < 2 {
            return 0.0;
        }
        let returns: Vec<f64> = prices
            .windows(2)
            .filter(|w| w[0] > 0.0 && w[1] > 0.0)
            .map(|w| (w[1] / w[0]).ln())
            .collect();
        if returns.len() < 2 {
            return 0.0;
        }
        let mean = returns.iter().sum::<f64>() / returns.len() as f64;
        let variance =
            returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / returns.len() as f64;
        variance.sqrt() * 60f64.sqrt()
    }

    fn normalized_trend_strength(prices: &[f64]) -> f64 {
        let n = prices.len();
        if n < 2 {
            return 0.0;
        }
        let x_sum: f64 = (0..n).map(|i| i as f64).sum();
        let y_sum: f64 = prices.iter().sum();
        let xy_sum: f64 = prices.iter().enumerate().map(|(i, &p)| i as f64 * p).sum();
        let x2_sum: f64 = (0..n).map(|i| (i * i) as f64).sum();
        let denom = n as f64 * x2_sum - x_sum * x_sum;
        if denom.abs() < f64::EPSILON {
            return 0.0;
        }
        let slope = (n as f64 * xy_sum - x_sum * y_sum) / denom;
        let mean_price = y_sum / n as f64;
        if mean_price.abs() < f64::EPSILON {
            return 0.0;
        }
        ((slope * n as f64) / mean_price).clamp(-1.0, 1.0)
    }
}

/// Bounded price-history state persisted per symbol (spec §3 "Regime State").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeState {
    pub symbol: String,
    pub price_history: Vec<Decimal>,
    pub volatility: f64,
    pub trend_strength: f64,
    pub regime: Regime,
    pub last_update_millis: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn falls_back_to_ranging_with_insufficient_history() {
        let mut engine = RegimeEngine::new(RegimeThresholds::default());
        engine.push_price(100.0);
        let snap = engine.overlay(0, true);
        assert_eq!(snap.regime, Regime::Ranging);
    }

    #[test]
    fn detects_strong_uptrend() {
        let mut engine = RegimeEngine::new(RegimeThresholds::default());
        for i in 0..30 {
            engine.push_price(100.0 + i as f64 * 2.0);
        }
        let snap = engine.overlay(0, true);
        assert!(matches!(
            snap.regime,
            Regime::TrendingUp | Regime::HighVolatility
        ));
    }

    #[test]
    fn cache_expires_after_60_seconds() {
        let mut engine = RegimeEngine::new(RegimeThresholds::default());
        for i in 0..10 {
            engine.push_price(100.0 + i as f64);
        }
        let first = engine.overlay(0, true);
        let cached = engine.overlay(1_000, false);
        assert_eq!(first.updated_at_millis, cached.updated_at_millis);
        let refreshed = engine.overlay(61_000, false);
        assert_eq!(refreshed.updated_at_millis, 61_000);
    }
}
