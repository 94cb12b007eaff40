use super::pipeline::{FilterContext, FilterOutcome};
use super::Filter;

/// Vetoes when ATR% falls below a floor — too little movement to justify a
/// position (spec §4.F table). Side effect: logs a 0-100 trend-strength
/// score derived from the context's normalized trend strength.
pub struct VolatilityFilter {
    pub atr_pct_floor: f64,
}

impl Default for VolatilityFilter {
    fn default() -> Self {
        Self { atr_pct_floor: 0.00005 }
    }
}

impl Filter for VolatilityFilter {
    fn name(&self) -> &str {
        "volatility"
    }

    fn apply(&self, ctx: &FilterContext) -> FilterOutcome {
        let trend_strength_score = ((ctx.trend_strength.abs()) * 100.0).clamp(0.0, 100.0);
        tracing::trace!(trend_strength_score, "volatility filter trend strength");

        if ctx.atr_pct < self.atr_pct_floor {
            return FilterOutcome::veto(format!(
                "ATR% {:.6} below floor {:.6}",
                ctx.atr_pct, self.atr_pct_floor
            ));
        }
        FilterOutcome::pass()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::Decision;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn ctx(atr_pct: f64) -> FilterContext {
        FilterContext {
            decision: Decision::Buy,
            confidence: 0.8,
            current_price: dec!(100),
            atr_pct,
            volume_ratio: 1.0,
            trend_strength: 0.2,
            consecutive_losses: 0,
            now: Utc::now(),
            seconds_since_last_trade: 10_000,
            daily_trade_count: 0,
            stability_satisfied: true,
            reversal_allowed: true,
        }
    }

    #[test]
    fn vetoes_below_floor() {
        let filter = VolatilityFilter::default();
        assert!(!filter.apply(&ctx(0.00001)).pass);
    }

    #[test]
    fn passes_above_floor() {
        let filter = VolatilityFilter::default();
        assert!(filter.apply(&ctx(0.02)).pass);
    }
}
