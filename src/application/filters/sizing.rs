use super::pipeline::{FilterContext, FilterOutcome};
use super::Filter;

/// Dynamic position sizing: confidence bucket, trend-strength adjustment,
/// and consecutive-loss penalty (spec §4.F table). Never vetoes.
#[derive(Default)]
pub struct SizingFilter;

impl Filter for SizingFilter {
    fn name(&self) -> &str {
        "sizing"
    }

    fn apply(&self, ctx: &FilterContext) -> FilterOutcome {
        let confidence_bucket = if ctx.confidence >= 0.85 {
            1.0
        } else if ctx.confidence >= 0.75 {
            0.75
        } else if ctx.confidence >= 0.65 {
            0.50
        } else {
            0.25
        };

        let trend_adjustment = 1.0 + ctx.trend_strength.abs().clamp(0.0, 1.0) * 0.3;

        let loss_penalty = match ctx.consecutive_losses {
            0 | 1 => 1.0,
            2 => 0.75,
            _ => 0.50,
        };

        let multiplier = (confidence_bucket * trend_adjustment * loss_penalty).clamp(0.0, 1.0);
        FilterOutcome::pass().with_multiplier(multiplier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::Decision;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn ctx(confidence: f64, trend_strength: f64, consecutive_losses: u32) -> FilterContext {
        FilterContext {
            decision: Decision::Buy,
            confidence,
            current_price: dec!(100),
            atr_pct: 0.02,
            volume_ratio: 1.0,
            trend_strength,
            consecutive_losses,
            now: Utc::now(),
            seconds_since_last_trade: 10_000,
            daily_trade_count: 0,
            stability_satisfied: true,
            reversal_allowed: true,
        }
    }

    #[test]
    fn high_confidence_full_size() {
        let outcome = SizingFilter.apply(&ctx(0.9, 0.0, 0));
        assert_eq!(outcome.size_multiplier, 1.0);
    }

    #[test]
    fn low_confidence_quarter_size() {
        let outcome = SizingFilter.apply(&ctx(0.5, 0.0, 0));
        assert_eq!(outcome.size_multiplier, 0.25);
    }

    #[test]
    fn heavy_losing_streak_penalized() {
        let lossy = SizingFilter.apply(&ctx(0.9, 0.0, 3)).size_multiplier;
        let clean = SizingFilter.apply(&ctx(0.9, 0.0, 0)).size_multiplier;
        assert!(lossy < clean);
    }
}
