use super::pipeline::{FilterContext, FilterOutcome};
use super::Filter;

/// Loss-scaled cooldown window, global min-interval between trades, and
/// daily trade cap (spec §4.F table). Raises the confidence floor once any
/// loss has occurred, reflecting the higher bar required to re-enter soon
/// after a loss.
pub struct CooldownFilter {
    pub min_interval_seconds: i64,
    pub daily_trade_cap: u32,
}

impl Default for CooldownFilter {
    fn default() -> Self {
        Self {
            min_interval_seconds: 180,
            daily_trade_cap: 15,
        }
    }
}

impl CooldownFilter {
    fn cooldown_window_seconds(consecutive_losses: u32) -> i64 {
        match consecutive_losses {
            0 => 0,
            1 => 5 * 60,
            2 => 10 * 60,
            _ => 30 * 60,
        }
    }
}

impl Filter for CooldownFilter {
    fn name(&self) -> &str {
        "cooldown"
    }

    fn apply(&self, ctx: &FilterContext) -> FilterOutcome {
        let confidence_floor = if ctx.consecutive_losses == 0 { 0.70 } else { 0.90 };

        if ctx.daily_trade_count >= self.daily_trade_cap {
            return FilterOutcome::veto(format!(
                "daily trade cap {} reached",
                self.daily_trade_cap
            ))
            .with_confidence_floor(confidence_floor);
        }

        if ctx.seconds_since_last_trade < self.min_interval_seconds {
            return FilterOutcome::veto(format!(
                "within global min-interval ({} s)",
                self.min_interval_seconds
            ))
            .with_confidence_floor(confidence_floor);
        }

        let window = Self::cooldown_window_seconds(ctx.consecutive_losses);
        if window > 0 && ctx.seconds_since_last_trade < window {
            return FilterOutcome::veto(format!(
                "within post-loss cooldown window ({} s after {} consecutive losses)",
                window, ctx.consecutive_losses
            ))
            .with_confidence_floor(confidence_floor);
        }

        FilterOutcome::pass().with_confidence_floor(confidence_floor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::Decision;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn ctx(consecutive_losses: u32, seconds_since_last_trade: i64, daily_trade_count: u32) -> FilterContext {
        FilterContext {
            decision: Decision::Buy,
            confidence: 0.8,
            current_price: dec!(100),
            atr_pct: 0.02,
            volume_ratio: 1.0,
            trend_strength: 0.2,
            consecutive_losses,
            now: Utc::now(),
            seconds_since_last_trade,
            daily_trade_count,
            stability_satisfied: true,
            reversal_allowed: true,
        }
    }

    #[test]
    fn vetoes_within_post_loss_window() {
        let filter = CooldownFilter::default();
        assert!(!filter.apply(&ctx(2, 5 * 60, 0)).pass);
    }

    #[test]
    fn vetoes_daily_cap_reached() {
        let filter = CooldownFilter::default();
        assert!(!filter.apply(&ctx(0, 10_000, 15)).pass);
    }

    #[test]
    fn passes_clear_of_all_windows() {
        let filter = CooldownFilter::default();
        let outcome = filter.apply(&ctx(0, 10_000, 1));
        assert!(outcome.pass);
        assert_eq!(outcome.confidence_floor, 0.70);
    }
}
