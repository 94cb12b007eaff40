use super::pipeline::{FilterContext, FilterOutcome};
use super::Filter;

/// Requires the orchestrator's per-symbol `ReversalTracker::can_reverse`
/// check to have already passed (spec §4.F table, property 5), precomputed
/// the same way as `StabilityFilter`.
#[derive(Default)]
pub struct ReversalCooldownFilter;

impl Filter for ReversalCooldownFilter {
    fn name(&self) -> &str {
        "reversal_cooldown"
    }

    fn apply(&self, ctx: &FilterContext) -> FilterOutcome {
        if !ctx.reversal_allowed {
            return FilterOutcome::veto("reversal cap reached for the trailing hour");
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

    fn ctx(reversal_allowed: bool) -> FilterContext {
        FilterContext {
            decision: Decision::Buy,
            confidence: 0.8,
            current_price: dec!(100),
            atr_pct: 0.02,
            volume_ratio: 1.0,
            trend_strength: 0.2,
            consecutive_losses: 0,
            now: Utc::now(),
            seconds_since_last_trade: 10_000,
            daily_trade_count: 0,
            stability_satisfied: true,
            reversal_allowed,
        }
    }

    #[test]
    fn vetoes_when_cap_reached() {
        assert!(!ReversalCooldownFilter.apply(&ctx(false)).pass);
    }

    #[test]
    fn passes_when_allowed() {
        assert!(ReversalCooldownFilter.apply(&ctx(true)).pass);
    }
}
