use super::pipeline::{FilterContext, FilterOutcome};
use super::Filter;

/// Requires the orchestrator's per-symbol `SignalHistory::stable_for` check
/// to have already passed (spec §4.F table, §4.I step 7). The check itself
/// needs mutable ring-buffer state the pure filter stack can't own, so it is
/// precomputed and threaded through `FilterContext::stability_satisfied`.
#[derive(Default)]
pub struct StabilityFilter;

impl Filter for StabilityFilter {
    fn name(&self) -> &str {
        "stability"
    }

    fn apply(&self, ctx: &FilterContext) -> FilterOutcome {
        if !ctx.stability_satisfied {
            return FilterOutcome::veto("signal not stable across required consecutive ticks");
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

    fn ctx(stability_satisfied: bool) -> FilterContext {
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
            stability_satisfied,
            reversal_allowed: true,
        }
    }

    #[test]
    fn vetoes_when_unstable() {
        assert!(!StabilityFilter.apply(&ctx(false)).pass);
    }

    #[test]
    fn passes_when_stable() {
        assert!(StabilityFilter.apply(&ctx(true)).pass);
    }
}
