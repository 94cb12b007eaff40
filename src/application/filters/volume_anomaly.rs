use super::pipeline::{FilterContext, FilterOutcome};
use super::Filter;

/// Vetoes extreme volume spikes, halves size on strong spikes, and reduces
/// size on abnormally low volume (spec §4.F table).
pub struct VolumeAnomalyFilter {
    pub veto_ratio: f64,
    pub half_size_ratio: f64,
    pub low_volume_ratio: f64,
}

impl Default for VolumeAnomalyFilter {
    fn default() -> Self {
        Self {
            veto_ratio: 5.0,
            half_size_ratio: 3.0,
            low_volume_ratio: 0.5,
        }
    }
}

impl Filter for VolumeAnomalyFilter {
    fn name(&self) -> &str {
        "volume_anomaly"
    }

    fn apply(&self, ctx: &FilterContext) -> FilterOutcome {
        if ctx.volume_ratio >= self.veto_ratio {
            return FilterOutcome::veto(format!(
                "volume ratio {:.2} at/above veto threshold {:.2}",
                ctx.volume_ratio, self.veto_ratio
            ));
        }
        if ctx.volume_ratio >= self.half_size_ratio {
            return FilterOutcome::pass().with_multiplier(0.5);
        }
        if ctx.volume_ratio < self.low_volume_ratio {
            return FilterOutcome::pass().with_multiplier(0.75);
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

    fn ctx(volume_ratio: f64) -> FilterContext {
        FilterContext {
            decision: Decision::Buy,
            confidence: 0.8,
            current_price: dec!(100),
            atr_pct: 0.02,
            volume_ratio,
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
    fn vetoes_extreme_spike() {
        assert!(!VolumeAnomalyFilter::default().apply(&ctx(6.0)).pass);
    }

    #[test]
    fn halves_size_on_strong_spike() {
        let outcome = VolumeAnomalyFilter::default().apply(&ctx(3.5));
        assert!(outcome.pass);
        assert_eq!(outcome.size_multiplier, 0.5);
    }

    #[test]
    fn normal_volume_passes_full_size() {
        let outcome = VolumeAnomalyFilter::default().apply(&ctx(1.0));
        assert!(outcome.pass);
        assert_eq!(outcome.size_multiplier, 1.0);
    }
}
