use super::pipeline::{FilterContext, FilterOutcome};
use super::Filter;
use chrono::{Datelike, Timelike, Weekday};

/// Session-based size multiplier; never vetoes (spec §4.F table).
#[derive(Default)]
pub struct SessionFilter;

impl Filter for SessionFilter {
    fn name(&self) -> &str {
        "session"
    }

    fn apply(&self, ctx: &FilterContext) -> FilterOutcome {
        let hour = ctx.now.hour();
        let base = match hour {
            0..=6 => 0.4,   // LateNight UTC
            7..=12 => 0.6,  // Asia
            13..=20 => 1.4, // NY
            _ => 1.0,       // London
        };
        let weekend = matches!(ctx.now.weekday(), Weekday::Sat | Weekday::Sun);
        let multiplier = if weekend { base * 0.5 } else { base };
        FilterOutcome::pass().with_multiplier(multiplier)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::Decision;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn ctx_at(now: chrono::DateTime<chrono::Utc>) -> FilterContext {
        FilterContext {
            decision: Decision::Buy,
            confidence: 0.8,
            current_price: dec!(100),
            atr_pct: 0.02,
            volume_ratio: 1.0,
            trend_strength: 0.2,
            consecutive_losses: 0,
            now,
            seconds_since_last_trade: 10_000,
            daily_trade_count: 0,
            stability_satisfied: true,
            reversal_allowed: true,
        }
    }

    #[test]
    fn never_vetoes() {
        let now = chrono::Utc.with_ymd_and_hms(2026, 1, 5, 14, 0, 0).unwrap();
        assert!(SessionFilter.apply(&ctx_at(now)).pass);
    }

    #[test]
    fn weekend_halves_multiplier() {
        let weekday = chrono::Utc.with_ymd_and_hms(2026, 1, 5, 14, 0, 0).unwrap(); // Monday
        let weekend = chrono::Utc.with_ymd_and_hms(2026, 1, 3, 14, 0, 0).unwrap(); // Saturday
        let weekday_mult = SessionFilter.apply(&ctx_at(weekday)).size_multiplier;
        let weekend_mult = SessionFilter.apply(&ctx_at(weekend)).size_multiplier;
        assert!((weekend_mult - weekday_mult * 0.5).abs() < 1e-9);
    }
}
