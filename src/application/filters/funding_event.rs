use super::pipeline::{FilterContext, FilterOutcome};
use super::Filter;
use chrono::Timelike;

const FUNDING_INTERVAL_SECONDS: i64 = 8 * 3600;
const BEFORE_WINDOW_SECONDS: i64 = 10 * 60;
const AFTER_WINDOW_SECONDS: i64 = 5 * 60;

/// Vetoes trades within ±10/5 minutes of an exchange funding settlement,
/// which recurs every 8 hours (spec §4.F table).
#[derive(Default)]
pub struct FundingEventFilter;

impl Filter for FundingEventFilter {
    fn name(&self) -> &str {
        "funding_event"
    }

    fn apply(&self, ctx: &FilterContext) -> FilterOutcome {
        let seconds_into_day =
            (ctx.now.hour() * 3600 + ctx.now.minute() * 60 + ctx.now.second()) as i64;
        let since_last_settlement = seconds_into_day % FUNDING_INTERVAL_SECONDS;
        let until_next_settlement = FUNDING_INTERVAL_SECONDS - since_last_settlement;

        if since_last_settlement <= AFTER_WINDOW_SECONDS
            || until_next_settlement <= BEFORE_WINDOW_SECONDS
        {
            return FilterOutcome::veto("within funding settlement window");
        }
        FilterOutcome::pass()
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
    fn vetoes_near_settlement() {
        let now = chrono::Utc.with_ymd_and_hms(2026, 1, 5, 7, 57, 0).unwrap();
        assert!(!FundingEventFilter.apply(&ctx_at(now)).pass);
    }

    #[test]
    fn passes_mid_window() {
        let now = chrono::Utc.with_ymd_and_hms(2026, 1, 5, 4, 0, 0).unwrap();
        assert!(FundingEventFilter.apply(&ctx_at(now)).pass);
    }
}
