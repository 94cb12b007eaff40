use super::Filter;
use crate::domain::types::Decision;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Everything the filter stack needs about the tentative decision and
/// surrounding state (spec §4.F).
#[derive(Debug, Clone)]
pub struct FilterContext {
    pub decision: Decision,
    pub confidence: f64,
    pub current_price: Decimal,
    pub atr_pct: f64,
    pub volume_ratio: f64,
    pub trend_strength: f64,
    pub consecutive_losses: u32,
    pub now: DateTime<Utc>,
    pub seconds_since_last_trade: i64,
    pub daily_trade_count: u32,
    pub stability_satisfied: bool,
    pub reversal_allowed: bool,
}

/// Result of a single filter's evaluation (spec §4.F table).
#[derive(Debug, Clone)]
pub struct FilterOutcome {
    pub pass: bool,
    pub reason: Option<String>,
    pub size_multiplier: f64,
    pub confidence_floor: f64,
}

impl FilterOutcome {
    pub fn pass() -> Self {
        Self {
            pass: true,
            reason: None,
            size_multiplier: 1.0,
            confidence_floor: 0.0,
        }
    }

    pub fn veto(reason: impl Into<String>) -> Self {
        Self {
            pass: false,
            reason: Some(reason.into()),
            size_multiplier: 1.0,
            confidence_floor: 0.0,
        }
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.size_multiplier = multiplier;
        self
    }

    pub fn with_confidence_floor(mut self, floor: f64) -> Self {
        self.confidence_floor = floor;
        self
    }
}

/// Composed result of running every filter in order (spec §4.F
/// "Filters compose"). `vetoed` is sticky: once any filter vetoes, the tick
/// is a HOLD regardless of what later filters would have said, but every
/// filter still runs so the full set of reasons and multipliers is logged.
#[derive(Debug, Clone)]
pub struct FilterReport {
    pub vetoed: bool,
    pub reasons: Vec<String>,
    pub size_multiplier: f64,
    pub confidence_floor: f64,
    pub per_filter: Vec<(String, FilterOutcome)>,
}

impl FilterReport {
    pub fn effective_confidence_floor(&self, mode_minimum: f64) -> f64 {
        self.confidence_floor.max(mode_minimum)
    }
}

/// Ordered composition of the filter stack (spec §4.F), generalizing the
/// teacher's `ValidationPipeline`.
pub struct FilterPipeline {
    filters: Vec<Box<dyn Filter>>,
}

impl FilterPipeline {
    /// Wired order (see `system::build_filter_pipeline`): signal stability,
    /// reversal cooldown, cooldown, funding event, volatility, volume
    /// anomaly, session, sizing. Composition commutes — veto/floor/
    /// multiplier results don't depend on filter order — so this is a
    /// documentation concern, not a correctness one.
    pub fn new(filters: Vec<Box<dyn Filter>>) -> Self {
        Self { filters }
    }

    pub fn run(&self, ctx: &FilterContext) -> FilterReport {
        let mut vetoed = false;
        let mut reasons = Vec::new();
        let mut size_multiplier = 1.0;
        let mut confidence_floor: f64 = 0.0;
        let mut per_filter = Vec::with_capacity(self.filters.len());

        for filter in &self.filters {
            let outcome = filter.apply(ctx);
            tracing::debug!(
                filter = filter.name(),
                pass = outcome.pass,
                size_multiplier = outcome.size_multiplier,
                confidence_floor = outcome.confidence_floor,
                "filter evaluated"
            );
            if !outcome.pass {
                vetoed = true;
                if let Some(reason) = &outcome.reason {
                    reasons.push(format!("{}: {}", filter.name(), reason));
                }
            }
            size_multiplier *= outcome.size_multiplier;
            confidence_floor = confidence_floor.max(outcome.confidence_floor);
            per_filter.push((filter.name().to_string(), outcome));
        }

        FilterReport {
            vetoed,
            reasons,
            size_multiplier,
            confidence_floor,
            per_filter,
        }
    }
}
