mod cooldown;
mod funding_event;
mod pipeline;
mod reversal_cooldown;
mod session;
mod sizing;
mod stability;
mod volatility;
mod volume_anomaly;

pub use cooldown::CooldownFilter;
pub use funding_event::FundingEventFilter;
pub use pipeline::{FilterContext, FilterOutcome, FilterPipeline, FilterReport};
pub use reversal_cooldown::ReversalCooldownFilter;
pub use session::SessionFilter;
pub use sizing::SizingFilter;
pub use stability::StabilityFilter;
pub use volatility::VolatilityFilter;
pub use volume_anomaly::VolumeAnomalyFilter;

/// One stage in the ordered filter pipeline (spec §4.F), a generalization of
/// the teacher's `RiskValidator` trait that returns a size multiplier and
/// confidence floor instead of a binary approve/reject. Filters are CPU-bound
/// and must not suspend (spec §5).
pub trait Filter: Send + Sync {
    fn name(&self) -> &str;
    fn apply(&self, ctx: &FilterContext) -> FilterOutcome;
}
