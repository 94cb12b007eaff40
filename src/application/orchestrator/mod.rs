mod engine;
mod events;

pub use engine::{DailyCounters, Orchestrator, OrchestratorConfig, TickOutcome};
pub use events::DashboardEvent;
