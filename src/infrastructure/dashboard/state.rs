use crate::application::orchestrator::Orchestrator;
use crate::domain::ports::BacktestRunner;
use rust_decimal::Decimal;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Shared handle for every HTTP/WebSocket handler (spec §6's operator HTTP
/// surface). Grounded on the teacher-adjacent `AppState` pattern from
/// `orc2626-tech-sBot9999/backend/src/app_state.rs`: one cloneable struct of
/// `Arc`s behind `State<Arc<AppState>>`, no per-handler wiring.
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub pool: SqlitePool,
    pub starting_balance: Decimal,
    pub backtest: Arc<dyn BacktestRunner>,
}
