use crate::domain::decision::TradeDecisionRecord;
use crate::domain::position::Position;
use rust_decimal::Decimal;
use serde::Serialize;

/// Push-channel events consumed by the dashboard (spec §6). Carried over a
/// `tokio::sync::broadcast` channel, whose lagging-receiver semantics give
/// the required "drop oldest per topic" backpressure for free: a slow
/// subscriber skips ahead rather than stalling the producer.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "topic", content = "payload")]
pub enum DashboardEvent {
    #[serde(rename = "stats:update")]
    StatsUpdate {
        balance: Decimal,
        equity: Decimal,
        open_positions: usize,
        trades_today: u32,
    },
    #[serde(rename = "positions:update")]
    PositionsUpdate { positions: Vec<Position> },
    #[serde(rename = "trade:new")]
    TradeNew { position: Position },
    #[serde(rename = "trade:closed")]
    TradeClosed { position: Position },
    #[serde(rename = "decision:new")]
    DecisionNew { record: TradeDecisionRecord },
    #[serde(rename = "market:update")]
    MarketUpdate {
        symbol: String,
        price: Decimal,
        timestamp: i64,
    },
    // Reserved for a wired-in `domain::ports::BacktestRunner` (spec §1, §6):
    // no producer in this crate emits these yet, since the runner itself is
    // an external collaborator reached through a defined interface only.
    #[serde(rename = "backtest:progress")]
    BacktestProgress { run_id: String, percent: f64 },
    #[serde(rename = "backtest:status")]
    BacktestStatus { run_id: String, status: String },
    #[serde(rename = "backtest:complete")]
    BacktestComplete { run_id: String, status: String },
}
