mod database;
mod repositories;

pub use database::Database;
pub use repositories::{
    recent_decisions, recent_trades, SqliteBalanceRepository, SqliteDecisionRepository, SqliteTradeRepository,
};
