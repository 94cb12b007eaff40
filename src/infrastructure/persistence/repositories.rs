use crate::domain::decision::TradeDecisionRecord;
use crate::domain::ports::{BalanceRepository, DecisionRepository, TradeRepository};
use crate::domain::position::{Position, PositionState};
use crate::domain::types::{Decision, IndicatorSet, OrderSide};
use anyhow::{Context, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::debug;

/// Persists the `trades` table (spec §6). Grounded on the teacher's
/// `SqliteOrderRepository`, adapted to the upsert-by-`trade_id` shape a
/// position's open/close lifecycle requires.
pub struct SqliteTradeRepository {
    pool: SqlitePool,
}

impl SqliteTradeRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TradeRepository for SqliteTradeRepository {
    async fn upsert(&self, position: &Position) -> Result<()> {
        let status = match position.state {
            PositionState::Open => "OPEN",
            PositionState::Closed => "CLOSED",
        };

        sqlx::query(
            r#"
            INSERT INTO trades
                (trade_id, symbol, side, quantity, entry_price, exit_price, leverage, fee, entry_ts, exit_ts, pnl, status)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(trade_id) DO UPDATE SET
                exit_price = excluded.exit_price,
                exit_ts = excluded.exit_ts,
                pnl = excluded.pnl,
                status = excluded.status
            "#,
        )
        .bind(&position.trade_id)
        .bind(&position.symbol)
        .bind(position.side.to_string())
        .bind(position.quantity.to_string())
        .bind(position.entry_price.to_string())
        .bind(position.exit_price.map(|d| d.to_string()))
        .bind(position.leverage.to_string())
        .bind(position.entry_fee.to_string())
        .bind(position.open_timestamp)
        .bind(position.close_timestamp)
        .bind(position.realized_pnl.map(|d| d.to_string()))
        .bind(status)
        .execute(&self.pool)
        .await
        .context("failed to upsert trade")?;

        debug!(trade_id = %position.trade_id, "persisted trade");
        Ok(())
    }

    async fn open_for_symbol(&self, symbol: &str) -> Result<Option<Position>> {
        let row = sqlx::query("SELECT * FROM trades WHERE symbol = ? AND status = 'OPEN' LIMIT 1")
            .bind(symbol)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else { return Ok(None) };
        Ok(Some(row_to_position(row)?))
    }
}

fn row_to_position(row: sqlx::sqlite::SqliteRow) -> Result<Position> {
    let side_str: String = row.try_get("side")?;
    let side = match side_str.as_str() {
        "SELL" => OrderSide::Sell,
        _ => OrderSide::Buy,
    };
    let status: String = row.try_get("status")?;
    let state = if status == "CLOSED" {
        PositionState::Closed
    } else {
        PositionState::Open
    };

    let exit_price: Option<String> = row.try_get("exit_price")?;
    let pnl: Option<String> = row.try_get("pnl")?;

    Ok(Position {
        trade_id: row.try_get("trade_id")?,
        symbol: row.try_get("symbol")?,
        side,
        quantity: Decimal::from_str(&row.try_get::<String, _>("quantity")?).unwrap_or_default(),
        entry_price: Decimal::from_str(&row.try_get::<String, _>("entry_price")?).unwrap_or_default(),
        leverage: Decimal::from_str(&row.try_get::<String, _>("leverage")?).unwrap_or_default(),
        entry_fee: Decimal::from_str(&row.try_get::<String, _>("fee")?).unwrap_or_default(),
        state,
        open_timestamp: row.try_get("entry_ts")?,
        close_timestamp: row.try_get("exit_ts")?,
        exit_price: exit_price.and_then(|s| Decimal::from_str(&s).ok()),
        realized_pnl: pnl.and_then(|s| Decimal::from_str(&s).ok()),
    })
}

/// Persists the `ai_decisions` table (spec §6). One row is appended per tick
/// per the orchestrator's "exactly one persisted record" invariant.
pub struct SqliteDecisionRepository {
    pool: SqlitePool,
}

impl SqliteDecisionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DecisionRepository for SqliteDecisionRepository {
    async fn append(&self, record: &TradeDecisionRecord) -> Result<()> {
        let decision_id = uuid::Uuid::new_v4().to_string();
        let indicators_blob = serde_json::to_string(&record.indicators)
            .context("failed to serialize indicators for ai_decisions")?;

        sqlx::query(
            r#"
            INSERT INTO ai_decisions
                (decision_id, trade_id, ts, symbol, decision, confidence, reasoning, current_price, indicators_blob, executed, error)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&decision_id)
        .bind(&record.order_id)
        .bind(record.timestamp)
        .bind(&record.symbol)
        .bind(record.decision.to_string())
        .bind(record.confidence)
        .bind(&record.reasoning)
        .bind(record.price.to_string())
        .bind(indicators_blob)
        .bind(record.executed)
        .bind(&record.error)
        .execute(&self.pool)
        .await
        .context("failed to append ai_decisions row")?;

        Ok(())
    }
}

/// Persists `balance_history`; the latest row by timestamp is the current balance.
pub struct SqliteBalanceRepository {
    pool: SqlitePool,
}

impl SqliteBalanceRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BalanceRepository for SqliteBalanceRepository {
    async fn record(&self, timestamp: i64, balance: Decimal) -> Result<()> {
        sqlx::query(
            "INSERT INTO balance_history (ts, balance) VALUES (?, ?) ON CONFLICT(ts) DO UPDATE SET balance = excluded.balance",
        )
        .bind(timestamp)
        .bind(balance.to_string())
        .execute(&self.pool)
        .await
        .context("failed to record balance")?;
        Ok(())
    }

    async fn latest(&self) -> Result<Option<Decimal>> {
        let row = sqlx::query("SELECT balance FROM balance_history ORDER BY ts DESC LIMIT 1")
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let balance: String = row.try_get("balance")?;
                Ok(Decimal::from_str(&balance).ok())
            }
            None => Ok(None),
        }
    }
}

/// Loads the most recent trade rows (open and closed) for the dashboard's
/// `/api/trades` endpoint; like `recent_decisions`, a read path outside the
/// domain `TradeRepository` trait.
pub async fn recent_trades(pool: &SqlitePool, limit: i64) -> Result<Vec<Position>> {
    let rows = sqlx::query("SELECT * FROM trades ORDER BY entry_ts DESC LIMIT ?")
        .bind(limit)
        .fetch_all(pool)
        .await?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        out.push(row_to_position(row)?);
    }
    Ok(out)
}

/// Loads the most recent decision rows for the dashboard's `/api/decisions`
/// endpoint; not part of the domain `DecisionRepository` trait since it is a
/// read path consumed only by the HTTP layer.
pub async fn recent_decisions(pool: &SqlitePool, limit: i64) -> Result<Vec<TradeDecisionRecord>> {
    let rows = sqlx::query("SELECT * FROM ai_decisions ORDER BY ts DESC LIMIT ?")
        .bind(limit)
        .fetch_all(pool)
        .await?;

    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        let decision_str: String = row.try_get("decision")?;
        let decision = match decision_str.as_str() {
            "BUY" => Decision::Buy,
            "SELL" => Decision::Sell,
            _ => Decision::Hold,
        };
        let indicators_blob: String = row.try_get("indicators_blob")?;
        let indicators: IndicatorSet = serde_json::from_str(&indicators_blob).unwrap_or_default();
        let price: String = row.try_get("current_price")?;

        out.push(TradeDecisionRecord {
            timestamp: row.try_get("ts")?,
            symbol: row.try_get("symbol")?,
            decision,
            confidence: row.try_get("confidence")?,
            reasoning: row.try_get("reasoning")?,
            price: Decimal::from_str(&price).unwrap_or_default(),
            indicators,
            executed: row.try_get("executed")?,
            order_id: row.try_get("trade_id")?,
            error: row.try_get("error")?,
        });
    }
    Ok(out)
}
