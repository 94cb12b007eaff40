use crate::domain::decision::TradeDecisionRecord;
use crate::domain::errors::MarketDataError;
use crate::domain::types::{Candle, OrderBookSnapshot, OrderSide, OrderSpec};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;

/// Capability surface delivering candles, ticker, and order book data
/// (spec §4.A, §6). Implemented by `infrastructure::exchange::ExchangeClient`
/// and, for tests, `infrastructure::exchange::MockExchange`.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    async fn candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, MarketDataError>;

    async fn historical_candles(
        &self,
        symbol: &str,
        interval: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Candle>, MarketDataError>;

    async fn ticker_price(&self, symbol: &str) -> Result<Decimal, MarketDataError>;

    async fn order_book(
        &self,
        symbol: &str,
        depth: usize,
    ) -> Result<OrderBookSnapshot, MarketDataError>;

    async fn best_bid_ask(&self, symbol: &str) -> Result<(Decimal, Decimal), MarketDataError>;
}

/// Validates and sorts a raw candle response per the spec's provider-concern
/// invariants: empty -> `Empty`, out-of-order timestamps sorted ascending.
pub fn validate_candles(
    symbol: &str,
    mut candles: Vec<Candle>,
) -> Result<Vec<Candle>, MarketDataError> {
    if candles.is_empty() {
        return Err(MarketDataError::Empty {
            symbol: symbol.to_string(),
        });
    }
    candles.sort_by_key(|c| c.timestamp);
    Ok(candles)
}

#[derive(Debug, Clone)]
pub struct AccountSnapshot {
    pub balance: Decimal,
    pub available: Decimal,
}

#[derive(Debug, Clone)]
pub enum OrderOutcome {
    Filled {
        order_id: String,
        fill_price: Decimal,
        fill_quantity: Decimal,
        fee: Decimal,
    },
    Rejected {
        reason: String,
    },
}

/// Exchange order-placement and account surface (spec §6).
#[async_trait]
pub trait ExecutionClient: Send + Sync {
    async fn place_order(&self, spec: &OrderSpec) -> Result<OrderOutcome, MarketDataError>;
    async fn set_leverage(&self, symbol: &str, leverage: Decimal) -> Result<(), MarketDataError>;
    async fn get_account(&self) -> Result<AccountSnapshot, MarketDataError>;
}

/// Validated output of the LLM Adapter (spec §4.J).
#[derive(Debug, Clone)]
pub struct LlmDecision {
    pub decision: crate::domain::types::Decision,
    pub confidence: f64,
    pub reasoning: String,
    pub suggested_stop_loss_pct: Option<f64>,
    pub suggested_take_profit_pct: Option<f64>,
}

#[async_trait]
pub trait LlmAdapter: Send + Sync {
    async fn ask(&self, prompt: &str) -> Result<LlmDecision, crate::domain::errors::LlmError>;
}

/// Anti-spoofing classifier consumed by the experimental "wave surfing"
/// strategy mode (spec §4.E). Interface-only per the spec's Open Questions —
/// production implementations are out of scope, only the trait and a mock
/// are required.
#[derive(Debug, Clone, Copy)]
pub struct SpoofingBias {
    pub side: Option<OrderSide>,
    pub confidence: f64,
}

#[async_trait]
pub trait SpoofingClassifier: Send + Sync {
    async fn classify(&self, symbol: &str) -> SpoofingBias;
}

/// Historical-replay request for the Backtest Runner (spec §1, §6).
#[derive(Debug, Clone)]
pub struct BacktestRequest {
    pub symbol: String,
    pub interval: String,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct BacktestHandle {
    pub run_id: String,
}

/// Replays historical candles through the decision core (spec §1, §6).
/// Treated as an external collaborator with a defined interface only — the
/// spec scopes the runner itself out, so no production implementation
/// ships here, only the trait and `infrastructure::backtest`'s stub.
#[async_trait]
pub trait BacktestRunner: Send + Sync {
    async fn start(
        &self,
        request: BacktestRequest,
    ) -> Result<BacktestHandle, crate::domain::errors::BacktestError>;

    async fn stop(&self, run_id: &str) -> Result<(), crate::domain::errors::BacktestError>;
}

/// Persistence boundary for the `trades` table (spec §6).
#[async_trait]
pub trait TradeRepository: Send + Sync {
    async fn upsert(&self, position: &crate::domain::position::Position) -> anyhow::Result<()>;
    async fn open_for_symbol(
        &self,
        symbol: &str,
    ) -> anyhow::Result<Option<crate::domain::position::Position>>;
}

/// Persistence boundary for the `ai_decisions` table (spec §6).
#[async_trait]
pub trait DecisionRepository: Send + Sync {
    async fn append(&self, record: &TradeDecisionRecord) -> anyhow::Result<()>;
}

/// Persistence boundary for `balance_history`, latest row = current balance (spec §6).
#[async_trait]
pub trait BalanceRepository: Send + Sync {
    async fn record(&self, timestamp: i64, balance: Decimal) -> anyhow::Result<()>;
    async fn latest(&self) -> anyhow::Result<Option<Decimal>>;
}

/// Correlation classification used by the Position Ledger's cross-symbol
/// block (spec §4.G, property 4): crypto perpetuals are treated as
/// co-moving, so an opposite-direction open anywhere blocks a new open.
pub fn symbols_are_correlated(_a: &str, _b: &str) -> bool {
    true
}

pub type PriceCache = HashMap<String, Decimal>;
