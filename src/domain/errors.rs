use rust_decimal::Decimal;
use thiserror::Error;

/// Market data provider failures (spec §4.A, §7).
#[derive(Debug, Error)]
pub enum MarketDataError {
    #[error("transient market data error for {symbol}: {reason}")]
    Transient { symbol: String, reason: String },

    #[error("permanent market data error for {symbol}: {reason}")]
    Permanent { symbol: String, reason: String },

    #[error("empty market data for {symbol}")]
    Empty { symbol: String },
}

impl MarketDataError {
    pub fn is_retriable(&self) -> bool {
        matches!(self, MarketDataError::Transient { .. })
    }
}

/// Raised by the Indicator Engine when the candle sequence is too short (spec §3/§4.B).
#[derive(Debug, Error)]
#[error("insufficient data for {symbol}: have {have} candles, need {need}")]
pub struct InsufficientDataError {
    pub symbol: String,
    pub have: usize,
    pub need: usize,
}

/// Ledger invariant violations — fatal for the tick, operator-visible (spec §7).
#[derive(Debug, Error)]
pub enum LedgerViolation {
    #[error("balance {balance} insufficient to reserve {amount}")]
    InsufficientBalance { balance: Decimal, amount: Decimal },

    #[error("duplicate open position for {symbol}")]
    DuplicateOpenPosition { symbol: String },

    #[error("trade {trade_id} is already closed")]
    AlreadyClosed { trade_id: String },

    #[error("trade {trade_id} not found")]
    NotFound { trade_id: String },

    #[error("reservation for trade {trade_id} not found")]
    ReservationNotFound { trade_id: String },

    #[error("max open positions ({max}) reached")]
    MaxPositionsReached { max: usize },

    #[error("crypto correlation: opposite-direction position blocked by open {symbol} {side:?}")]
    CorrelationBlocked {
        symbol: String,
        side: crate::domain::types::OrderSide,
    },

    #[error("reversal cap reached for {symbol}: {count} reversals in the trailing hour")]
    ReversalCapReached { symbol: String, count: usize },
}

/// Startup-time configuration failures (spec §7).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unrecognized strategy mode: {0}")]
    UnknownStrategyMode(String),

    #[error("unrecognized LLM provider: {0}")]
    UnknownLlmProvider(String),

    #[error("missing required secret: {0}")]
    MissingSecret(String),

    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

/// Backtest Runner failures. The runner is an external collaborator reached
/// through a defined interface only (spec §1) — no production
/// implementation ships in this crate, only the trait and a stub.
#[derive(Debug, Error)]
pub enum BacktestError {
    #[error("backtest runner not configured")]
    NotConfigured,

    #[error("backtest run {run_id} not found")]
    RunNotFound { run_id: String },
}

/// LLM adapter failures (spec §4.J, §7).
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM returned empty text")]
    EmptyResponse,

    #[error("LLM response was not valid JSON: {0}")]
    UnparseableJson(String),

    #[error("LLM response failed schema validation: {0}")]
    SchemaViolation(String),

    #[error("LLM request failed after {attempts} attempts: {reason}")]
    RequestFailed { attempts: u32, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn market_data_error_retriable_classification() {
        let transient = MarketDataError::Transient {
            symbol: "BTC-PERP".into(),
            reason: "timeout".into(),
        };
        let permanent = MarketDataError::Permanent {
            symbol: "BTC-PERP".into(),
            reason: "bad schema".into(),
        };
        assert!(transient.is_retriable());
        assert!(!permanent.is_retriable());
    }

    #[test]
    fn ledger_violation_formatting() {
        let v = LedgerViolation::MaxPositionsReached { max: 5 };
        assert!(v.to_string().contains('5'));
    }
}
