use crate::domain::errors::MarketDataError;
use crate::domain::ports::{AccountSnapshot, ExecutionClient, MarketDataProvider, OrderOutcome};
use crate::domain::types::{Candle, OrderBookSnapshot, OrderSpec};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Deterministic in-memory double for `MarketDataProvider`/`ExecutionClient`,
/// mirroring the teacher's `infrastructure::mock::MockMarketDataService` but
/// without the background price-simulation task: scenario tests drive every
/// price/book/fill explicitly rather than racing a timer.
pub struct MockExchange {
    candles: RwLock<HashMap<String, Vec<Candle>>>,
    order_books: RwLock<HashMap<String, OrderBookSnapshot>>,
    prices: RwLock<HashMap<String, Decimal>>,
    fill_mode: RwLock<FillMode>,
    account: RwLock<AccountSnapshot>,
    orders_seen: RwLock<Vec<OrderSpec>>,
}

#[derive(Clone)]
enum FillMode {
    Fill {
        fee_rate: Decimal,
    },
    Reject {
        reason: String,
    },
}

impl Default for MockExchange {
    fn default() -> Self {
        Self::new()
    }
}

impl MockExchange {
    pub fn new() -> Self {
        Self {
            candles: RwLock::new(HashMap::new()),
            order_books: RwLock::new(HashMap::new()),
            prices: RwLock::new(HashMap::new()),
            fill_mode: RwLock::new(FillMode::Fill {
                fee_rate: Decimal::new(4, 4), // 0.0004
            }),
            account: RwLock::new(AccountSnapshot {
                balance: Decimal::ZERO,
                available: Decimal::ZERO,
            }),
            orders_seen: RwLock::new(Vec::new()),
        }
    }

    pub async fn set_candles(&self, symbol: &str, candles: Vec<Candle>) {
        self.candles.write().await.insert(symbol.to_string(), candles);
    }

    pub async fn set_order_book(&self, symbol: &str, book: OrderBookSnapshot) {
        if let Some(mid) = book.mid_price() {
            self.prices.write().await.insert(symbol.to_string(), mid);
        }
        self.order_books.write().await.insert(symbol.to_string(), book);
    }

    pub async fn set_price(&self, symbol: &str, price: Decimal) {
        self.prices.write().await.insert(symbol.to_string(), price);
    }

    pub async fn set_account(&self, balance: Decimal, available: Decimal) {
        *self.account.write().await = AccountSnapshot { balance, available };
    }

    pub async fn set_fills(&self, fee_rate: Decimal) {
        *self.fill_mode.write().await = FillMode::Fill { fee_rate };
    }

    pub async fn set_rejections(&self, reason: impl Into<String>) {
        *self.fill_mode.write().await = FillMode::Reject {
            reason: reason.into(),
        };
    }

    pub async fn orders_seen(&self) -> Vec<OrderSpec> {
        self.orders_seen.read().await.clone()
    }
}

#[async_trait]
impl MarketDataProvider for MockExchange {
    async fn candles(
        &self,
        symbol: &str,
        _interval: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, MarketDataError> {
        let all = self.candles.read().await;
        let series = all.get(symbol).ok_or_else(|| MarketDataError::Empty {
            symbol: symbol.to_string(),
        })?;
        if series.is_empty() {
            return Err(MarketDataError::Empty {
                symbol: symbol.to_string(),
            });
        }
        let start = series.len().saturating_sub(limit);
        Ok(series[start..].to_vec())
    }

    async fn historical_candles(
        &self,
        symbol: &str,
        _interval: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Candle>, MarketDataError> {
        let all = self.candles.read().await;
        let series = all.get(symbol).ok_or_else(|| MarketDataError::Empty {
            symbol: symbol.to_string(),
        })?;
        let from_ms = from.timestamp_millis();
        let to_ms = to.timestamp_millis();
        Ok(series
            .iter()
            .filter(|c| c.timestamp >= from_ms && c.timestamp <= to_ms)
            .cloned()
            .collect())
    }

    async fn ticker_price(&self, symbol: &str) -> Result<Decimal, MarketDataError> {
        self.prices
            .read()
            .await
            .get(symbol)
            .copied()
            .ok_or_else(|| MarketDataError::Empty {
                symbol: symbol.to_string(),
            })
    }

    async fn order_book(
        &self,
        symbol: &str,
        _depth: usize,
    ) -> Result<OrderBookSnapshot, MarketDataError> {
        self.order_books
            .read()
            .await
            .get(symbol)
            .cloned()
            .ok_or_else(|| MarketDataError::Empty {
                symbol: symbol.to_string(),
            })
    }

    async fn best_bid_ask(&self, symbol: &str) -> Result<(Decimal, Decimal), MarketDataError> {
        let book = self.order_book(symbol, 1).await?;
        let bid = book
            .best_bid()
            .map(|l| l.price)
            .ok_or_else(|| MarketDataError::Empty {
                symbol: symbol.to_string(),
            })?;
        let ask = book
            .best_ask()
            .map(|l| l.price)
            .ok_or_else(|| MarketDataError::Empty {
                symbol: symbol.to_string(),
            })?;
        Ok((bid, ask))
    }
}

#[async_trait]
impl ExecutionClient for MockExchange {
    async fn place_order(&self, spec: &OrderSpec) -> Result<OrderOutcome, MarketDataError> {
        self.orders_seen.write().await.push(spec.clone());

        match self.fill_mode.read().await.clone() {
            FillMode::Fill { fee_rate } => Ok(OrderOutcome::Filled {
                order_id: uuid::Uuid::new_v4().to_string(),
                fill_price: spec.limit_price,
                fill_quantity: spec.quantity,
                fee: spec.limit_price * spec.quantity * fee_rate,
            }),
            FillMode::Reject { reason } => Ok(OrderOutcome::Rejected { reason }),
        }
    }

    async fn set_leverage(&self, _symbol: &str, _leverage: Decimal) -> Result<(), MarketDataError> {
        Ok(())
    }

    async fn get_account(&self) -> Result<AccountSnapshot, MarketDataError> {
        Ok(self.account.read().await.clone())
    }
}

/// Builds a flat, finite synthetic candle series for indicator warm-up in tests.
pub fn synthetic_candles(symbol: &str, count: usize, start_price: Decimal, start_ts: i64) -> Vec<Candle> {
    let mut out = Vec::with_capacity(count);
    let mut price = start_price;
    for i in 0..count {
        let wobble = Decimal::new((i % 5) as i64 - 2, 1);
        let close = price + wobble;
        out.push(Candle {
            symbol: symbol.to_string(),
            open: price,
            high: close.max(price) + Decimal::new(1, 1),
            low: close.min(price) - Decimal::new(1, 1),
            close,
            volume: Decimal::from(1000 + i as i64),
            timestamp: start_ts + (i as i64) * 60_000,
        });
        price = close;
    }
    out
}
