use crate::domain::errors::MarketDataError;
use crate::domain::ports::{AccountSnapshot, ExecutionClient, MarketDataProvider, OrderOutcome};
use crate::domain::types::{BookLevel, Candle, OrderBookSnapshot, OrderSide, OrderSpec, OrderTimeInForce};
use crate::infrastructure::core::circuit_breaker::{CircuitBreaker, CircuitBreakerError};
use crate::infrastructure::core::http_client_factory::{build_url_with_query, HttpClientFactory};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest_middleware::ClientWithMiddleware;
use rust_decimal::Decimal;
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

type HmacSha256 = Hmac<Sha256>;

/// Signed REST client for the perpetual-futures exchange (spec §4.A, §6).
/// Every outbound call is wrapped in its own circuit breaker, mirroring the
/// teacher's split between a market-data breaker and an execution breaker
/// (`infrastructure::binance::market_data`/`execution`).
pub struct ExchangeClient {
    client: ClientWithMiddleware,
    api_key: String,
    api_secret: String,
    base_url: String,
    wallet_address: String,
    market_breaker: Arc<CircuitBreaker>,
    execution_breaker: Arc<CircuitBreaker>,
}

impl ExchangeClient {
    pub fn new(api_url: String, api_key: String, api_secret: String, wallet_address: String) -> Self {
        Self {
            client: HttpClientFactory::create_client(),
            api_key,
            api_secret,
            base_url: api_url,
            wallet_address,
            market_breaker: Arc::new(CircuitBreaker::new(
                "ExchangeMarketData",
                5,
                3,
                Duration::from_secs(60),
            )),
            execution_breaker: Arc::new(CircuitBreaker::new(
                "ExchangeExecution",
                5,
                3,
                Duration::from_secs(60),
            )),
        }
    }

    fn sign(&self, payload: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(self.api_secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn transient(symbol: &str, reason: impl std::fmt::Display) -> MarketDataError {
        MarketDataError::Transient {
            symbol: symbol.to_string(),
            reason: reason.to_string(),
        }
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        symbol: &str,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, MarketDataError> {
        let url = build_url_with_query(&format!("{}{}", self.base_url, path), params);
        self.market_breaker
            .call(async {
                let response = self
                    .client
                    .get(&url)
                    .send()
                    .await
                    .map_err(|e| Self::transient(symbol, e))?;
                if !response.status().is_success() {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(Self::transient(symbol, format!("{}: {}", status, body)));
                }
                response
                    .json::<T>()
                    .await
                    .map_err(|e| Self::transient(symbol, e))
            })
            .await
            .map_err(|e| match e {
                CircuitBreakerError::Open(msg) => Self::transient(symbol, msg),
                CircuitBreakerError::Inner(inner) => inner,
            })
    }
}

#[derive(Debug, Deserialize)]
struct RawCandle {
    open: String,
    high: String,
    low: String,
    close: String,
    volume: String,
    #[serde(rename = "timestamp")]
    ts: i64,
}

fn parse_decimal(raw: &str) -> Decimal {
    raw.parse::<Decimal>().unwrap_or(Decimal::ZERO)
}

#[async_trait]
impl MarketDataProvider for ExchangeClient {
    async fn candles(
        &self,
        symbol: &str,
        interval: &str,
        limit: usize,
    ) -> Result<Vec<Candle>, MarketDataError> {
        let raw: Vec<RawCandle> = self
            .get_json(
                symbol,
                "/v1/candles",
                &[
                    ("symbol", symbol.to_string()),
                    ("interval", interval.to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;

        if raw.is_empty() {
            return Err(MarketDataError::Empty {
                symbol: symbol.to_string(),
            });
        }

        let mut candles: Vec<Candle> = raw
            .into_iter()
            .map(|c| Candle {
                symbol: symbol.to_string(),
                open: parse_decimal(&c.open),
                high: parse_decimal(&c.high),
                low: parse_decimal(&c.low),
                close: parse_decimal(&c.close),
                volume: parse_decimal(&c.volume),
                timestamp: c.ts,
            })
            .collect();
        candles.sort_by_key(|c| c.timestamp);
        Ok(candles)
    }

    async fn historical_candles(
        &self,
        symbol: &str,
        interval: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Candle>, MarketDataError> {
        let raw: Vec<RawCandle> = self
            .get_json(
                symbol,
                "/v1/candles/history",
                &[
                    ("symbol", symbol.to_string()),
                    ("interval", interval.to_string()),
                    ("from", from.timestamp_millis().to_string()),
                    ("to", to.timestamp_millis().to_string()),
                ],
            )
            .await?;

        if raw.is_empty() {
            return Err(MarketDataError::Empty {
                symbol: symbol.to_string(),
            });
        }

        let mut candles: Vec<Candle> = raw
            .into_iter()
            .map(|c| Candle {
                symbol: symbol.to_string(),
                open: parse_decimal(&c.open),
                high: parse_decimal(&c.high),
                low: parse_decimal(&c.low),
                close: parse_decimal(&c.close),
                volume: parse_decimal(&c.volume),
                timestamp: c.ts,
            })
            .collect();
        candles.sort_by_key(|c| c.timestamp);
        Ok(candles)
    }

    async fn ticker_price(&self, symbol: &str) -> Result<Decimal, MarketDataError> {
        #[derive(Deserialize)]
        struct Ticker {
            price: String,
        }
        let ticker: Ticker = self
            .get_json(symbol, "/v1/ticker", &[("symbol", symbol.to_string())])
            .await?;
        Ok(parse_decimal(&ticker.price))
    }

    async fn order_book(
        &self,
        symbol: &str,
        depth: usize,
    ) -> Result<OrderBookSnapshot, MarketDataError> {
        #[derive(Deserialize)]
        struct RawLevel {
            price: String,
            size: String,
        }
        #[derive(Deserialize)]
        struct RawBook {
            bids: Vec<RawLevel>,
            asks: Vec<RawLevel>,
        }

        let raw: RawBook = self
            .get_json(
                symbol,
                "/v1/orderbook",
                &[("symbol", symbol.to_string()), ("depth", depth.to_string())],
            )
            .await?;

        let to_level = |l: RawLevel| BookLevel {
            price: parse_decimal(&l.price),
            size: parse_decimal(&l.size),
        };

        Ok(OrderBookSnapshot {
            symbol: symbol.to_string(),
            bids: raw.bids.into_iter().map(to_level).collect(),
            asks: raw.asks.into_iter().map(to_level).collect(),
            timestamp: Utc::now().timestamp_millis(),
        })
    }

    async fn best_bid_ask(&self, symbol: &str) -> Result<(Decimal, Decimal), MarketDataError> {
        let book = self.order_book(symbol, 1).await?;
        let bid = book
            .best_bid()
            .ok_or_else(|| MarketDataError::Empty {
                symbol: symbol.to_string(),
            })?
            .price;
        let ask = book
            .best_ask()
            .ok_or_else(|| MarketDataError::Empty {
                symbol: symbol.to_string(),
            })?
            .price;
        Ok((bid, ask))
    }
}

#[async_trait]
impl ExecutionClient for ExchangeClient {
    async fn place_order(&self, spec: &OrderSpec) -> Result<OrderOutcome, MarketDataError> {
        let timestamp = Utc::now().timestamp_millis();
        let side = match spec.side {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        };
        let tif = match spec.tif {
            OrderTimeInForce::Ioc => "IOC",
            OrderTimeInForce::Gtc => "GTC",
        };

        let query_string = format!(
            "symbol={}&side={}&quantity={}&price={}&tif={}&reduceOnly={}&wallet={}&timestamp={}",
            spec.symbol,
            side,
            spec.quantity,
            spec.limit_price,
            tif,
            spec.reduce_only,
            self.wallet_address,
            timestamp
        );
        let signature = self.sign(&query_string);
        let url = format!("{}/v1/order?{}&signature={}", self.base_url, query_string, signature);

        let symbol = spec.symbol.clone();
        let result = self
            .execution_breaker
            .call(async {
                let response = self
                    .client
                    .post(&url)
                    .header("X-API-KEY", &self.api_key)
                    .send()
                    .await
                    .map_err(|e| Self::transient(&symbol, e))?;

                let status = response.status();
                if !status.is_success() {
                    let body = response.text().await.unwrap_or_default();
                    warn!(symbol = %symbol, %status, %body, "order placement rejected");
                    return Ok(OrderOutcome::Rejected {
                        reason: format!("{}: {}", status, body),
                    });
                }

                #[derive(Deserialize)]
                struct OrderAck {
                    #[serde(rename = "orderId")]
                    order_id: String,
                    #[serde(rename = "fillPrice")]
                    fill_price: String,
                    #[serde(rename = "fillQuantity")]
                    fill_quantity: String,
                    fee: String,
                }

                let ack: OrderAck = response.json().await.map_err(|e| Self::transient(&symbol, e))?;
                info!(symbol = %symbol, order_id = %ack.order_id, "order filled");
                Ok(OrderOutcome::Filled {
                    order_id: ack.order_id,
                    fill_price: parse_decimal(&ack.fill_price),
                    fill_quantity: parse_decimal(&ack.fill_quantity),
                    fee: parse_decimal(&ack.fee),
                })
            })
            .await
            .map_err(|e| match e {
                CircuitBreakerError::Open(msg) => Self::transient(&spec.symbol, msg),
                CircuitBreakerError::Inner(inner) => inner,
            })?;

        Ok(result)
    }

    async fn set_leverage(&self, symbol: &str, leverage: Decimal) -> Result<(), MarketDataError> {
        let timestamp = Utc::now().timestamp_millis();
        let query_string = format!(
            "symbol={}&leverage={}&wallet={}&timestamp={}",
            symbol, leverage, self.wallet_address, timestamp
        );
        let signature = self.sign(&query_string);
        let url = format!("{}/v1/leverage?{}&signature={}", self.base_url, query_string, signature);

        let response = self
            .client
            .post(&url)
            .header("X-API-KEY", &self.api_key)
            .send()
            .await
            .map_err(|e| Self::transient(symbol, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Self::transient(symbol, format!("{}: {}", status, body)));
        }
        Ok(())
    }

    async fn get_account(&self) -> Result<AccountSnapshot, MarketDataError> {
        let timestamp = Utc::now().timestamp_millis();
        let query_string = format!("wallet={}&timestamp={}", self.wallet_address, timestamp);
        let signature = self.sign(&query_string);
        let url = format!("{}/v1/account?{}&signature={}", self.base_url, query_string, signature);

        #[derive(Deserialize)]
        struct Account {
            balance: String,
            available: String,
        }

        let response = self
            .client
            .get(&url)
            .header("X-API-KEY", &self.api_key)
            .send()
            .await
            .map_err(|e| Self::transient("account", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Self::transient("account", format!("{}: {}", status, body)));
        }

        let account: Account = response
            .json()
            .await
            .map_err(|e| Self::transient("account", e))?;

        Ok(AccountSnapshot {
            balance: parse_decimal(&account.balance),
            available: parse_decimal(&account.available),
        })
    }
}
