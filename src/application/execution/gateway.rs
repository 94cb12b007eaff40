use crate::domain::errors::MarketDataError;
use crate::domain::ports::{ExecutionClient, OrderOutcome};
use crate::domain::types::{OrderSide, OrderSpec, OrderTimeInForce};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

/// Dashboard-visible in-flight order record (spec §4.H).
#[derive(Debug, Clone)]
pub struct PendingOrder {
    pub order_id: String,
    pub trade_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub limit_price: Decimal,
    pub quantity: Decimal,
    pub confidence: f64,
    pub reasoning: String,
    pub created_at: i64,
    pub current_price: Decimal,
}

/// Events emitted onto the dashboard broadcast channel as orders resolve
/// (spec §4.H, §6 event push channel).
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    Filled {
        order_id: String,
        trade_id: String,
        symbol: String,
        fill_price: Decimal,
        fill_quantity: Decimal,
        fee: Decimal,
    },
    Failed {
        order_id: String,
        trade_id: String,
        symbol: String,
        reason: String,
    },
}

/// Translates a trade decision into a LIMIT+IOC order at bid/ask ± epsilon,
/// tracks pending orders, and emits fill/fail events (spec §4.H). Grounded
/// on the teacher's `OrderReconciler` pending-order bookkeeping pattern.
pub struct ExecutionGateway {
    client: Arc<dyn ExecutionClient>,
    epsilon: Decimal,
    taker_fee_rate: Decimal,
    pending: RwLock<HashMap<String, PendingOrder>>,
    events: broadcast::Sender<ExecutionEvent>,
}

impl ExecutionGateway {
    pub fn new(client: Arc<dyn ExecutionClient>, epsilon: Decimal, taker_fee_rate: Decimal) -> Self {
        let (tx, _rx) = broadcast::channel(1024);
        Self {
            client,
            epsilon,
            taker_fee_rate,
            pending: RwLock::new(HashMap::new()),
            events: tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ExecutionEvent> {
        self.events.subscribe()
    }

    pub async fn pending_orders(&self) -> Vec<PendingOrder> {
        self.pending.read().await.values().cloned().collect()
    }

    /// Places a LIMIT+IOC order at bid × (1+ε) for BUY or ask × (1-ε) for
    /// SELL (spec §4.H). In dry-run, skips the exchange call and accounts
    /// the fill at `tick_close_price` (spec §4.I invariant on `dryRun`).
    pub async fn execute(
        &self,
        trade_id: &str,
        symbol: &str,
        side: OrderSide,
        quantity: Decimal,
        best_bid: Decimal,
        best_ask: Decimal,
        confidence: f64,
        reasoning: &str,
        now_millis: i64,
        dry_run: bool,
        tick_close_price: Decimal,
    ) -> Result<OrderOutcome, MarketDataError> {
        let limit_price = match side {
            OrderSide::Buy => best_bid * (Decimal::ONE + self.epsilon),
            OrderSide::Sell => best_ask * (Decimal::ONE - self.epsilon),
        };

        let order_id = format!("{trade_id}-{now_millis}");
        self.pending.write().await.insert(
            order_id.clone(),
            PendingOrder {
                order_id: order_id.clone(),
                trade_id: trade_id.to_string(),
                symbol: symbol.to_string(),
                side,
                limit_price,
                quantity,
                confidence,
                reasoning: reasoning.to_string(),
                created_at: now_millis,
                current_price: tick_close_price,
            },
        );

        let outcome = if dry_run {
            Ok(OrderOutcome::Filled {
                order_id: order_id.clone(),
                fill_price: tick_close_price,
                fill_quantity: quantity,
                fee: tick_close_price * quantity * self.taker_fee_rate,
            })
        } else {
            let spec = OrderSpec {
                symbol: symbol.to_string(),
                side,
                quantity,
                limit_price,
                tif: OrderTimeInForce::Ioc,
                reduce_only: false,
            };
            self.client.place_order(&spec).await
        };

        self.pending.write().await.remove(&order_id);

        match &outcome {
            Ok(OrderOutcome::Filled {
                fill_price,
                fill_quantity,
                fee,
                ..
            }) => {
                let _ = self.events.send(ExecutionEvent::Filled {
                    order_id,
                    trade_id: trade_id.to_string(),
                    symbol: symbol.to_string(),
                    fill_price: *fill_price,
                    fill_quantity: *fill_quantity,
                    fee: *fee,
                });
            }
            Ok(OrderOutcome::Rejected { reason }) => {
                let _ = self.events.send(ExecutionEvent::Failed {
                    order_id,
                    trade_id: trade_id.to_string(),
                    symbol: symbol.to_string(),
                    reason: reason.clone(),
                });
            }
            Err(err) => {
                let _ = self.events.send(ExecutionEvent::Failed {
                    order_id,
                    trade_id: trade_id.to_string(),
                    symbol: symbol.to_string(),
                    reason: err.to_string(),
                });
            }
        }

        outcome
    }
}

/// Default epsilon (spec §4.H: bid × (1+ε), ask × (1-ε)).
pub fn default_execution_epsilon() -> Decimal {
    dec!(0.0005)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::AccountSnapshot;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    struct MockClient {
        outcome: OrderOutcome,
    }

    #[async_trait]
    impl ExecutionClient for MockClient {
        async fn place_order(&self, _spec: &OrderSpec) -> Result<OrderOutcome, MarketDataError> {
            Ok(self.outcome.clone())
        }
        async fn set_leverage(&self, _symbol: &str, _leverage: Decimal) -> Result<(), MarketDataError> {
            Ok(())
        }
        async fn get_account(&self) -> Result<AccountSnapshot, MarketDataError> {
            Ok(AccountSnapshot {
                balance: dec!(1000),
                available: dec!(1000),
            })
        }
    }

    #[tokio::test]
    async fn dry_run_accounts_fill_at_tick_close_price() {
        let gateway = ExecutionGateway::new(
            Arc::new(MockClient {
                outcome: OrderOutcome::Rejected {
                    reason: "should not be called".into(),
                },
            }),
            dec!(0.0005),
            dec!(0.0004),
        );
        let outcome = gateway
            .execute(
                "t1", "BTC-PERP", OrderSide::Buy, dec!(1), dec!(100), dec!(101), 0.8,
                "test", 0, true, dec!(105),
            )
            .await
            .unwrap();
        match outcome {
            OrderOutcome::Filled { fill_price, .. } => assert_eq!(fill_price, dec!(105)),
            _ => panic!("expected fill"),
        }
        assert!(gateway.pending_orders().await.is_empty());
    }

    #[tokio::test]
    async fn rejected_order_releases_from_pending_and_emits_failed() {
        let gateway = ExecutionGateway::new(
            Arc::new(MockClient {
                outcome: OrderOutcome::Rejected {
                    reason: "insufficient liquidity".into(),
                },
            }),
            dec!(0.0005),
            dec!(0.0004),
        );
        let mut rx = gateway.subscribe();
        gateway
            .execute(
                "t1", "BTC-PERP", OrderSide::Sell, dec!(1), dec!(100), dec!(101), 0.8,
                "test", 0, false, dec!(100),
            )
            .await
            .unwrap();
        assert!(gateway.pending_orders().await.is_empty());
        matches!(rx.try_recv().unwrap(), ExecutionEvent::Failed { .. });
    }
}
