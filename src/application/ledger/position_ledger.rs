use crate::domain::balance::BalanceLedger;
use crate::domain::errors::LedgerViolation;
use crate::domain::ports::{symbols_are_correlated, PriceCache};
use crate::domain::position::{Position, PositionState};
use crate::domain::types::OrderSide;
use rust_decimal::Decimal;
use std::collections::HashMap;
use tokio::sync::RwLock;

struct LedgerState {
    open_by_symbol: HashMap<String, Position>,
    closed: Vec<Position>,
    balance: BalanceLedger,
}

/// Single-writer position and balance store (spec §4.G). A single
/// `tokio::sync::RwLock` guards both maps together so `invert_position`'s
/// close-then-open sequence is atomic with respect to other symbols' tasks
/// (spec §5: "open strictly precedes any close"; "reject concurrent
/// closePosition on the same id").
pub struct PositionLedger {
    max_open_positions: usize,
    state: RwLock<LedgerState>,
}

impl PositionLedger {
    pub fn new(starting_balance: Decimal, max_open_positions: usize) -> Self {
        Self {
            max_open_positions,
            state: RwLock::new(LedgerState {
                open_by_symbol: HashMap::new(),
                closed: Vec::new(),
                balance: BalanceLedger::new(starting_balance),
            }),
        }
    }

    pub async fn active_positions(&self) -> Vec<Position> {
        self.state.read().await.open_by_symbol.values().cloned().collect()
    }

    pub async fn active_position_for(&self, symbol: &str) -> Option<Position> {
        self.state.read().await.open_by_symbol.get(symbol).cloned()
    }

    pub async fn current_balance(&self) -> Decimal {
        self.state.read().await.balance.balance()
    }

    pub async fn free_margin(&self) -> Decimal {
        self.state.read().await.balance.available()
    }

    /// `equity() = balance + Σ unrealized` (spec §4.G).
    pub async fn equity(&self, mark_prices: &PriceCache) -> Decimal {
        let state = self.state.read().await;
        let unrealized: Decimal = state
            .open_by_symbol
            .values()
            .map(|p| {
                mark_prices
                    .get(&p.symbol)
                    .map(|&mark| p.unrealized_pnl(mark))
                    .unwrap_or(Decimal::ZERO)
            })
            .sum();
        state.balance.balance() + unrealized
    }

    /// Opens a new position after the max-positions cap and crypto
    /// correlation gate (spec §4.G): a new side must not be opposite to any
    /// existing open position across any symbol.
    pub async fn open_position(&self, position: Position, margin: Decimal) -> Result<(), LedgerViolation> {
        let mut state = self.state.write().await;

        if state.open_by_symbol.contains_key(&position.symbol) {
            return Err(LedgerViolation::DuplicateOpenPosition {
                symbol: position.symbol.clone(),
            });
        }

        if state.open_by_symbol.len() >= self.max_open_positions {
            return Err(LedgerViolation::MaxPositionsReached {
                max: self.max_open_positions,
            });
        }

        if let Some(blocker) = Self::correlation_block(&state.open_by_symbol, &position.symbol, position.side) {
            return Err(LedgerViolation::CorrelationBlocked {
                symbol: blocker.symbol.clone(),
                side: blocker.side,
            });
        }

        state.balance.reserve_margin(&position.trade_id, margin)?;
        state.open_by_symbol.insert(position.symbol.clone(), position);
        Ok(())
    }

    fn correlation_block<'a>(
        open: &'a HashMap<String, Position>,
        symbol: &str,
        side: OrderSide,
    ) -> Option<&'a Position> {
        open.values().find(|p| {
            p.symbol != symbol && symbols_are_correlated(symbol, &p.symbol) && p.side != side
        })
    }

    /// Idempotent close: computes gross P&L with leverage, subtracts entry +
    /// exit fee, updates balance, releases the reservation (spec §4.G
    /// `closePosition`).
    pub async fn close_position(
        &self,
        trade_id: &str,
        exit_price: Decimal,
        exit_timestamp: i64,
        taker_fee_rate: Decimal,
    ) -> Result<Position, LedgerViolation> {
        let mut state = self.state.write().await;

        let symbol = state
            .open_by_symbol
            .iter()
            .find(|(_, p)| p.trade_id == trade_id)
            .map(|(s, _)| s.clone())
            .ok_or_else(|| LedgerViolation::NotFound {
                trade_id: trade_id.to_string(),
            })?;

        let mut position = state.open_by_symbol.remove(&symbol).expect("checked above");

        let gross = position.gross_pnl(exit_price);
        let exit_fee = exit_price * position.quantity * taker_fee_rate;
        let realized = gross - position.entry_fee - exit_fee;

        state.balance.release_and_settle(trade_id, realized, Decimal::ZERO)?;

        position.state = PositionState::Closed;
        position.exit_price = Some(exit_price);
        position.close_timestamp = Some(exit_timestamp);
        position.realized_pnl = Some(realized);
        state.closed.push(position.clone());

        Ok(position)
    }

    /// Closes the existing open position for `symbol` and opens the
    /// opposite-direction `new_position` atomically (spec §4.G
    /// `invertPosition`). Emits one close + one open from the caller's
    /// perspective — the caller is responsible for the corresponding
    /// dashboard events.
    pub async fn invert_position(
        &self,
        symbol: &str,
        exit_price: Decimal,
        exit_timestamp: i64,
        taker_fee_rate: Decimal,
        new_position: Position,
        new_margin: Decimal,
    ) -> Result<(Position, ()), LedgerViolation> {
        let trade_id = {
            let state = self.state.read().await;
            state
                .open_by_symbol
                .get(symbol)
                .map(|p| p.trade_id.clone())
                .ok_or_else(|| LedgerViolation::NotFound {
                    trade_id: symbol.to_string(),
                })?
        };
        let closed = self
            .close_position(&trade_id, exit_price, exit_timestamp, taker_fee_rate)
            .await?;
        self.open_position(new_position, new_margin).await?;
        Ok((closed, ()))
    }

    /// Win rate and sample count over the last `n` closed trades across all
    /// symbols, used by the Synthesizer's LLM prompt context (spec §4.I step 2).
    pub async fn recent_performance(&self, n: usize) -> (f64, u32) {
        let state = self.state.read().await;
        let sample: Vec<&Position> = state.closed.iter().rev().take(n).collect();
        if sample.is_empty() {
            return (0.0, 0);
        }
        let wins = sample
            .iter()
            .filter(|p| p.realized_pnl.unwrap_or(Decimal::ZERO) > Decimal::ZERO)
            .count();
        (wins as f64 / sample.len() as f64, sample.len() as u32)
    }

    /// Current losing streak for `symbol`: count of consecutive closed trades
    /// (most recent first) with non-positive realized P&L (spec §4.F cooldown
    /// and dynamic-sizing tables, which key off "consecutive losses").
    pub async fn consecutive_losses(&self, symbol: &str) -> u32 {
        let state = self.state.read().await;
        state
            .closed
            .iter()
            .rev()
            .filter(|p| p.symbol == symbol)
            .take_while(|p| p.realized_pnl.unwrap_or(Decimal::ZERO) <= Decimal::ZERO)
            .count() as u32
    }

    /// Operator reset: clears all positions and resets the balance ledger.
    pub async fn reset(&self, starting_balance: Decimal) {
        let mut state = self.state.write().await;
        state.open_by_symbol.clear();
        state.closed.clear();
        state.balance.reset(starting_balance);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn position(symbol: &str, side: OrderSide, trade_id: &str) -> Position {
        Position {
            trade_id: trade_id.to_string(),
            symbol: symbol.to_string(),
            side,
            quantity: dec!(1),
            entry_price: dec!(100),
            leverage: dec!(10),
            entry_fee: dec!(0.1),
            state: PositionState::Open,
            open_timestamp: 0,
            close_timestamp: None,
            exit_price: None,
            realized_pnl: None,
        }
    }

    #[tokio::test]
    async fn opposite_side_on_another_symbol_is_blocked() {
        let ledger = PositionLedger::new(dec!(1000), 5);
        ledger
            .open_position(position("BTC-PERP", OrderSide::Buy, "t1"), dec!(10))
            .await
            .unwrap();
        let err = ledger
            .open_position(position("ETH-PERP", OrderSide::Sell, "t2"), dec!(10))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerViolation::CorrelationBlocked { .. }));
    }

    #[tokio::test]
    async fn duplicate_open_same_symbol_rejected() {
        let ledger = PositionLedger::new(dec!(1000), 5);
        ledger
            .open_position(position("BTC-PERP", OrderSide::Buy, "t1"), dec!(10))
            .await
            .unwrap();
        let err = ledger
            .open_position(position("BTC-PERP", OrderSide::Buy, "t2"), dec!(10))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerViolation::DuplicateOpenPosition { .. }));
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let ledger = PositionLedger::new(dec!(1000), 5);
        ledger
            .open_position(position("BTC-PERP", OrderSide::Buy, "t1"), dec!(10))
            .await
            .unwrap();
        ledger
            .close_position("t1", dec!(110), 1, dec!(0.001))
            .await
            .unwrap();
        let err = ledger
            .close_position("t1", dec!(110), 2, dec!(0.001))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerViolation::NotFound { .. }));
    }

    #[tokio::test]
    async fn max_positions_cap_enforced() {
        let ledger = PositionLedger::new(dec!(10_000), 1);
        ledger
            .open_position(position("BTC-PERP", OrderSide::Buy, "t1"), dec!(10))
            .await
            .unwrap();
        let err = ledger
            .open_position(position("ETH-PERP", OrderSide::Buy, "t2"), dec!(10))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerViolation::MaxPositionsReached { .. }));
    }
}
