use crate::domain::types::OrderSide;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionState {
    Open,
    Closed,
}

/// Authoritative ledger entry for one position (spec §3).
///
/// State transitions are monotonic: `Open -> Closed`, never reversed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub trade_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub leverage: Decimal,
    pub entry_fee: Decimal,
    pub state: PositionState,
    pub open_timestamp: i64,
    pub close_timestamp: Option<i64>,
    pub exit_price: Option<Decimal>,
    pub realized_pnl: Option<Decimal>,
}

impl Position {
    pub fn is_open(&self) -> bool {
        matches!(self.state, PositionState::Open)
    }

    /// Gross P&L with leverage applied, before fees (spec §4.G).
    pub fn gross_pnl(&self, exit_price: Decimal) -> Decimal {
        let price_delta = match self.side {
            OrderSide::Buy => exit_price - self.entry_price,
            OrderSide::Sell => self.entry_price - exit_price,
        };
        price_delta * self.quantity * self.leverage
    }

    /// Unrealized P&L at a mark price; zero once the position is closed.
    pub fn unrealized_pnl(&self, mark_price: Decimal) -> Decimal {
        if self.is_open() {
            self.gross_pnl(mark_price)
        } else {
            Decimal::ZERO
        }
    }

    /// Notional value of the position's margin exposure at entry.
    pub fn initial_margin(&self) -> Decimal {
        if self.leverage.is_zero() {
            Decimal::ZERO
        } else {
            (self.entry_price * self.quantity) / self.leverage
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn open_buy() -> Position {
        Position {
            trade_id: "t1".into(),
            symbol: "BTC-PERP".into(),
            side: OrderSide::Buy,
            quantity: dec!(1),
            entry_price: dec!(100),
            leverage: dec!(20),
            entry_fee: dec!(0.1),
            state: PositionState::Open,
            open_timestamp: 0,
            close_timestamp: None,
            exit_price: None,
            realized_pnl: None,
        }
    }

    #[test]
    fn gross_pnl_applies_leverage_and_side() {
        let p = open_buy();
        assert_eq!(p.gross_pnl(dec!(102)), dec!(40)); // (102-100)*1*20
        let mut short = p.clone();
        short.side = OrderSide::Sell;
        assert_eq!(short.gross_pnl(dec!(98)), dec!(40));
    }

    #[test]
    fn unrealized_pnl_zero_once_closed() {
        let mut p = open_buy();
        p.state = PositionState::Closed;
        assert_eq!(p.unrealized_pnl(dec!(200)), Decimal::ZERO);
    }
}
