use super::context::SynthesisContext;
use super::synthesizer::{Signal, StrategyEngine};
use crate::domain::orderbook::MarketState;
use crate::domain::types::Decision;
use async_trait::async_trait;

/// ORDER_BOOK mode (spec §4.E item 1): derives side from imbalance sign,
/// gated by market state, then applies the counter-trend veto and
/// trend-alignment bonus via `SynthesisContext::trend_adjust`.
pub struct OrderBookStrategy;

#[async_trait]
impl StrategyEngine for OrderBookStrategy {
    async fn synthesize(&self, ctx: &SynthesisContext) -> anyhow::Result<Signal> {
        let ob = &ctx.order_book;

        if ob.market_state == MarketState::Consolidation || ob.absorption_detected {
            return Ok(Signal::hold("consolidation or absorption detected"));
        }

        if ob.imbalance_ratio.abs() < ctx.overlay.weak_imbalance_threshold {
            return Ok(Signal::hold("imbalance below weak threshold"));
        }

        let raw_decision = if ob.imbalance_ratio > 0.0 {
            Decision::Buy
        } else {
            Decision::Sell
        };

        let mut confidence = ob.imbalance_ratio.abs().min(1.0);
        if ob.breakout_confirmed {
            confidence = (confidence + 0.1).min(1.0);
        }
        if ob.low_volume_node.is_some() {
            // Vacuum zones increase momentum expectation (spec §4.E item 1).
            confidence = (confidence + 0.05).min(1.0);
        }

        let (decision, confidence) = ctx.trend_adjust(raw_decision, confidence);

        if decision == Decision::Hold {
            return Ok(Signal::hold("counter-trend veto or neutral-trend confidence floor"));
        }

        Ok(Signal {
            decision,
            confidence,
            reasoning: format!(
                "order-book imbalance {:.2} with {} market state",
                ob.imbalance_ratio, ob.market_state
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::orderbook::OrderBookAnalysis;
    use crate::domain::regime::ParameterOverlay;
    use crate::domain::types::{EmaTrend, IndicatorSet};
    use rust_decimal_macros::dec;

    fn ctx_with(market_state: MarketState, imbalance: f64, trend: EmaTrend) -> SynthesisContext {
        SynthesisContext {
            symbol: "BTC-PERP".into(),
            current_price: dec!(100),
            indicators: IndicatorSet::default(),
            multi_tf: None,
            order_book: OrderBookAnalysis {
                symbol: "BTC-PERP".into(),
                imbalance_ratio: imbalance,
                spread_pct: 0.01,
                bid_pressure: 0.6,
                ask_pressure: 0.4,
                liquidity_score: 50.0,
                nearest_bid_wall: None,
                nearest_ask_wall: None,
                market_state,
                aggression_score: 0.2,
                absorption_detected: false,
                breakout_confirmed: false,
                low_volume_node: None,
            },
            dominant_trend: trend,
            has_open_position: false,
            open_position_side: None,
            account_balance: dec!(1000),
            account_available: dec!(1000),
            recent_win_rate: 0.5,
            recent_trade_count: 0,
            contrarian: false,
            overlay: ParameterOverlay::static_default(),
        }
    }

    #[tokio::test]
    async fn consolidation_forces_hold() {
        let strat = OrderBookStrategy;
        let signal = strat
            .synthesize(&ctx_with(MarketState::Consolidation, 0.5, EmaTrend::Bullish))
            .await
            .unwrap();
        assert_eq!(signal.decision, Decision::Hold);
    }

    #[tokio::test]
    async fn counter_trend_signal_is_vetoed() {
        let strat = OrderBookStrategy;
        let signal = strat
            .synthesize(&ctx_with(MarketState::ImbalancedUp, 0.5, EmaTrend::Bearish))
            .await
            .unwrap();
        assert_eq!(signal.decision, Decision::Hold);
    }

    #[tokio::test]
    async fn aligned_trend_signal_passes_with_bonus() {
        let strat = OrderBookStrategy;
        let signal = strat
            .synthesize(&ctx_with(MarketState::ImbalancedUp, 0.5, EmaTrend::Bullish))
            .await
            .unwrap();
        assert_eq!(signal.decision, Decision::Buy);
        assert!(signal.confidence > 0.5);
    }
}
