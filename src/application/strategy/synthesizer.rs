use super::context::SynthesisContext;
use super::hybrid::HybridStrategy;
use super::llm_only::LlmOnlyStrategy;
use super::order_book::OrderBookStrategy;
use super::wave_surfing::WaveSurfingStrategy;
use crate::domain::ports::{LlmAdapter, SpoofingClassifier};
use crate::domain::types::Decision;
use async_trait::async_trait;
use std::sync::Arc;

/// Uniform output shape across all strategy modes (spec §4.E).
#[derive(Debug, Clone)]
pub struct Signal {
    pub decision: Decision,
    pub confidence: f64,
    pub reasoning: String,
}

impl Signal {
    pub fn hold(reasoning: impl Into<String>) -> Self {
        Self {
            decision: Decision::Hold,
            confidence: 0.0,
            reasoning: reasoning.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyMode {
    OrderBook,
    LlmOnly,
    Hybrid,
    WaveSurfing,
}

/// A single synthesis strategy. Implementations are pure with respect to
/// the context except for LLM-backed modes, which suspend on I/O (spec §5).
#[async_trait]
pub trait StrategyEngine: Send + Sync {
    async fn synthesize(&self, ctx: &SynthesisContext) -> anyhow::Result<Signal>;
}

/// Dispatches to the configured mode's boxed engine, then applies the
/// contrarian switch as a uniform post-processing step (spec §4.E),
/// generalizing the teacher's `StrategyFactory::create` mode-to-boxed-strategy
/// pattern.
pub struct Synthesizer {
    engine: Box<dyn StrategyEngine>,
}

impl Synthesizer {
    pub fn new(
        mode: StrategyMode,
        llm: Option<Arc<dyn LlmAdapter>>,
        spoofing: Option<Arc<dyn SpoofingClassifier>>,
    ) -> anyhow::Result<Self> {
        let engine: Box<dyn StrategyEngine> = match mode {
            StrategyMode::OrderBook => Box::new(OrderBookStrategy),
            StrategyMode::LlmOnly => {
                let llm = llm.ok_or_else(|| anyhow::anyhow!("LLM_ONLY mode requires an LlmAdapter"))?;
                Box::new(LlmOnlyStrategy::new(llm))
            }
            StrategyMode::Hybrid => {
                let llm = llm.ok_or_else(|| anyhow::anyhow!("HYBRID mode requires an LlmAdapter"))?;
                Box::new(HybridStrategy::new(llm))
            }
            StrategyMode::WaveSurfing => {
                let spoofing = spoofing
                    .ok_or_else(|| anyhow::anyhow!("WAVE_SURFING mode requires a SpoofingClassifier"))?;
                Box::new(WaveSurfingStrategy::new(spoofing))
            }
        };
        Ok(Self { engine })
    }

    pub async fn synthesize(&self, ctx: &SynthesisContext) -> anyhow::Result<Signal> {
        let signal = self.engine.synthesize(ctx).await?;
        let decision = ctx.apply_contrarian(signal.decision);
        Ok(Signal { decision, ..signal })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::orderbook::{MarketState, OrderBookAnalysis};
    use crate::domain::regime::ParameterOverlay;
    use crate::domain::types::{EmaTrend, IndicatorSet};
    use rust_decimal_macros::dec;

    fn base_ctx() -> SynthesisContext {
        SynthesisContext {
            symbol: "BTC-PERP".into(),
            current_price: dec!(100),
            indicators: IndicatorSet::default(),
            multi_tf: None,
            order_book: OrderBookAnalysis {
                symbol: "BTC-PERP".into(),
                imbalance_ratio: 0.5,
                spread_pct: 0.01,
                bid_pressure: 0.8,
                ask_pressure: 0.2,
                liquidity_score: 80.0,
                nearest_bid_wall: None,
                nearest_ask_wall: None,
                market_state: MarketState::ImbalancedUp,
                aggression_score: 0.6,
                absorption_detected: false,
                breakout_confirmed: true,
                low_volume_node: None,
            },
            dominant_trend: EmaTrend::Bullish,
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
    async fn order_book_mode_produces_buy_on_strong_imbalance() {
        let synth = Synthesizer::new(StrategyMode::OrderBook, None, None).unwrap();
        let signal = synth.synthesize(&base_ctx()).await.unwrap();
        assert_eq!(signal.decision, Decision::Buy);
    }

    #[tokio::test]
    async fn contrarian_switch_inverts_buy_to_sell() {
        let synth = Synthesizer::new(StrategyMode::OrderBook, None, None).unwrap();
        let mut ctx = base_ctx();
        ctx.contrarian = true;
        let signal = synth.synthesize(&ctx).await.unwrap();
        assert_eq!(signal.decision, Decision::Sell);
    }
}
