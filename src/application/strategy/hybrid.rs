use super::context::SynthesisContext;
use super::llm_only::build_prompt;
use super::order_book::OrderBookStrategy;
use super::synthesizer::{Signal, StrategyEngine};
use crate::domain::ports::LlmAdapter;
use crate::domain::types::Decision;
use async_trait::async_trait;
use std::sync::Arc;

/// HYBRID mode (spec §4.E item 3): order-book signal first, short-circuits
/// on HOLD; otherwise the LLM confirms or rejects. Agreement blends
/// confidence 0.6·OB + 0.4·LLM; disagreement forces HOLD.
pub struct HybridStrategy {
    llm: Arc<dyn LlmAdapter>,
}

impl HybridStrategy {
    pub fn new(llm: Arc<dyn LlmAdapter>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl StrategyEngine for HybridStrategy {
    async fn synthesize(&self, ctx: &SynthesisContext) -> anyhow::Result<Signal> {
        let ob_signal = OrderBookStrategy.synthesize(ctx).await?;
        if ob_signal.decision == Decision::Hold {
            return Ok(ob_signal);
        }

        let prompt = build_prompt(ctx);
        let llm_decision = match self.llm.ask(&prompt).await {
            Ok(d) => d,
            Err(err) => {
                tracing::warn!(symbol = %ctx.symbol, error = %err, "LLM confirmation failed, treating tick as HOLD");
                return Ok(Signal::hold(format!("LLM confirmation error: {err}")));
            }
        };

        if llm_decision.decision != ob_signal.decision {
            return Ok(Signal::hold(
                "order-book and LLM signals disagree",
            ));
        }

        Ok(Signal {
            decision: ob_signal.decision,
            confidence: 0.6 * ob_signal.confidence + 0.4 * llm_decision.confidence,
            reasoning: format!(
                "order-book ({}) confirmed by LLM ({})",
                ob_signal.reasoning, llm_decision.reasoning
            ),
        })
    }
}
