use super::context::SynthesisContext;
use super::synthesizer::{Signal, StrategyEngine};
use crate::domain::ports::LlmAdapter;
use async_trait::async_trait;
use std::sync::Arc;

/// LLM_ONLY mode (spec §4.E item 2): delegates entirely to the LLM Adapter
/// with a structured prompt built from indicators, multi-TF, order-book
/// fields, account state, position state, and recent trade stats.
pub struct LlmOnlyStrategy {
    llm: Arc<dyn LlmAdapter>,
}

impl LlmOnlyStrategy {
    pub fn new(llm: Arc<dyn LlmAdapter>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl StrategyEngine for LlmOnlyStrategy {
    async fn synthesize(&self, ctx: &SynthesisContext) -> anyhow::Result<Signal> {
        let prompt = build_prompt(ctx);
        match self.llm.ask(&prompt).await {
            Ok(d) => Ok(Signal {
                decision: d.decision,
                confidence: d.confidence,
                reasoning: d.reasoning,
            }),
            Err(err) => {
                tracing::warn!(symbol = %ctx.symbol, error = %err, "LLM adapter failed, treating tick as HOLD");
                Ok(Signal::hold(format!("LLM error: {err}")))
            }
        }
    }
}

/// Builds the structured prompt text consumed by the LLM Adapter
/// (spec §4.E item 2, §4.J).
pub(super) fn build_prompt(ctx: &SynthesisContext) -> String {
    format!(
        "symbol={symbol}\nprice={price}\nindicators={indicators:?}\nmulti_tf={multi_tf:?}\norder_book={order_book:?}\ndominant_trend={trend:?}\nhas_open_position={has_pos}\nopen_side={side:?}\naccount_balance={balance}\naccount_available={available}\nrecent_win_rate={win_rate:.2}\nrecent_trade_count={trade_count}\n\
Respond ONLY with a JSON object: {{\"decision\": \"BUY\"|\"SELL\"|\"HOLD\", \"confidence\": 0..1, \"reasoning\": string, \"suggested_stop_loss_pct\": number|null, \"suggested_take_profit_pct\": number|null}}",
        symbol = ctx.symbol,
        price = ctx.current_price,
        indicators = ctx.indicators,
        multi_tf = ctx.multi_tf,
        order_book = ctx.order_book,
        trend = ctx.dominant_trend,
        has_pos = ctx.has_open_position,
        side = ctx.open_position_side,
        balance = ctx.account_balance,
        available = ctx.account_available,
        win_rate = ctx.recent_win_rate,
        trade_count = ctx.recent_trade_count,
    )
}
