use super::context::SynthesisContext;
use super::synthesizer::{Signal, StrategyEngine};
use crate::domain::ports::SpoofingClassifier;
use crate::domain::types::Decision;
use async_trait::async_trait;
use std::sync::Arc;

/// Experimental WAVE_SURFING mode (spec §4.E): consumes an anti-spoofing
/// channel classifying disappearing quotes and emits a directional bias
/// with its own confidence, sharing the standard `Signal` shape.
pub struct WaveSurfingStrategy {
    classifier: Arc<dyn SpoofingClassifier>,
}

impl WaveSurfingStrategy {
    pub fn new(classifier: Arc<dyn SpoofingClassifier>) -> Self {
        Self { classifier }
    }
}

#[async_trait]
impl StrategyEngine for WaveSurfingStrategy {
    async fn synthesize(&self, ctx: &SynthesisContext) -> anyhow::Result<Signal> {
        let bias = self.classifier.classify(&ctx.symbol).await;
        let decision = match bias.side {
            Some(side) => Decision::from(side),
            None => Decision::Hold,
        };
        if decision == Decision::Hold {
            return Ok(Signal::hold("no spoofing bias detected"));
        }
        Ok(Signal {
            decision,
            confidence: bias.confidence,
            reasoning: "anti-spoofing classifier bias".into(),
        })
    }
}
