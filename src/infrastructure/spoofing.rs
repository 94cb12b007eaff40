use crate::domain::ports::{SpoofingBias, SpoofingClassifier};
use crate::domain::types::OrderSide;
use async_trait::async_trait;
use tokio::sync::Mutex;

/// Stub `SpoofingClassifier` for the experimental WAVE_SURFING mode (spec
/// §4.E, §9): the spec treats a production anti-spoofing detector as out of
/// scope and only requires the trait plus a mock. Returns no bias unless a
/// test scripts one with `set_bias`.
#[derive(Default)]
pub struct NullSpoofingClassifier {
    bias: Mutex<Option<(OrderSide, f64)>>,
}

impl NullSpoofingClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_bias(&self, side: OrderSide, confidence: f64) {
        *self.bias.lock().await = Some((side, confidence));
    }

    pub async fn clear_bias(&self) {
        *self.bias.lock().await = None;
    }
}

#[async_trait]
impl SpoofingClassifier for NullSpoofingClassifier {
    async fn classify(&self, _symbol: &str) -> SpoofingBias {
        match *self.bias.lock().await {
            Some((side, confidence)) => SpoofingBias {
                side: Some(side),
                confidence,
            },
            None => SpoofingBias {
                side: None,
                confidence: 0.0,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn defaults_to_no_bias() {
        let classifier = NullSpoofingClassifier::new();
        let bias = classifier.classify("BTC-PERP").await;
        assert!(bias.side.is_none());
    }

    #[tokio::test]
    async fn scripted_bias_is_returned() {
        let classifier = NullSpoofingClassifier::new();
        classifier.set_bias(OrderSide::Buy, 0.8).await;
        let bias = classifier.classify("BTC-PERP").await;
        assert_eq!(bias.side, Some(OrderSide::Buy));
        assert_eq!(bias.confidence, 0.8);
    }
}
