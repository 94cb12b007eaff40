use crate::domain::errors::LlmError;
use crate::domain::ports::{LlmAdapter, LlmDecision};
use crate::domain::types::Decision;
use async_trait::async_trait;
use tokio::sync::Mutex;

/// Deterministic `LlmAdapter` double for `LLM_ONLY`/`HYBRID` scenario tests:
/// returns a scripted sequence of decisions, one per call, repeating the
/// last entry once the script is exhausted.
pub struct MockLlmAdapter {
    script: Mutex<Vec<LlmDecision>>,
    fail_next: Mutex<bool>,
}

impl MockLlmAdapter {
    pub fn new(script: Vec<LlmDecision>) -> Self {
        Self {
            script: Mutex::new(script),
            fail_next: Mutex::new(false),
        }
    }

    pub fn always(decision: Decision, confidence: f64, reasoning: impl Into<String>) -> Self {
        Self::new(vec![LlmDecision {
            decision,
            confidence,
            reasoning: reasoning.into(),
            suggested_stop_loss_pct: None,
            suggested_take_profit_pct: None,
        }])
    }

    pub async fn fail_next_call(&self) {
        *self.fail_next.lock().await = true;
    }
}

#[async_trait]
impl LlmAdapter for MockLlmAdapter {
    async fn ask(&self, _prompt: &str) -> Result<LlmDecision, LlmError> {
        if std::mem::take(&mut *self.fail_next.lock().await) {
            return Err(LlmError::RequestFailed {
                attempts: 1,
                reason: "scripted failure".to_string(),
            });
        }

        let mut script = self.script.lock().await;
        if script.is_empty() {
            return Ok(LlmDecision {
                decision: Decision::Hold,
                confidence: 0.0,
                reasoning: "no scripted response".to_string(),
                suggested_stop_loss_pct: None,
                suggested_take_profit_pct: None,
            });
        }
        let next = if script.len() > 1 {
            script.remove(0)
        } else {
            script[0].clone()
        };
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_scripted_decisions_in_order() {
        let mock = MockLlmAdapter::new(vec![
            LlmDecision {
                decision: Decision::Buy,
                confidence: 0.9,
                reasoning: "first".to_string(),
                suggested_stop_loss_pct: None,
                suggested_take_profit_pct: None,
            },
            LlmDecision {
                decision: Decision::Hold,
                confidence: 0.0,
                reasoning: "second".to_string(),
                suggested_stop_loss_pct: None,
                suggested_take_profit_pct: None,
            },
        ]);

        let first = mock.ask("ignored").await.unwrap();
        assert_eq!(first.decision, Decision::Buy);
        let second = mock.ask("ignored").await.unwrap();
        assert_eq!(second.decision, Decision::Hold);
    }

    #[tokio::test]
    async fn fail_next_call_forces_one_error() {
        let mock = MockLlmAdapter::always(Decision::Buy, 0.9, "ok");
        mock.fail_next_call().await;
        assert!(mock.ask("ignored").await.is_err());
        assert!(mock.ask("ignored").await.is_ok());
    }
}
