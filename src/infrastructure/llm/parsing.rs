use crate::domain::errors::LlmError;
use crate::domain::ports::LlmDecision;
use crate::domain::types::Decision;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct RawLlmResponse {
    decision: String,
    confidence: f64,
    reasoning: String,
    #[serde(default)]
    suggested_stop_loss_pct: Option<f64>,
    #[serde(default)]
    suggested_take_profit_pct: Option<f64>,
}

/// Strips a leading/trailing ```` ```json ```` or ```` ``` ```` fence, since
/// chat models routinely wrap JSON in markdown even when told not to
/// (grounded on the `llm_detector` regime adapter's fence-stripping).
pub fn strip_markdown_fence(text: &str) -> &str {
    let trimmed = text.trim();
    if let Some(rest) = trimmed.strip_prefix("```json") {
        rest.trim_end_matches("```").trim()
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        rest.trim_end_matches("```").trim()
    } else {
        trimmed
    }
}

/// Parses the synthesizer's expected JSON decision payload out of raw model
/// text, after fence-stripping (spec §4.J).
pub fn parse_llm_json(text: &str) -> Result<LlmDecision, LlmError> {
    let cleaned = strip_markdown_fence(text);
    if cleaned.is_empty() {
        return Err(LlmError::EmptyResponse);
    }

    let raw: RawLlmResponse =
        serde_json::from_str(cleaned).map_err(|e| LlmError::UnparseableJson(e.to_string()))?;

    let decision = match raw.decision.to_uppercase().as_str() {
        "BUY" => Decision::Buy,
        "SELL" => Decision::Sell,
        "HOLD" => Decision::Hold,
        other => {
            return Err(LlmError::SchemaViolation(format!(
                "unrecognized decision value: {other}"
            )))
        }
    };

    if !(0.0..=1.0).contains(&raw.confidence) {
        return Err(LlmError::SchemaViolation(format!(
            "confidence {} outside [0, 1]",
            raw.confidence
        )));
    }

    Ok(LlmDecision {
        decision,
        confidence: raw.confidence,
        reasoning: raw.reasoning,
        suggested_stop_loss_pct: raw.suggested_stop_loss_pct,
        suggested_take_profit_pct: raw.suggested_take_profit_pct,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_fence() {
        let text = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_markdown_fence(text), "{\"a\": 1}");
    }

    #[test]
    fn parses_well_formed_decision() {
        let text = r#"{"decision": "BUY", "confidence": 0.8, "reasoning": "strong momentum", "suggested_stop_loss_pct": 1.5, "suggested_take_profit_pct": 3.0}"#;
        let decision = parse_llm_json(text).unwrap();
        assert_eq!(decision.decision, Decision::Buy);
        assert_eq!(decision.confidence, 0.8);
    }

    #[test]
    fn rejects_confidence_out_of_range() {
        let text = r#"{"decision": "HOLD", "confidence": 1.5, "reasoning": "n/a"}"#;
        assert!(matches!(parse_llm_json(text), Err(LlmError::SchemaViolation(_))));
    }

    #[test]
    fn rejects_unparseable_text() {
        assert!(matches!(parse_llm_json("not json"), Err(LlmError::UnparseableJson(_))));
    }
}
