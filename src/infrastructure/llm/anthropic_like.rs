use super::parsing::parse_llm_json;
use crate::domain::errors::LlmError;
use crate::domain::ports::{LlmAdapter, LlmDecision};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const MAX_RETRIES: u32 = 3;
const ANTHROPIC_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const SYSTEM_PROMPT: &str = "You are an expert perpetual-futures trading analyst. Respond with valid JSON only, no markdown formatting.";

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    system: String,
    messages: Vec<MessageContent>,
}

#[derive(Debug, Serialize)]
struct MessageContent {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: String,
}

/// Client for the Anthropic messages wire shape (spec §4.J), distinct from
/// `OpenAiLikeProvider`'s chat-completions shape.
pub struct AnthropicLikeProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl AnthropicLikeProvider {
    pub fn new(api_key: String, model: String, temperature: f32, max_tokens: u32) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            model,
            temperature,
            max_tokens,
        }
    }
}

#[async_trait]
impl LlmAdapter for AnthropicLikeProvider {
    async fn ask(&self, prompt: &str) -> Result<LlmDecision, LlmError> {
        let request = MessagesRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system: SYSTEM_PROMPT.to_string(),
            messages: vec![MessageContent {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let mut last_error = String::new();

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay_ms = 1000u64 * 2u64.pow(attempt - 1);
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }

            let response = match self
                .client
                .post(ANTHROPIC_API_URL)
                .header("x-api-key", &self.api_key)
                .header("anthropic-version", ANTHROPIC_VERSION)
                .header("content-type", "application/json")
                .json(&request)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    last_error = format!("network error: {e}");
                    continue;
                }
            };

            if !response.status().is_success() {
                let status = response.status();
                let retriable = status.as_u16() == 429 || status.is_server_error();
                let body = response.text().await.unwrap_or_default();
                last_error = format!("{status}: {body}");
                if retriable {
                    continue;
                }
                return Err(LlmError::RequestFailed {
                    attempts: attempt + 1,
                    reason: last_error,
                });
            }

            let parsed: MessagesResponse = match response.json().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = format!("decode error: {e}");
                    continue;
                }
            };

            let text = match parsed.content.first() {
                Some(block) => block.text.clone(),
                None => return Err(LlmError::EmptyResponse),
            };

            return parse_llm_json(&text);
        }

        Err(LlmError::RequestFailed {
            attempts: MAX_RETRIES,
            reason: last_error,
        })
    }
}
