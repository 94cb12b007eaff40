use super::parsing::parse_llm_json;
use crate::domain::errors::LlmError;
use crate::domain::ports::{LlmAdapter, LlmDecision};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const MAX_RETRIES: u32 = 3;
const SYSTEM_PROMPT: &str = "You are an expert perpetual-futures trading analyst. Respond with valid JSON only, no markdown formatting.";

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: String,
}

/// Shared client for OpenAI and DeepSeek: identical chat-completions wire
/// shape (spec §4.J), grounded on the `llm_detector` regime adapter's
/// request/retry pattern.
pub struct OpenAiLikeProvider {
    client: reqwest::Client,
    api_key: String,
    api_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiLikeProvider {
    pub fn openai(api_key: String, model: String, temperature: f32, max_tokens: u32) -> Self {
        Self::new(
            api_key,
            "https://api.openai.com/v1/chat/completions".to_string(),
            model,
            temperature,
            max_tokens,
        )
    }

    pub fn deepseek(api_key: String, model: String, temperature: f32, max_tokens: u32) -> Self {
        Self::new(
            api_key,
            "https://api.deepseek.com/chat/completions".to_string(),
            model,
            temperature,
            max_tokens,
        )
    }

    fn new(api_key: String, api_url: String, model: String, temperature: f32, max_tokens: u32) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            api_url,
            model,
            temperature,
            max_tokens,
        }
    }
}

#[async_trait]
impl LlmAdapter for OpenAiLikeProvider {
    async fn ask(&self, prompt: &str) -> Result<LlmDecision, LlmError> {
        let request = ChatRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
        };

        let mut last_error = String::new();

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                let delay_ms = 1000u64 * 2u64.pow(attempt - 1);
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }

            let response = match self
                .client
                .post(&self.api_url)
                .header("Authorization", format!("Bearer {}", self.api_key))
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

            let parsed: ChatResponse = match response.json().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = format!("decode error: {e}");
                    continue;
                }
            };

            let text = match parsed.choices.first() {
                Some(choice) => choice.message.content.clone(),
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
