mod anthropic_like;
mod mock;
mod openai_like;
mod parsing;

pub use anthropic_like::AnthropicLikeProvider;
pub use mock::MockLlmAdapter;
pub use openai_like::OpenAiLikeProvider;
pub use parsing::parse_llm_json;
