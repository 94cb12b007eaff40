use crate::application::strategy::StrategyMode;
use crate::domain::errors::ConfigError;
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    OpenAi,
    DeepSeek,
    Anthropic,
}

impl FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(LlmProvider::OpenAi),
            "deepseek" => Ok(LlmProvider::DeepSeek),
            "anthropic" => Ok(LlmProvider::Anthropic),
            other => Err(ConfigError::UnknownLlmProvider(other.to_string())),
        }
    }
}

fn strategy_mode_from_str(s: &str) -> Result<StrategyMode, ConfigError> {
    match s.to_uppercase().as_str() {
        "ORDER_BOOK" => Ok(StrategyMode::OrderBook),
        "LLM_ONLY" => Ok(StrategyMode::LlmOnly),
        "HYBRID" => Ok(StrategyMode::Hybrid),
        "WAVE_SURFING" => Ok(StrategyMode::WaveSurfing),
        other => Err(ConfigError::UnknownStrategyMode(other.to_string())),
    }
}

/// Process-wide configuration (spec §6). Grounded on the teacher's
/// `Config::from_env` shape (one flat struct, `env::var` with explicit
/// defaults, `FromStr` for enum-ish knobs) but scoped to this domain's
/// knob list rather than carrying the teacher's broker/asset-class options.
#[derive(Debug, Clone)]
pub struct Config {
    // Exchange
    pub exchange_api_url: String,
    pub exchange_api_key: String,
    pub exchange_secret: String,
    pub exchange_wallet_address: String,

    // LLM
    pub llm_provider: LlmProvider,
    pub llm_model: String,
    pub llm_api_key: String,
    pub llm_temperature: f32,
    pub llm_max_tokens: u32,

    // Trading
    pub symbols: Vec<String>,
    pub tick_interval_seconds: u64,
    pub confidence_threshold: f64,
    pub starting_balance: Decimal,
    pub position_size_percentage: Decimal,
    pub max_positions: usize,
    pub leverage_min: Decimal,
    pub leverage_max: Decimal,
    pub strategy_mode: StrategyMode,
    pub contrarian: bool,

    // Risk
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
    pub max_daily_trades: u32,
    pub max_daily_loss: Decimal,

    // System
    pub log_level: String,
    pub log_dir: String,
    pub enable_live_trading: bool,
    pub dry_run: bool,
    pub enable_scheduler: bool,
    pub trading_start_hour: u32,
    pub trading_end_hour: u32,
    pub web_port: u16,
    pub database_url: String,
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("invalid value for {key}: {e}")),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let exchange_api_url = env_or("EXCHANGE_API_URL", "https://api.perp.exchange");
        let exchange_api_key = env::var("EXCHANGE_API_KEY").unwrap_or_default();
        let exchange_secret = env::var("EXCHANGE_SECRET").unwrap_or_default();
        let exchange_wallet_address = env::var("EXCHANGE_WALLET_ADDRESS").unwrap_or_default();

        let llm_provider_str = env_or("LLM_PROVIDER", "openai");
        let llm_provider =
            LlmProvider::from_str(&llm_provider_str).context("failed to parse LLM_PROVIDER")?;
        let llm_model = env_or(
            "LLM_MODEL",
            match llm_provider {
                LlmProvider::OpenAi => "gpt-4o-mini",
                LlmProvider::DeepSeek => "deepseek-chat",
                LlmProvider::Anthropic => "claude-3-5-sonnet-20241022",
            },
        );
        let llm_api_key = env::var("LLM_API_KEY").unwrap_or_default();
        let llm_temperature = env_parse("LLM_TEMPERATURE", 0.3f32)?;
        let llm_max_tokens = env_parse("LLM_MAX_TOKENS", 800u32)?;

        let symbols_str = env_or("SYMBOLS", "BTC-PERP");
        let symbols: Vec<String> = symbols_str.split(',').map(|s| s.trim().to_string()).collect();

        let tick_interval_seconds = env_parse("TICK_INTERVAL_SECONDS", 30u64)?;
        let confidence_threshold = env_parse("CONFIDENCE_THRESHOLD", 0.70f64)?;
        let starting_balance = env_parse("STARTING_BALANCE", Decimal::from(10_000))?;
        let position_size_percentage = env_parse("POSITION_SIZE_PERCENTAGE", Decimal::new(10, 2))?;
        let max_positions = env_parse("MAX_POSITIONS", 5usize)?;
        let leverage_min = env_parse("LEVERAGE_MIN", Decimal::from(1))?;
        let leverage_max = env_parse("LEVERAGE_MAX", Decimal::from(20))?;
        let strategy_mode_str = env_or("STRATEGY_MODE", "ORDER_BOOK");
        let strategy_mode = strategy_mode_from_str(&strategy_mode_str)?;
        let contrarian = env_parse("CONTRARIAN", false)?;

        let stop_loss_pct = env_parse("STOP_LOSS_PCT", 0.02f64)?;
        let take_profit_pct = env_parse("TAKE_PROFIT_PCT", 0.04f64)?;
        let max_daily_trades = env_parse("MAX_DAILY_TRADES", 15u32)?;
        let max_daily_loss = env_parse("MAX_DAILY_LOSS", Decimal::from(100))?;

        let log_level = env_or("LOG_LEVEL", "info");
        let log_dir = env_or("LOG_DIR", "./logs");
        let enable_live_trading = env_parse("ENABLE_LIVE_TRADING", false)?;
        let dry_run = env_parse("DRY_RUN", true)?;
        let enable_scheduler = env_parse("ENABLE_SCHEDULER", true)?;
        let trading_start_hour = env_parse("TRADING_START_HOUR", 0u32)?;
        let trading_end_hour = env_parse("TRADING_END_HOUR", 24u32)?;
        let web_port = env_parse("WEB_PORT", 8080u16)?;
        let database_url = env_or("DATABASE_URL", "sqlite://./data/agent.db");

        if enable_live_trading && (exchange_api_key.is_empty() || exchange_secret.is_empty()) {
            return Err(ConfigError::MissingSecret(
                "EXCHANGE_API_KEY/EXCHANGE_SECRET required when ENABLE_LIVE_TRADING=true".to_string(),
            )
            .into());
        }
        if enable_live_trading && llm_api_key.is_empty() && strategy_mode != StrategyMode::OrderBook {
            return Err(ConfigError::MissingSecret(
                "LLM_API_KEY required for LLM_ONLY/HYBRID strategy modes".to_string(),
            )
            .into());
        }

        Ok(Self {
            exchange_api_url,
            exchange_api_key,
            exchange_secret,
            exchange_wallet_address,
            llm_provider,
            llm_model,
            llm_api_key,
            llm_temperature,
            llm_max_tokens,
            symbols,
            tick_interval_seconds,
            confidence_threshold,
            starting_balance,
            position_size_percentage,
            max_positions,
            leverage_min,
            leverage_max,
            strategy_mode,
            contrarian,
            stop_loss_pct,
            take_profit_pct,
            max_daily_trades,
            max_daily_loss,
            log_level,
            log_dir,
            enable_live_trading,
            dry_run,
            enable_scheduler,
            trading_start_hour,
            trading_end_hour,
            web_port,
            database_url,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn llm_provider_parses_known_values() {
        assert_eq!(LlmProvider::from_str("openai").unwrap(), LlmProvider::OpenAi);
        assert_eq!(LlmProvider::from_str("DeepSeek").unwrap(), LlmProvider::DeepSeek);
        assert!(LlmProvider::from_str("bogus").is_err());
    }

    #[test]
    fn strategy_mode_parses_known_values() {
        assert_eq!(strategy_mode_from_str("hybrid").unwrap(), StrategyMode::Hybrid);
        assert!(strategy_mode_from_str("nonsense").is_err());
    }
}
