use crate::application::execution::ExecutionGateway;
use crate::application::filters::{
    CooldownFilter, Filter, FilterPipeline, FundingEventFilter, ReversalCooldownFilter, SessionFilter,
    SizingFilter, StabilityFilter, VolatilityFilter, VolumeAnomalyFilter,
};
use crate::application::ledger::PositionLedger;
use crate::application::orchestrator::{Orchestrator, OrchestratorConfig};
use crate::application::regime::RegimeManager;
use crate::application::strategy::{StrategyMode, Synthesizer};
use crate::config::{Config, LlmProvider};
use crate::domain::ports::{BacktestRunner, ExecutionClient, LlmAdapter, MarketDataProvider};
use crate::domain::regime::RegimeThresholds;
use crate::infrastructure::backtest::NullBacktestRunner;
use crate::infrastructure::exchange::ExchangeClient;
use crate::infrastructure::llm::{AnthropicLikeProvider, OpenAiLikeProvider};
use crate::infrastructure::persistence::{
    Database, SqliteBalanceRepository, SqliteDecisionRepository, SqliteTradeRepository,
};
use crate::infrastructure::spoofing::NullSpoofingClassifier;
use anyhow::Result;
use sqlx::SqlitePool;
use std::sync::Arc;

/// Everything a running process needs: the orchestrator plus the handles
/// a dashboard server or metrics reporter attach to (spec §9's
/// "singletons -> explicit collaborators" redesign flag). Grounded on the
/// teacher's `application::system::Application::build`.
pub struct Runtime {
    pub orchestrator: Arc<Orchestrator>,
    pub pool: SqlitePool,
    pub config: Config,
    pub backtest: Arc<dyn BacktestRunner>,
}

fn build_llm_adapter(config: &Config) -> Arc<dyn LlmAdapter> {
    match config.llm_provider {
        LlmProvider::OpenAi => Arc::new(OpenAiLikeProvider::openai(
            config.llm_api_key.clone(),
            config.llm_model.clone(),
            config.llm_temperature,
            config.llm_max_tokens,
        )),
        LlmProvider::DeepSeek => Arc::new(OpenAiLikeProvider::deepseek(
            config.llm_api_key.clone(),
            config.llm_model.clone(),
            config.llm_temperature,
            config.llm_max_tokens,
        )),
        LlmProvider::Anthropic => Arc::new(AnthropicLikeProvider::new(
            config.llm_api_key.clone(),
            config.llm_model.clone(),
            config.llm_temperature,
            config.llm_max_tokens,
        )),
    }
}

fn build_filter_pipeline() -> FilterPipeline {
    let filters: Vec<Box<dyn Filter>> = vec![
        Box::new(StabilityFilter),
        Box::new(ReversalCooldownFilter),
        Box::new(CooldownFilter::default()),
        Box::new(FundingEventFilter),
        Box::new(VolatilityFilter::default()),
        Box::new(VolumeAnomalyFilter::default()),
        Box::new(SessionFilter),
        Box::new(SizingFilter),
    ];
    FilterPipeline::new(filters)
}

impl Runtime {
    pub async fn build(config: Config) -> Result<Self> {
        let db = Database::new(&config.database_url).await?;
        let pool = db.pool.clone();

        let exchange = Arc::new(ExchangeClient::new(
            config.exchange_api_url.clone(),
            config.exchange_api_key.clone(),
            config.exchange_secret.clone(),
            config.exchange_wallet_address.clone(),
        ));
        let market: Arc<dyn MarketDataProvider> = exchange.clone();
        let execution_client: Arc<dyn ExecutionClient> = exchange.clone();

        if config.enable_live_trading {
            for symbol in &config.symbols {
                if let Err(err) = execution_client.set_leverage(symbol, config.leverage_max).await {
                    tracing::warn!(%symbol, %err, "failed to set exchange leverage");
                }
            }
        }

        let taker_fee_rate = rust_decimal_macros::dec!(0.0004);
        let execution = Arc::new(ExecutionGateway::new(
            execution_client,
            rust_decimal_macros::dec!(0.0005),
            taker_fee_rate,
        ));

        let ledger = Arc::new(PositionLedger::new(config.starting_balance, config.max_positions));
        let regime = Arc::new(RegimeManager::new(RegimeThresholds::default()));

        let llm = if config.strategy_mode == StrategyMode::OrderBook {
            None
        } else {
            Some(build_llm_adapter(&config))
        };
        let spoofing = if config.strategy_mode == StrategyMode::WaveSurfing {
            Some(Arc::new(NullSpoofingClassifier::new()) as Arc<dyn crate::domain::ports::SpoofingClassifier>)
        } else {
            None
        };
        let synthesizer = Arc::new(Synthesizer::new(config.strategy_mode, llm, spoofing)?);

        let filters = Arc::new(build_filter_pipeline());

        let trades = Arc::new(SqliteTradeRepository::new(pool.clone()));
        let decisions = Arc::new(SqliteDecisionRepository::new(pool.clone()));
        let balances = Arc::new(SqliteBalanceRepository::new(pool.clone()));

        let orchestrator_config = OrchestratorConfig {
            symbols: config.symbols.clone(),
            tick_interval: std::time::Duration::from_secs(config.tick_interval_seconds),
            dry_run: config.dry_run || !config.enable_live_trading,
            strategy_mode: config.strategy_mode,
            contrarian: config.contrarian,
            leverage: config.leverage_max,
            position_size_pct: config.position_size_percentage,
            max_open_positions: config.max_positions,
            base_min_confidence: config.confidence_threshold,
            taker_fee_rate,
            daily_trade_cap: config.max_daily_trades,
            daily_loss_limit: config.max_daily_loss,
            ..OrchestratorConfig::default()
        };

        let orchestrator = Arc::new(Orchestrator::new(
            orchestrator_config,
            market,
            execution,
            ledger,
            regime,
            synthesizer,
            filters,
            decisions,
            trades,
            balances,
        ));

        let backtest: Arc<dyn BacktestRunner> = Arc::new(NullBacktestRunner::new());

        Ok(Self { orchestrator, pool, config, backtest })
    }
}
