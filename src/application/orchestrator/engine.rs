use super::events::DashboardEvent;
use crate::application::execution::ExecutionGateway;
use crate::application::filters::{FilterContext, FilterPipeline};
use crate::application::indicators::{self, IndicatorParams};
use crate::application::ledger::PositionLedger;
use crate::application::orderbook::{OrderBookAnalyzer, OrderBookParams};
use crate::application::regime::RegimeManager;
use crate::application::strategy::{Signal, StrategyMode, SynthesisContext, Synthesizer};
use crate::domain::decision::TradeDecisionRecord;
use crate::domain::errors::LedgerViolation;
use crate::domain::ports::{
    BalanceRepository, DecisionRepository, MarketDataProvider, OrderOutcome, PriceCache, TradeRepository,
};
use crate::domain::position::{Position, PositionState};
use crate::domain::signal::{ReversalTracker, SignalHistory, SignalObservation};
use crate::domain::types::{Decision, IndicatorSet, OrderSide};
use chrono::Utc;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, watch, Mutex};
use tokio::task::JoinSet;
use tracing::{info, warn};

/// Knobs driving the per-tick pipeline (spec §4.I, §6). Values follow the
/// spec's worked examples (S1/S5/S6) where given; the rest are sane,
/// configurable defaults per the note in spec's Redesign Flags against
/// baking permissive constants in.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub symbols: Vec<String>,
    pub tick_interval: std::time::Duration,
    pub dry_run: bool,
    pub strategy_mode: StrategyMode,
    pub contrarian: bool,
    pub leverage: Decimal,
    pub position_size_pct: Decimal,
    pub max_open_positions: usize,
    pub stability_n: usize,
    pub quick_exit_n: usize,
    pub quick_exit_min_confidence: f64,
    pub reversal_max_per_hour: usize,
    pub signal_window_millis: i64,
    pub preliminary_confidence: f64,
    pub base_min_confidence: f64,
    pub hybrid_confidence_bonus: f64,
    pub taker_fee_rate: Decimal,
    pub execution_epsilon: Decimal,
    pub daily_trade_cap: u32,
    pub daily_loss_limit: Decimal,
    pub candle_interval: String,
    pub candle_limit: usize,
    pub multi_tf_interval: String,
    pub multi_tf_candle_limit: usize,
    pub order_book_depth: usize,
    pub recent_trade_sample: usize,
    pub tick_deadline: std::time::Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            symbols: vec!["BTC-PERP".to_string()],
            tick_interval: std::time::Duration::from_secs(30),
            dry_run: true,
            strategy_mode: StrategyMode::OrderBook,
            contrarian: false,
            leverage: Decimal::from(20),
            position_size_pct: Decimal::new(10, 2),
            max_open_positions: 5,
            stability_n: 3,
            quick_exit_n: 3,
            quick_exit_min_confidence: 0.60,
            reversal_max_per_hour: 3,
            signal_window_millis: 30_000,
            preliminary_confidence: 0.6,
            base_min_confidence: 0.70,
            hybrid_confidence_bonus: 0.05,
            taker_fee_rate: Decimal::new(4, 4),
            execution_epsilon: Decimal::new(5, 4),
            daily_trade_cap: 15,
            daily_loss_limit: Decimal::from(100),
            candle_interval: "1m".to_string(),
            candle_limit: 60,
            multi_tf_interval: "5m".to_string(),
            multi_tf_candle_limit: 60,
            order_book_depth: 20,
            recent_trade_sample: 20,
            tick_deadline: std::time::Duration::from_secs(30),
        }
    }
}

impl OrchestratorConfig {
    fn effective_min_confidence(&self) -> f64 {
        match self.strategy_mode {
            StrategyMode::Hybrid => self.base_min_confidence + self.hybrid_confidence_bonus,
            _ => self.base_min_confidence,
        }
    }
}

/// Daily trade-cap and loss-limit bookkeeping (spec §4.I step 1), reset at
/// UTC day boundaries.
#[derive(Debug, Clone, Copy)]
pub struct DailyCounters {
    day: chrono::NaiveDate,
    trades: u32,
    realized_pnl: Decimal,
}

impl DailyCounters {
    fn new(now: chrono::DateTime<Utc>) -> Self {
        Self {
            day: now.date_naive(),
            trades: 0,
            realized_pnl: Decimal::ZERO,
        }
    }

    fn roll(&mut self, now: chrono::DateTime<Utc>) {
        if now.date_naive() != self.day {
            self.day = now.date_naive();
            self.trades = 0;
            self.realized_pnl = Decimal::ZERO;
        }
    }

    fn record_pnl(&mut self, realized_pnl: Decimal) {
        self.realized_pnl += realized_pnl;
    }

    fn record_trade(&mut self) {
        self.trades += 1;
    }
}

/// Per-symbol mutable state, touched only by that symbol's serialized tick
/// (spec §5, §9): signal stability ring, reversal cap tracker, and the
/// timestamp of the last executed trade for the cooldown filter.
struct SymbolState {
    history: SignalHistory,
    reversals: ReversalTracker,
    last_trade_millis: Option<i64>,
}

impl SymbolState {
    fn new(window_millis: i64) -> Self {
        Self {
            history: SignalHistory::new(window_millis),
            reversals: ReversalTracker::new(),
            last_trade_millis: None,
        }
    }
}

/// Outcome of one symbol's tick, returned for logging/tests.
#[derive(Debug, Clone)]
pub struct TickOutcome {
    pub symbol: String,
    pub record: TradeDecisionRecord,
}

/// Drives the trading loop: fetches market state, synthesizes a signal, gates
/// it through the filter stack, reconciles with the position ledger, and
/// executes surviving decisions (spec §4.I). Generalizes the teacher's
/// `MarketScanner`/`Application::start` interval-loop-plus-fan-out pattern
/// to a per-symbol `JoinSet` of independent serialized ticks.
pub struct Orchestrator {
    config: OrchestratorConfig,
    market: Arc<dyn MarketDataProvider>,
    execution: Arc<ExecutionGateway>,
    ledger: Arc<PositionLedger>,
    regime: Arc<RegimeManager>,
    synthesizer: Arc<Synthesizer>,
    filters: Arc<FilterPipeline>,
    indicator_params: IndicatorParams,
    orderbook: Mutex<OrderBookAnalyzer>,
    decisions: Arc<dyn DecisionRepository>,
    trades: Arc<dyn TradeRepository>,
    balances: Arc<dyn BalanceRepository>,
    events: broadcast::Sender<DashboardEvent>,
    symbol_state: Mutex<HashMap<String, SymbolState>>,
    daily: Mutex<Option<DailyCounters>>,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: OrchestratorConfig,
        market: Arc<dyn MarketDataProvider>,
        execution: Arc<ExecutionGateway>,
        ledger: Arc<PositionLedger>,
        regime: Arc<RegimeManager>,
        synthesizer: Arc<Synthesizer>,
        filters: Arc<FilterPipeline>,
        decisions: Arc<dyn DecisionRepository>,
        trades: Arc<dyn TradeRepository>,
        balances: Arc<dyn BalanceRepository>,
    ) -> Self {
        let order_book_depth = config.order_book_depth;
        let (tx, _rx) = broadcast::channel(1024);
        Self {
            config,
            market,
            execution,
            ledger,
            regime,
            synthesizer,
            filters,
            indicator_params: IndicatorParams::default(),
            orderbook: Mutex::new(OrderBookAnalyzer::new(OrderBookParams {
                depth: order_book_depth,
                ..OrderBookParams::default()
            })),
            decisions,
            trades,
            balances,
            events: tx,
            symbol_state: Mutex::new(HashMap::new()),
            daily: Mutex::new(None),
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<DashboardEvent> {
        self.events.subscribe()
    }

    pub fn ledger(&self) -> Arc<PositionLedger> {
        Arc::clone(&self.ledger)
    }

    /// Operator-initiated close of a single open trade (spec §6
    /// `POST /api/trades/:id/close`), at the current mark price.
    pub async fn close_trade(&self, trade_id: &str) -> anyhow::Result<Position> {
        let position = self
            .ledger
            .active_positions()
            .await
            .into_iter()
            .find(|p| p.trade_id == trade_id)
            .ok_or_else(|| anyhow::anyhow!("no open trade with id {trade_id}"))?;

        let exit_price = self.market.ticker_price(&position.symbol).await?;
        let now_millis = Utc::now().timestamp_millis();
        let closed = self
            .ledger
            .close_position(trade_id, exit_price, now_millis, self.config.taker_fee_rate)
            .await?;
        self.trades.upsert(&closed).await?;
        self.bump_daily_pnl(closed.realized_pnl.unwrap_or(Decimal::ZERO), now_millis).await;
        let _ = self.events.send(DashboardEvent::TradeClosed { position: closed.clone() });
        self.balances.record(now_millis, self.ledger.current_balance().await).await?;
        self.emit_stats().await;
        Ok(closed)
    }

    /// Operator-initiated close of every open trade (spec §6
    /// `POST /api/trades/close-all`).
    pub async fn close_all_trades(&self) -> anyhow::Result<usize> {
        let open = self.ledger.active_positions().await;
        let mut closed = 0;
        for position in open {
            self.close_trade(&position.trade_id).await?;
            closed += 1;
        }
        Ok(closed)
    }

    /// Operator-initiated full reset (spec §6 `POST /api/reset` and
    /// `/api/account/reset`): clears positions, balance, and daily counters.
    pub async fn reset(&self, starting_balance: Decimal) {
        self.ledger.reset(starting_balance).await;
        *self.daily.lock().await = None;
        self.symbol_state.lock().await.clear();
        self.emit_stats().await;
    }

    pub fn market(&self) -> Arc<dyn MarketDataProvider> {
        Arc::clone(&self.market)
    }

    /// Runs the tick loop until `shutdown` reports `true`. New ticks stop
    /// being scheduled once shutdown fires; the in-flight tick (bounded by
    /// the per-symbol `JoinSet`, which itself has no per-tick deadline beyond
    /// the tick interval) is allowed to finish (spec §5).
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.config.tick_interval);
        interval.tick().await;
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let outcomes = self.tick_all().await;
                    for outcome in outcomes {
                        info!(symbol = %outcome.symbol, decision = %outcome.record.decision, executed = outcome.record.executed, "tick complete");
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("orchestrator shutting down, no further ticks will be scheduled");
                        break;
                    }
                }
            }
        }
    }

    /// Runs one tick across every configured symbol in parallel, each on its
    /// own serialized task (spec §4.I: "for each tick, for each symbol in
    /// parallel").
    pub async fn tick_all(self: &Arc<Self>) -> Vec<TickOutcome> {
        let mut set = JoinSet::new();
        for symbol in self.config.symbols.clone() {
            let this = Arc::clone(self);
            let deadline = self.config.tick_deadline;
            set.spawn(async move { tokio::time::timeout(deadline, this.run_tick(&symbol)).await });
        }
        let mut outcomes = Vec::with_capacity(set.len());
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok(Ok(outcome))) => outcomes.push(outcome),
                Ok(Ok(Err(err))) => warn!(error = %err, "tick failed"),
                Ok(Err(_elapsed)) => warn!("tick exceeded its deadline"),
                Err(join_err) => warn!(error = %join_err, "tick task panicked"),
            }
        }
        outcomes
    }

    /// Drives steps 1-9 of the per-symbol tick pipeline (spec §4.I).
    pub async fn run_tick(&self, symbol: &str) -> anyhow::Result<TickOutcome> {
        let now = Utc::now();
        let now_millis = now.timestamp_millis();

        // Step 1: daily counters.
        if let Some(record) = self.check_daily_limits(symbol, now, now_millis).await {
            self.persist(&record).await?;
            return Ok(TickOutcome { symbol: symbol.to_string(), record });
        }

        // Step 2: market snapshot, indicators, order book, account.
        let candles = self
            .market
            .candles(symbol, &self.config.candle_interval, self.config.candle_limit)
            .await?;
        let indicator_set = indicators::compute(&candles, &self.indicator_params)?;
        let current_price = Decimal::from_f64_retain(indicator_set.last_close).unwrap_or(Decimal::ZERO);

        let multi_tf = self
            .market
            .candles(symbol, &self.config.multi_tf_interval, self.config.multi_tf_candle_limit)
            .await
            .ok()
            .and_then(|c| indicators::compute_multi_timeframe(&c, &self.indicator_params).ok());

        let snapshot = self.market.order_book(symbol, self.config.order_book_depth).await?;
        let order_book = self.orderbook.lock().await.analyze(&snapshot);

        let _ = self.events.send(DashboardEvent::MarketUpdate {
            symbol: symbol.to_string(),
            price: current_price,
            timestamp: now_millis,
        });

        let regime = self.regime.update(symbol, current_price, now_millis, false).await;
        let (recent_win_rate, recent_trade_count) =
            self.ledger.recent_performance(self.config.recent_trade_sample).await;
        let consecutive_losses = self.ledger.consecutive_losses(symbol).await;

        let open_position = self.ledger.active_position_for(symbol).await;
        let account_balance = self.ledger.current_balance().await;
        let account_available = self.ledger.free_margin().await;

        // Step 3: preliminary master filter at a nominal confidence.
        let seconds_since_last_trade = self.seconds_since_last_trade(symbol, now_millis).await;
        let prelim_ctx = FilterContext {
            decision: Decision::Hold,
            confidence: self.config.preliminary_confidence,
            current_price,
            atr_pct: Self::atr_pct(&indicator_set),
            volume_ratio: indicator_set.volume_ratio,
            trend_strength: regime.trend_strength,
            consecutive_losses,
            now,
            seconds_since_last_trade,
            daily_trade_count: self.daily_trade_count().await,
            stability_satisfied: true,
            reversal_allowed: true,
        };
        let prelim_report = self.filters.run(&prelim_ctx);
        if prelim_report.vetoed {
            let record = self.hold_record(symbol, now_millis, current_price, indicator_set, prelim_report.reasons.join("; "));
            self.persist(&record).await?;
            return Ok(TickOutcome { symbol: symbol.to_string(), record });
        }

        // Step 4: synthesize, then record into the stability ring.
        let synthesis_ctx = SynthesisContext {
            symbol: symbol.to_string(),
            current_price,
            indicators: indicator_set.clone(),
            multi_tf,
            order_book,
            dominant_trend: indicator_set.dominant_trend(),
            has_open_position: open_position.is_some(),
            open_position_side: open_position.as_ref().map(|p| p.side),
            account_balance,
            account_available,
            recent_win_rate,
            recent_trade_count,
            contrarian: self.config.contrarian,
            overlay: regime.overlay,
        };
        let signal = self.synthesizer.synthesize(&synthesis_ctx).await?;
        self.record_observation(symbol, now_millis, &signal).await;

        // Step 8's quick-exit check runs ahead of the main path: it can fire
        // regardless of whether the tentative signal below survives.
        if let Some(position) = &open_position {
            if self.quick_exit_ready(symbol, position.side).await {
                let record = self
                    .close_only(symbol, position, current_price, now_millis, "quick-exit: opposing signals confirmed")
                    .await?;
                self.persist(&record).await?;
                return Ok(TickOutcome { symbol: symbol.to_string(), record });
            }
        }

        // A plain HOLD carries its own reasoning from the synthesizer (e.g. a
        // counter-trend veto); it never reaches ledger reconciliation.
        if signal.decision == Decision::Hold {
            let record = self.hold_record(symbol, now_millis, current_price, indicator_set, signal.reasoning.clone());
            self.persist(&record).await?;
            return Ok(TickOutcome { symbol: symbol.to_string(), record });
        }

        // Step 5: reconcile tentative decision with the ledger.
        let plan = self.plan_for(&open_position, signal.decision);
        if matches!(plan, ExecutionPlan::Dedup) {
            let record = self.hold_record(
                symbol,
                now_millis,
                current_price,
                indicator_set,
                "duplicate signal in the direction of an already-open position",
            );
            self.persist(&record).await?;
            return Ok(TickOutcome { symbol: symbol.to_string(), record });
        }

        let reversal_allowed = if matches!(plan, ExecutionPlan::Invert) {
            self.reversal_allowed(symbol, now_millis).await
        } else {
            true
        };

        // Step 6/7: re-run the master filter (stability + reversal cooldown
        // included in the same ordered pipeline, spec §4.F) at the real
        // confidence, then compare against the mode's effective threshold.
        let stability_satisfied = self.stability_satisfied(symbol, signal.decision).await;
        let main_ctx = FilterContext {
            decision: signal.decision,
            confidence: signal.confidence,
            current_price,
            atr_pct: Self::atr_pct(&indicator_set),
            volume_ratio: indicator_set.volume_ratio,
            trend_strength: regime.trend_strength,
            consecutive_losses,
            now,
            seconds_since_last_trade,
            daily_trade_count: self.daily_trade_count().await,
            stability_satisfied,
            reversal_allowed,
        };
        let report = self.filters.run(&main_ctx);
        let effective_threshold = report.effective_confidence_floor(self.config.effective_min_confidence());

        if report.vetoed || signal.confidence < effective_threshold {
            let mut reasons = report.reasons;
            if signal.confidence < effective_threshold {
                reasons.push(format!(
                    "confidence {:.2} below effective threshold {:.2}",
                    signal.confidence, effective_threshold
                ));
            }
            let record = self.hold_record(symbol, now_millis, current_price, indicator_set, reasons.join("; "));
            self.persist(&record).await?;
            return Ok(TickOutcome { symbol: symbol.to_string(), record });
        }

        // Step 9: execute.
        let effective_pct = (self.config.position_size_pct * Decimal::from_f64_retain(report.size_multiplier).unwrap_or(Decimal::ONE))
            .max(Decimal::ZERO);
        let record = self
            .execute_plan(symbol, plan, &signal, current_price, now_millis, effective_pct, &synthesis_ctx)
            .await?;
        self.persist(&record).await?;
        Ok(TickOutcome { symbol: symbol.to_string(), record })
    }

    async fn check_daily_limits(
        &self,
        symbol: &str,
        now: chrono::DateTime<Utc>,
        now_millis: i64,
    ) -> Option<TradeDecisionRecord> {
        let mut guard = self.daily.lock().await;
        let counters = guard.get_or_insert_with(|| DailyCounters::new(now));
        counters.roll(now);

        if counters.trades >= self.config.daily_trade_cap {
            return Some(TradeDecisionRecord::hold(
                symbol,
                now_millis,
                Decimal::ZERO,
                IndicatorSet::default(),
                format!("daily trade cap {} reached", self.config.daily_trade_cap),
            ));
        }
        if counters.realized_pnl <= -self.config.daily_loss_limit {
            return Some(TradeDecisionRecord::hold(
                symbol,
                now_millis,
                Decimal::ZERO,
                IndicatorSet::default(),
                format!("daily loss limit {} breached", self.config.daily_loss_limit),
            ));
        }
        None
    }

    pub async fn daily_trade_count(&self) -> u32 {
        self.daily.lock().await.map(|c| c.trades).unwrap_or(0)
    }

    fn atr_pct(indicators: &IndicatorSet) -> f64 {
        if indicators.last_close.abs() < f64::EPSILON {
            0.0
        } else {
            indicators.atr_14 / indicators.last_close
        }
    }

    async fn seconds_since_last_trade(&self, symbol: &str, now_millis: i64) -> i64 {
        let mut states = self.symbol_state.lock().await;
        let state = states
            .entry(symbol.to_string())
            .or_insert_with(|| SymbolState::new(self.config.signal_window_millis));
        match state.last_trade_millis {
            Some(last) => (now_millis - last) / 1000,
            None => i64::MAX / 2,
        }
    }

    async fn record_observation(&self, symbol: &str, now_millis: i64, signal: &Signal) {
        let mut states = self.symbol_state.lock().await;
        let state = states
            .entry(symbol.to_string())
            .or_insert_with(|| SymbolState::new(self.config.signal_window_millis));
        state.history.push(SignalObservation {
            timestamp: now_millis,
            decision: signal.decision,
            confidence: signal.confidence,
        });
    }

    async fn stability_satisfied(&self, symbol: &str, decision: Decision) -> bool {
        let mut states = self.symbol_state.lock().await;
        let state = states
            .entry(symbol.to_string())
            .or_insert_with(|| SymbolState::new(self.config.signal_window_millis));
        state.history.stable_for(decision, self.config.stability_n)
    }

    async fn quick_exit_ready(&self, symbol: &str, open_side: OrderSide) -> bool {
        let opposite: Decision = open_side.opposite().into();
        let mut states = self.symbol_state.lock().await;
        let state = states
            .entry(symbol.to_string())
            .or_insert_with(|| SymbolState::new(self.config.signal_window_millis));
        state.history.confident_reversal(opposite, self.config.quick_exit_n, self.config.quick_exit_min_confidence)
    }

    async fn reversal_allowed(&self, symbol: &str, now_millis: i64) -> bool {
        let mut states = self.symbol_state.lock().await;
        let state = states
            .entry(symbol.to_string())
            .or_insert_with(|| SymbolState::new(self.config.signal_window_millis));
        state.reversals.can_reverse(now_millis, self.config.reversal_max_per_hour)
    }

    fn plan_for(&self, open_position: &Option<Position>, decision: Decision) -> ExecutionPlan {
        let Some(side) = decision.to_side() else {
            return ExecutionPlan::Dedup;
        };
        match open_position {
            None => ExecutionPlan::OpenNew(side),
            Some(position) if position.side == side => ExecutionPlan::Dedup,
            Some(_) => ExecutionPlan::Invert(side),
        }
    }

    fn hold_record(
        &self,
        symbol: &str,
        now_millis: i64,
        price: Decimal,
        indicators: IndicatorSet,
        reasoning: impl Into<String>,
    ) -> TradeDecisionRecord {
        TradeDecisionRecord::hold(symbol, now_millis, price, indicators, reasoning)
    }

    async fn persist(&self, record: &TradeDecisionRecord) -> anyhow::Result<()> {
        self.decisions.append(record).await?;
        let _ = self.events.send(DashboardEvent::DecisionNew { record: record.clone() });
        Ok(())
    }

    async fn close_only(
        &self,
        symbol: &str,
        position: &Position,
        exit_price: Decimal,
        now_millis: i64,
        reasoning: &str,
    ) -> anyhow::Result<TradeDecisionRecord> {
        let closed = self
            .ledger
            .close_position(&position.trade_id, exit_price, now_millis, self.config.taker_fee_rate)
            .await?;
        self.trades.upsert(&closed).await?;
        {
            let mut states = self.symbol_state.lock().await;
            let state = states
                .entry(symbol.to_string())
                .or_insert_with(|| SymbolState::new(self.config.signal_window_millis));
            state.reversals.record_reversal(now_millis);
        }
        self.bump_daily_pnl(closed.realized_pnl.unwrap_or(Decimal::ZERO), now_millis).await;
        let _ = self.events.send(DashboardEvent::TradeClosed { position: closed.clone() });
        self.balances.record(now_millis, self.ledger.current_balance().await).await?;
        self.emit_stats().await;

        let record = TradeDecisionRecord::executed(
            symbol,
            now_millis,
            closed.side.opposite().into(),
            self.config.quick_exit_min_confidence,
            reasoning,
            exit_price,
            IndicatorSet::default(),
            closed.trade_id.clone(),
        );
        Ok(record)
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute_plan(
        &self,
        symbol: &str,
        plan: ExecutionPlan,
        signal: &Signal,
        current_price: Decimal,
        now_millis: i64,
        effective_pct: Decimal,
        ctx: &SynthesisContext,
    ) -> anyhow::Result<TradeDecisionRecord> {
        let side = match plan {
            ExecutionPlan::OpenNew(side) | ExecutionPlan::Invert(side) => side,
            ExecutionPlan::Dedup => unreachable!("dedup plans are filtered out before execution"),
        };

        if let ExecutionPlan::Invert(_) = plan {
            if let Some(position) = self.ledger.active_position_for(symbol).await {
                let closed = self
                    .ledger
                    .close_position(&position.trade_id, current_price, now_millis, self.config.taker_fee_rate)
                    .await?;
                self.trades.upsert(&closed).await?;
                let _ = self.events.send(DashboardEvent::TradeClosed { position: closed.clone() });
                {
                    let mut states = self.symbol_state.lock().await;
                    let state = states
                        .entry(symbol.to_string())
                        .or_insert_with(|| SymbolState::new(self.config.signal_window_millis));
                    state.reversals.record_reversal(now_millis);
                }
                self.bump_daily_pnl(closed.realized_pnl.unwrap_or(Decimal::ZERO), now_millis).await;
            }
        }

        let (best_bid, best_ask) = self.market.best_bid_ask(symbol).await?;
        let quantity = (ctx.account_balance * effective_pct * self.config.leverage) / current_price;

        let trade_id = uuid::Uuid::new_v4().to_string();
        let outcome = self
            .execution
            .execute(
                &trade_id,
                symbol,
                side,
                quantity,
                best_bid,
                best_ask,
                signal.confidence,
                &signal.reasoning,
                now_millis,
                self.config.dry_run,
                current_price,
            )
            .await?;

        match outcome {
            OrderOutcome::Filled { order_id, fill_price, fill_quantity, fee } => {
                let position = Position {
                    trade_id: trade_id.clone(),
                    symbol: symbol.to_string(),
                    side,
                    quantity: fill_quantity,
                    entry_price: fill_price,
                    leverage: self.config.leverage,
                    entry_fee: fee,
                    state: PositionState::Open,
                    open_timestamp: now_millis,
                    close_timestamp: None,
                    exit_price: None,
                    realized_pnl: None,
                };
                let margin = position.initial_margin();
                match self.ledger.open_position(position.clone(), margin).await {
                    Ok(()) => {
                        self.trades.upsert(&position).await?;
                        {
                            let mut states = self.symbol_state.lock().await;
                            let state = states
                                .entry(symbol.to_string())
                                .or_insert_with(|| SymbolState::new(self.config.signal_window_millis));
                            state.last_trade_millis = Some(now_millis);
                        }
                        self.bump_trade_count(now_millis).await;
                        let _ = self.events.send(DashboardEvent::TradeNew { position: position.clone() });
                        self.balances.record(now_millis, self.ledger.current_balance().await).await?;
                        self.emit_stats().await;

                        Ok(TradeDecisionRecord::executed(
                            symbol,
                            now_millis,
                            signal.decision,
                            signal.confidence,
                            signal.reasoning.clone(),
                            fill_price,
                            ctx.indicators.clone(),
                            order_id,
                        ))
                    }
                    Err(err @ LedgerViolation::CorrelationBlocked { .. })
                    | Err(err @ LedgerViolation::MaxPositionsReached { .. })
                    | Err(err @ LedgerViolation::DuplicateOpenPosition { .. }) => Ok(TradeDecisionRecord::hold(
                        symbol,
                        now_millis,
                        current_price,
                        ctx.indicators.clone(),
                        err.to_string(),
                    )),
                    Err(err) => Err(err.into()),
                }
            }
            OrderOutcome::Rejected { reason } => Ok(TradeDecisionRecord::hold(
                symbol,
                now_millis,
                current_price,
                ctx.indicators.clone(),
                format!("order rejected: {reason}"),
            )
            .with_error(reason)),
        }
    }

    /// Recomputes balance/equity/open-position count and pushes
    /// `stats:update` + `positions:update` (spec §6), called after every
    /// trade-affecting event.
    async fn emit_stats(&self) {
        let positions = self.ledger.active_positions().await;
        let mut mark_prices = PriceCache::new();
        for position in &positions {
            if let Ok(price) = self.market.ticker_price(&position.symbol).await {
                mark_prices.insert(position.symbol.clone(), price);
            }
        }
        let balance = self.ledger.current_balance().await;
        let equity = self.ledger.equity(&mark_prices).await;
        let trades_today = self.daily_trade_count().await;
        let _ = self.events.send(DashboardEvent::StatsUpdate {
            balance,
            equity,
            open_positions: positions.len(),
            trades_today,
        });
        let _ = self.events.send(DashboardEvent::PositionsUpdate { positions });
    }

    /// Folds a just-realized P&L into the daily loss-limit tally (spec §4.I
    /// step 1). Called on every close; does not touch the trade-cap counter,
    /// which is driven solely by opens (see `bump_trade_count`).
    async fn bump_daily_pnl(&self, realized_pnl: Decimal, now_millis: i64) {
        let now = chrono::DateTime::<Utc>::from_timestamp_millis(now_millis).unwrap_or_else(Utc::now);
        let mut guard = self.daily.lock().await;
        let counters = guard.get_or_insert_with(|| DailyCounters::new(now));
        counters.roll(now);
        counters.record_pnl(realized_pnl);
    }

    async fn bump_trade_count(&self, now_millis: i64) {
        let now = chrono::DateTime::<Utc>::from_timestamp_millis(now_millis).unwrap_or_else(Utc::now);
        let mut guard = self.daily.lock().await;
        let counters = guard.get_or_insert_with(|| DailyCounters::new(now));
        counters.roll(now);
        counters.record_trade();
    }
}

/// What step 5's ledger reconciliation decided to do with the tentative
/// signal (spec §4.I step 5).
#[derive(Debug, Clone, Copy)]
enum ExecutionPlan {
    Dedup,
    OpenNew(OrderSide),
    Invert(OrderSide),
}
