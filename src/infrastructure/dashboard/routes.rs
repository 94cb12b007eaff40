use super::state::AppState;
use crate::domain::errors::BacktestError;
use crate::domain::ports::{BacktestRequest, MarketDataProvider, PriceCache};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

const DEFAULT_PAGE_SIZE: i64 = 200;

/// Builds the operator HTTP surface (spec §6), grounded on
/// `orc2626-tech-sBot9999/backend/src/api/rest.rs`'s `Router::new()` +
/// permissive `CorsLayer` + `.with_state(state)` shape.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/api/stats", get(stats))
        .route("/api/trades", get(trades))
        .route("/api/decisions", get(decisions))
        .route("/api/performance", get(performance))
        .route("/api/account", get(account))
        .route("/api/trades/:id/close", post(close_trade))
        .route("/api/trades/close-all", post(close_all_trades))
        .route("/api/reset", post(reset))
        .route("/api/account/reset", post(reset))
        .route("/api/backtest/run", post(backtest_run))
        .route("/api/backtest/stop", post(backtest_stop))
        .route("/api/ws", get(super::ws::ws_handler))
        .layer(cors)
        .with_state(state)
}

#[derive(Serialize)]
struct StatsResponse {
    balance: Decimal,
    equity: Decimal,
    open_positions: usize,
    trades_today: u32,
    win_rate: f64,
    sample_size: u32,
}

async fn stats(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let ledger = state.orchestrator.ledger();
    let positions = ledger.active_positions().await;
    let mut mark_prices = PriceCache::new();
    for position in &positions {
        if let Ok(price) = state.orchestrator.market().ticker_price(&position.symbol).await {
            mark_prices.insert(position.symbol.clone(), price);
        }
    }
    let (win_rate, sample_size) = ledger.recent_performance(50).await;
    Json(StatsResponse {
        balance: ledger.current_balance().await,
        equity: ledger.equity(&mark_prices).await,
        open_positions: positions.len(),
        trades_today: state.orchestrator.daily_trade_count().await,
        win_rate,
        sample_size,
    })
    .into_response()
}

async fn trades(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match crate::infrastructure::persistence::recent_trades(&state.pool, DEFAULT_PAGE_SIZE).await {
        Ok(trades) => Json(trades).into_response(),
        Err(err) => {
            warn!(error = %err, "failed to load trades");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to load trades").into_response()
        }
    }
}

async fn decisions(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match crate::infrastructure::persistence::recent_decisions(&state.pool, DEFAULT_PAGE_SIZE).await {
        Ok(decisions) => Json(decisions).into_response(),
        Err(err) => {
            warn!(error = %err, "failed to load decisions");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to load decisions").into_response()
        }
    }
}

#[derive(Serialize)]
struct PerformanceResponse {
    win_rate: f64,
    sample_size: u32,
}

async fn performance(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (win_rate, sample_size) = state.orchestrator.ledger().recent_performance(100).await;
    Json(PerformanceResponse { win_rate, sample_size }).into_response()
}

#[derive(Serialize)]
struct AccountResponse {
    balance: Decimal,
    available: Decimal,
    positions: Vec<crate::domain::position::Position>,
}

async fn account(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let ledger = state.orchestrator.ledger();
    Json(AccountResponse {
        balance: ledger.current_balance().await,
        available: ledger.free_margin().await,
        positions: ledger.active_positions().await,
    })
    .into_response()
}

async fn close_trade(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> impl IntoResponse {
    match state.orchestrator.close_trade(&id).await {
        Ok(position) => Json(position).into_response(),
        Err(err) => {
            warn!(error = %err, trade_id = %id, "failed to close trade");
            (StatusCode::BAD_REQUEST, err.to_string()).into_response()
        }
    }
}

#[derive(Serialize)]
struct CloseAllResponse {
    closed: usize,
}

async fn close_all_trades(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.orchestrator.close_all_trades().await {
        Ok(closed) => Json(CloseAllResponse { closed }).into_response(),
        Err(err) => {
            warn!(error = %err, "failed to close all trades");
            (StatusCode::BAD_REQUEST, err.to_string()).into_response()
        }
    }
}

async fn reset(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    state.orchestrator.reset(state.starting_balance).await;
    StatusCode::NO_CONTENT
}

fn backtest_error_response(err: BacktestError) -> impl IntoResponse {
    let status = match err {
        BacktestError::NotConfigured => StatusCode::NOT_IMPLEMENTED,
        BacktestError::RunNotFound { .. } => StatusCode::NOT_FOUND,
    };
    (status, err.to_string())
}

#[derive(Deserialize)]
struct BacktestRunRequest {
    symbol: String,
    interval: String,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
}

#[derive(Serialize)]
struct BacktestRunResponse {
    run_id: String,
}

async fn backtest_run(
    State(state): State<Arc<AppState>>,
    Json(body): Json<BacktestRunRequest>,
) -> impl IntoResponse {
    let request = BacktestRequest {
        symbol: body.symbol,
        interval: body.interval,
        from: body.from,
        to: body.to,
    };
    match state.backtest.start(request).await {
        Ok(handle) => Json(BacktestRunResponse { run_id: handle.run_id }).into_response(),
        Err(err) => {
            warn!(error = %err, "backtest run request failed");
            backtest_error_response(err).into_response()
        }
    }
}

#[derive(Deserialize)]
struct BacktestStopRequest {
    run_id: String,
}

async fn backtest_stop(
    State(state): State<Arc<AppState>>,
    Json(body): Json<BacktestStopRequest>,
) -> impl IntoResponse {
    match state.backtest.stop(&body.run_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => {
            warn!(error = %err, run_id = %body.run_id, "backtest stop request failed");
            backtest_error_response(err).into_response()
        }
    }
}
