use super::state::AppState;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Upgrades to the event push channel (spec §6): every `DashboardEvent`
/// broadcast by the orchestrator is forwarded as a JSON text frame.
/// Grounded on `orc2626-tech-sBot9999/backend/src/api/ws.rs`'s
/// `tokio::select!` push/recv loop, simplified from polling a state-version
/// diff to forwarding a `broadcast::Receiver` directly since events are
/// already individually shaped per spec's topic list.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    info!("dashboard websocket upgrade");
    ws.on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: Arc<AppState>) {
    let mut events = state.orchestrator.subscribe_events();
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Ok(event) => match serde_json::to_string(&event) {
                        Ok(json) => {
                            if let Err(err) = sender.send(Message::Text(json.into())).await {
                                debug!(%err, "dashboard websocket send failed, disconnecting");
                                break;
                            }
                        }
                        Err(err) => warn!(%err, "failed to serialize dashboard event"),
                    },
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "dashboard websocket subscriber lagged, dropping oldest");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
                }
            }
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(err)) => {
                        debug!(%err, "dashboard websocket receive error, disconnecting");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    info!("dashboard websocket connection closed");
}
