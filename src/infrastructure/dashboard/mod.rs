mod routes;
mod state;
mod ws;

pub use state::AppState;

use anyhow::Context;
use std::sync::Arc;

/// Serves the operator HTTP + WebSocket surface until `shutdown` fires
/// (spec §6, §9 "start -> run -> stop" lifecycle).
pub async fn serve(
    state: Arc<AppState>,
    port: u16,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let app = routes::router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind dashboard HTTP server to {addr}"))?;

    tracing::info!(%addr, "dashboard HTTP server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|&stop| stop).await;
        })
        .await
        .context("dashboard HTTP server error")?;

    Ok(())
}
