//! HTTP Status Surface
//!
//! Read-only endpoints for operators: health, pairing QR, raw stats and the
//! in-memory log viewer. No authentication and no mutation routes.

mod handlers;
mod html;

use crate::logging::LogBuffer;
use crate::status::StatusTracker;
use anyhow::Context;
use axum::{Router, routing::get};
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub status: Arc<StatusTracker>,
    pub logs: LogBuffer,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(status: Arc<StatusTracker>, logs: LogBuffer) -> Self {
        Self {
            status,
            logs,
            started_at: Instant::now(),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/qr", get(handlers::qr))
        .route("/stats", get(handlers::stats))
        .route("/logs", get(handlers::logs_page))
        .route("/logs/json", get(handlers::logs_json))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve until `shutdown` fires.
pub async fn serve(addr: &str, state: AppState, shutdown: CancellationToken) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind status server to {addr}"))?;

    let local = listener.local_addr()?;
    tracing::info!("Status server listening on http://{}", local);
    tracing::info!("Health check: http://localhost:{}/health", local.port());
    tracing::info!("QR code: http://localhost:{}/qr", local.port());

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("Status server failed")?;
    Ok(())
}
