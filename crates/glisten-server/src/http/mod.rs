//! Webhook ingress and pull endpoints
//!
//! - `POST /post` - publish the configured field of a JSON body
//! - `GET /` - current event (peek or drain, per `read_mode`)
//! - `GET /events/first` - oldest retained event
//! - `POST /events/latest` - remove and return the newest event
//! - `GET /status` - hub counters
//! - `GET /health` - liveness

mod routes;

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::{
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::state::GlistenState;

pub use routes::{extract_payload, ApiError, ACK_BODY, EMPTY_BODY};

/// Create the router with all endpoints
pub fn create_router(state: Arc<GlistenState>) -> Router {
    Router::new()
        .route("/", get(routes::current_event))
        .route("/post", post(routes::receive_webhook))
        .route("/events/first", get(routes::first_event))
        .route("/events/latest", post(routes::drain_latest))
        .route("/status", get(routes::status))
        .route("/health", get(health_check))
        .with_state(state)
}

/// Serve HTTP until the token is cancelled
pub async fn serve(bind_addr: &str, state: Arc<GlistenState>, cancel: CancellationToken) -> Result<()> {
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind HTTP server to {}", bind_addr))?;

    tracing::info!("HTTP server listening on {}", listener.local_addr()?);

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async move {
            cancel.cancelled().await;
            tracing::info!("HTTP server shutting down");
        })
        .await
        .context("HTTP server failed")
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
