//! Metrics HTTP endpoint
//!
//! Serves the lease metrics registry at `GET /metrics` in Prometheus text
//! format until cancellation fires.

use crate::error::{AgentError, Result};
use crate::metrics::LeaseMetrics;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

const TEXT_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Router exposing `/metrics`
pub fn metrics_router(metrics: LeaseMetrics) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(metrics)
}

async fn metrics_handler(State(metrics): State<LeaseMetrics>) -> Response {
    match metrics.encode_text() {
        Ok(body) => ([(header::CONTENT_TYPE, TEXT_CONTENT_TYPE)], body).into_response(),
        Err(e) => {
            error!("Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Bind the metrics listener
pub async fn bind_metrics(addr: SocketAddr) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| AgentError::MetricsBind { addr, source })
}

/// Serve metrics on `listener` until `shutdown` flips to true
pub async fn serve_metrics(
    listener: TcpListener,
    metrics: LeaseMetrics,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Metrics server listening on http://{}/metrics", addr);
    }

    axum::serve(listener, metrics_router(metrics))
        .with_graceful_shutdown(async move {
            let _ = shutdown.wait_for(|stop| *stop).await;
        })
        .await
        .map_err(AgentError::MetricsServer)
}
