//! Telemetry endpoint.
//!
//! # Responsibilities
//! - Bind the metrics address
//! - Serve `/metrics` (Prometheus text format), `/healthz` and `/readyz`
//! - Stop with the shutdown signal
//!
//! # Design Decisions
//! - Bind errors are returned to the caller, which only logs them
//! - `/readyz` reports the reconciliation gates (Leader and AllSynced)

use std::net::SocketAddr;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;

use crate::lifecycle::{LifecycleContext, ShutdownListener};

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to bind metrics endpoint {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
}

/// State injected into the telemetry handlers.
#[derive(Clone)]
pub struct TelemetryState {
    pub metrics: PrometheusHandle,
    pub context: LifecycleContext,
}

/// A running telemetry server.
pub struct TelemetryHandle {
    pub local_addr: SocketAddr,
    pub task: JoinHandle<()>,
}

pub struct TelemetryServer;

impl TelemetryServer {
    /// Bind `addr` and serve until `shutdown` fires.
    pub async fn expose(
        addr: SocketAddr,
        state: TelemetryState,
        mut shutdown: ShutdownListener,
    ) -> Result<TelemetryHandle, TelemetryError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| TelemetryError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| TelemetryError::Bind { addr, source })?;

        tracing::info!(address = %local_addr, "Metrics endpoint listening");

        let app = Self::build_router(state);
        let task = tokio::spawn(async move {
            let result = axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.recv().await })
                .await;
            match result {
                Ok(()) => tracing::info!("Metrics endpoint stopped"),
                Err(e) => tracing::warn!(error = %e, "Metrics endpoint failed"),
            }
        });

        Ok(TelemetryHandle { local_addr, task })
    }

    fn build_router(state: TelemetryState) -> Router {
        Router::new()
            .route("/metrics", get(metrics_handler))
            .route("/healthz", get(healthz_handler))
            .route("/readyz", get(readyz_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }
}

async fn metrics_handler(State(state): State<TelemetryState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

async fn healthz_handler() -> &'static str {
    "ok"
}

async fn readyz_handler(State(state): State<TelemetryState>) -> impl IntoResponse {
    let ctx = &state.context;
    let body = format!(
        "leadership={} synced={}",
        ctx.leadership(),
        ctx.all_synced()
    );
    if ctx.is_ready() {
        (StatusCode::OK, body)
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, body)
    }
}
