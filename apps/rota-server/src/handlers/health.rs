//! Health and metrics endpoints, served on their own listener.

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::sync::watch;

#[derive(Clone)]
pub struct HealthState {
    ready: watch::Receiver<bool>,
    metrics: Option<PrometheusHandle>,
}

impl HealthState {
    pub fn new(ready: watch::Receiver<bool>, metrics: Option<PrometheusHandle>) -> Self {
        Self { ready, metrics }
    }
}

/// `/healthz`, `/readyz` and `/metrics`.
pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/healthz", get(health_handler))
        .route("/readyz", get(readiness_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

async fn health_handler() -> &'static str {
    "ok"
}

async fn readiness_handler(State(state): State<HealthState>) -> Result<&'static str, StatusCode> {
    if *state.ready.borrow() {
        Ok("ok")
    } else {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}

async fn metrics_handler(State(state): State<HealthState>) -> String {
    state
        .metrics
        .as_ref()
        .map(PrometheusHandle::render)
        .unwrap_or_default()
}
