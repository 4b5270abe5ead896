//! Prometheus metrics for rota-server.
//!
//! Exposed in Prometheus text format at `/metrics` on the health listener.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use std::time::{Duration, Instant};

/// Install the global Prometheus recorder and return a handle for rendering.
///
/// Must be called once at server startup before any metrics are recorded.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    describe_counter!(
        "rota_http_requests_total",
        "Total number of HTTP requests processed"
    );
    describe_histogram!(
        "rota_http_request_duration_seconds",
        "Duration of HTTP requests in seconds"
    );
    describe_counter!(
        "rota_http_errors_total",
        "Total number of HTTP errors by error kind"
    );
    describe_counter!(
        "rota_round_transitions_total",
        "Committed round transitions by action and resulting status"
    );
    describe_counter!(
        "rota_notifications_total",
        "Outbox messages handed to delivery, by channel and result"
    );

    Ok(handle)
}

pub fn record_request(route: &'static str, duration: Duration) {
    counter!("rota_http_requests_total", "route" => route, "status" => "ok").increment(1);
    histogram!("rota_http_request_duration_seconds", "route" => route)
        .record(duration.as_secs_f64());
}

pub fn record_error(route: &'static str, kind: &'static str) {
    counter!("rota_http_requests_total", "route" => route, "status" => "error").increment(1);
    counter!("rota_http_errors_total", "route" => route, "kind" => kind).increment(1);
}

pub fn record_transition(action: &'static str, status: &'static str) {
    counter!("rota_round_transitions_total", "action" => action, "status" => status)
        .increment(1);
}

pub fn record_notification(channel: &'static str, delivered: bool) {
    let result = if delivered { "delivered" } else { "failed" };
    counter!("rota_notifications_total", "channel" => channel, "result" => result).increment(1);
}

/// Times a request and records metrics on completion.
pub struct RequestTimer {
    route: &'static str,
    start: Instant,
}

impl RequestTimer {
    pub fn new(route: &'static str) -> Self {
        Self {
            route,
            start: Instant::now(),
        }
    }

    pub fn success(self) {
        record_request(self.route, self.start.elapsed());
    }

    pub fn error(self, kind: &'static str) {
        record_error(self.route, kind);
    }
}
