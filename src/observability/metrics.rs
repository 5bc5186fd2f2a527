//! Endpoint health metrics.
//!
//! # Metrics
//! - `broker_endpoint_status` (gauge): 1=up, 0=down, per endpoint
//! - `broker_connection_failures_total` (counter): failed attempts, per endpoint
//!
//! # Design Decisions
//! - The failover core only sees the [`MetricsSink`] trait
//! - Updates are fire-and-forget; a sink never reports errors back

use std::net::SocketAddr;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::endpoint::Endpoint;

const ENDPOINT_STATUS: &str = "broker_endpoint_status";
const CONNECTION_FAILURES: &str = "broker_connection_failures_total";

/// Receiver of per-endpoint health transitions.
pub trait MetricsSink: Send + Sync {
    /// Endpoint accepted a connection.
    fn mark_up(&self, endpoint: &Endpoint);

    /// Endpoint failed an attempt or dropped a session.
    fn mark_down(&self, endpoint: &Endpoint);

    /// Count one failed connection attempt.
    fn inc_failure(&self, endpoint: &Endpoint);
}

/// Sink that records through the `metrics` facade.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrometheusMetrics;

impl PrometheusMetrics {
    pub fn new() -> Self {
        metrics::describe_gauge!(ENDPOINT_STATUS, "Broker endpoint status (1=UP, 0=DOWN)");
        metrics::describe_counter!(CONNECTION_FAILURES, "Total connection failures for endpoint");
        Self
    }
}

impl MetricsSink for PrometheusMetrics {
    fn mark_up(&self, endpoint: &Endpoint) {
        metrics::gauge!(ENDPOINT_STATUS, "endpoint" => endpoint.to_string()).set(1.0);
    }

    fn mark_down(&self, endpoint: &Endpoint) {
        metrics::gauge!(ENDPOINT_STATUS, "endpoint" => endpoint.to_string()).set(0.0);
    }

    fn inc_failure(&self, endpoint: &Endpoint) {
        metrics::counter!(CONNECTION_FAILURES, "endpoint" => endpoint.to_string()).increment(1);
    }
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl MetricsSink for NoopMetrics {
    fn mark_up(&self, _endpoint: &Endpoint) {}
    fn mark_down(&self, _endpoint: &Endpoint) {}
    fn inc_failure(&self, _endpoint: &Endpoint) {}
}

/// Install the Prometheus recorder and its scrape endpoint.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}
