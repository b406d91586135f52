//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define proxy metrics (requests, latency, upstream health, failovers)
//! - Expose Prometheus-compatible metrics endpoint
//! - Build the per-upstream snapshot reported to hosts
//!
//! # Metrics
//! - `multiproxy_requests_total` (counter): requests by method, status, upstream
//! - `multiproxy_request_duration_seconds` (histogram): end-to-end latency
//! - `multiproxy_upstream_healthy` (gauge): 1=healthy, 0=unhealthy
//! - `multiproxy_failovers_total` (counter): cross-upstream retries

use std::net::SocketAddr;
use std::time::Duration;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use serde::{Serialize, Serializer};

use crate::load_balancer::Upstream;

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

pub fn record_request(method: &str, status: u16, upstream: &str, elapsed: Duration) {
    ::metrics::counter!(
        "multiproxy_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string(),
        "upstream" => upstream.to_string()
    )
    .increment(1);
    ::metrics::histogram!(
        "multiproxy_request_duration_seconds",
        "upstream" => upstream.to_string()
    )
    .record(elapsed.as_secs_f64());
}

pub fn record_upstream_health(upstream: &str, healthy: bool) {
    ::metrics::gauge!("multiproxy_upstream_healthy", "upstream" => upstream.to_string())
        .set(if healthy { 1.0 } else { 0.0 });
}

pub fn record_failover() {
    ::metrics::counter!("multiproxy_failovers_total").increment(1);
}

/// Point-in-time metrics of one upstream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UpstreamMetrics {
    pub id: Option<String>,
    pub host: String,
    pub healthy: bool,
    #[serde(rename = "average_response_time_ms", serialize_with = "as_millis")]
    pub average_response_time: Duration,
    pub total_requests: u64,
    pub total_error_responses: u64,
}

impl UpstreamMetrics {
    pub fn of<T>(upstream: &Upstream<T>) -> Self {
        Self {
            id: upstream.id().map(str::to_string),
            host: upstream.host().to_string(),
            healthy: upstream.is_healthy(),
            average_response_time: upstream.average_response_time(),
            total_requests: upstream.total_requests(),
            total_error_responses: upstream.total_error_responses(),
        }
    }
}

fn as_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64() * 1000.0)
}
