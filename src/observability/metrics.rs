//! Metrics collection and exposition.
//!
//! # Metrics
//! - `spark_requests_total` (counter): requests by method, status
//! - `spark_request_duration_seconds` (histogram): latency by method
//!
//! # Design Decisions
//! - Recorded through the `metrics` facade; without an installed recorder
//!   every call is a no-op
//! - Prometheus exporter installed only when enabled in config

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub const REQUESTS_TOTAL: &str = "spark_requests_total";
pub const REQUEST_DURATION: &str = "spark_request_duration_seconds";

/// Record one finished request.
pub fn record_request(method: &str, status: u16, start: Instant) {
    metrics::counter!(
        REQUESTS_TOTAL,
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!(REQUEST_DURATION, "method" => method.to_string())
        .record(start.elapsed().as_secs_f64());
}

/// Install the Prometheus recorder and its scrape endpoint on `addr`.
///
/// Must run inside a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}
