//! Prometheus metrics for Chronos.
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `chronos_resolutions_total` | Counter | `method`, `endpoint`, `resolved_version`, `downgraded` | Successful resolutions |
//! | `chronos_resolution_failures_total` | Counter | `reason` | Failed resolutions by error code |
//! | `chronos_requests_total` | Counter | `endpoint`, `status` | Completed requests |
//! | `chronos_request_duration_seconds` | Histogram | `endpoint` | Request latency |
//! | `chronos_in_flight_requests` | Gauge | - | Requests being processed |
//!
//! Recording functions are cheap no-ops until a recorder is installed with
//! [`init_metrics`].

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::{Deserialize, Serialize};

use crate::error::TelemetryError;
use crate::TelemetryResult;

/// Resolution counter name.
pub const RESOLUTIONS_TOTAL: &str = "chronos_resolutions_total";
/// Resolution failure counter name.
pub const RESOLUTION_FAILURES_TOTAL: &str = "chronos_resolution_failures_total";
/// Request counter name.
pub const REQUESTS_TOTAL: &str = "chronos_requests_total";
/// Request duration histogram name.
pub const REQUEST_DURATION_SECONDS: &str = "chronos_request_duration_seconds";
/// In-flight gauge name.
pub const IN_FLIGHT_REQUESTS: &str = "chronos_in_flight_requests";

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MetricsConfig {
    /// Whether to install the Prometheus recorder and serve `/metrics`.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Renders the installed recorder's metrics in Prometheus text format.
#[derive(Debug, Clone)]
pub struct MetricsRegistry {
    handle: PrometheusHandle,
}

impl MetricsRegistry {
    /// Wraps a Prometheus handle.
    #[must_use]
    pub fn new(handle: PrometheusHandle) -> Self {
        Self { handle }
    }

    /// Renders all metrics in Prometheus text format.
    #[must_use]
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Installs the global Prometheus recorder.
///
/// Returns `None` when metrics are disabled. Calling this again after a
/// successful install returns the existing registry.
///
/// # Errors
///
/// Returns [`TelemetryError::MetricsInit`] if another recorder is already
/// installed.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<Option<MetricsRegistry>> {
    if !config.enabled {
        return Ok(None);
    }

    if let Some(handle) = METRICS_HANDLE.get() {
        return Ok(Some(MetricsRegistry::new(handle.clone())));
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    let handle = METRICS_HANDLE.get_or_init(|| handle).clone();

    register_metric_descriptions();

    Ok(Some(MetricsRegistry::new(handle)))
}

/// Renders metrics, or `None` if no recorder was installed.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

fn register_metric_descriptions() {
    describe_counter!(
        RESOLUTIONS_TOTAL,
        "Requests resolved to a versioned implementation"
    );
    describe_counter!(
        RESOLUTION_FAILURES_TOTAL,
        "Requests that could not be resolved, by error code"
    );
    describe_counter!(REQUESTS_TOTAL, "Completed HTTP requests");
    describe_histogram!(REQUEST_DURATION_SECONDS, "HTTP request duration in seconds");
    describe_gauge!(IN_FLIGHT_REQUESTS, "HTTP requests currently being processed");
}

// ============================================================================
// Metric Recording Functions
// ============================================================================

/// Records a successful resolution.
///
/// `endpoint` is the normalized pattern, never the concrete path, so label
/// cardinality stays bounded.
pub fn record_resolution(method: &str, endpoint: &str, resolved_version: &str, downgraded: bool) {
    counter!(
        RESOLUTIONS_TOTAL,
        "method" => method.to_string(),
        "endpoint" => endpoint.to_string(),
        "resolved_version" => resolved_version.to_string(),
        "downgraded" => downgraded.to_string()
    )
    .increment(1);
}

/// Records a failed resolution by its stable error code.
pub fn record_resolution_failure(reason: &'static str) {
    counter!(RESOLUTION_FAILURES_TOTAL, "reason" => reason).increment(1);
}

/// Records a completed request.
pub fn record_request(endpoint: &str, status_code: u16, duration: Duration) {
    counter!(
        REQUESTS_TOTAL,
        "endpoint" => endpoint.to_string(),
        "status" => status_code.to_string()
    )
    .increment(1);

    histogram!(REQUEST_DURATION_SECONDS, "endpoint" => endpoint.to_string())
        .record(duration.as_secs_f64());
}

/// Increments the in-flight gauge and decrements it again on drop.
#[derive(Debug)]
pub struct InFlightGuard {
    _private: (),
}

impl InFlightGuard {
    /// Creates a guard, incrementing the in-flight gauge.
    #[must_use]
    pub fn new() -> Self {
        gauge!(IN_FLIGHT_REQUESTS).increment(1.0);
        Self { _private: () }
    }
}

impl Default for InFlightGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        gauge!(IN_FLIGHT_REQUESTS).decrement(1.0);
    }
}
