//! Structured logging and Prometheus metrics for Chronos.
//!
//! The router and core crates only emit `tracing` events. This crate owns the
//! process-wide side of observability:
//!
//! - **Logging**: a `tracing-subscriber` registry with JSON or pretty output
//! - **Metrics**: a Prometheus recorder plus the resolution counters the
//!   server records for every request
//!
//! # Example
//!
//! ```rust,ignore
//! use chronos_telemetry::{init_telemetry, LogConfig, MetricsConfig};
//!
//! let registry = init_telemetry(&LogConfig::production(), &MetricsConfig::default())?;
//!
//! if let Some(registry) = registry {
//!     println!("{}", registry.render());
//! }
//! ```
//!
//! # Metrics Endpoint
//!
//! ```text
//! # TYPE chronos_resolutions_total counter
//! chronos_resolutions_total{method="GET",endpoint="/users/{id}",resolved_version="2024-01-01",downgraded="true"} 12
//! # TYPE chronos_resolution_failures_total counter
//! chronos_resolution_failures_total{reason="NO_QUALIFYING_VERSION"} 3
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig, LogFormat};
pub use metrics::{init_metrics, render_metrics, InFlightGuard, MetricsConfig, MetricsRegistry};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Installs logging and metrics in one call.
///
/// Logging is installed first so that a metrics failure is itself logged by
/// the caller.
///
/// # Errors
///
/// Returns the first [`TelemetryError`] raised by either subsystem.
pub fn init_telemetry(
    logging: &LogConfig,
    metrics: &MetricsConfig,
) -> TelemetryResult<Option<MetricsRegistry>> {
    init_logging(logging)?;
    let registry = init_metrics(metrics)?;

    tracing::debug!(
        log_format = %logging.format,
        metrics_enabled = metrics.enabled,
        "Telemetry initialized"
    );

    Ok(registry)
}
