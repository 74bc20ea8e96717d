//! Top-level configuration type.

use chronos_telemetry::logging::create_env_filter;
use chronos_telemetry::{LogConfig, MetricsConfig};
use serde::{Deserialize, Serialize};

use crate::{ConfigError, ServerConfig, VersioningConfig};

/// Complete Chronos service configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load it from files and
/// environment variables.
///
/// # Example
///
/// ```
/// use chronos_config::ChronosConfig;
///
/// let config = ChronosConfig::default();
/// assert_eq!(config.server.http_addr, "0.0.0.0:8080");
/// assert!(config.metrics.enabled);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct ChronosConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Version history and token handling.
    #[serde(default)]
    pub versioning: VersioningConfig,

    /// Log output.
    #[serde(default)]
    pub logging: LogConfig,

    /// Prometheus metrics.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl ChronosConfig {
    /// Validate the configuration.
    ///
    /// An empty version history is accepted here so that services can
    /// declare their history in code instead. Every other versioning field
    /// must already be usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for an unparseable bind address, a zero
    /// request timeout, invalid log directives, or an unusable versioning
    /// section.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self
            .server
            .http_addr
            .parse::<std::net::SocketAddr>()
            .is_err()
        {
            return Err(ConfigError::invalid_value(
                "server.http_addr",
                format!("invalid socket address: {}", self.server.http_addr),
            ));
        }

        if self.server.request_timeout_ms == 0 {
            return Err(ConfigError::invalid_value(
                "server.request_timeout_ms",
                "must be greater than zero",
            ));
        }

        if self.logging.enabled {
            create_env_filter(&self.logging.level)
                .map_err(|e| ConfigError::invalid_value("logging.level", e.to_string()))?;
        }

        if !self.versioning.history.is_empty() {
            self.versioning.history()?;
        }
        self.versioning.extractor()?;
        self.versioning.resolved_header()?;

        Ok(())
    }

    /// Development preset: pretty debug logs.
    ///
    /// # Example
    ///
    /// ```
    /// use chronos_config::ChronosConfig;
    ///
    /// let config = ChronosConfig::development();
    /// assert_eq!(config.logging.level, "debug");
    /// ```
    #[must_use]
    pub fn development() -> Self {
        Self {
            logging: LogConfig::development(),
            ..Self::default()
        }
    }

    /// Production preset: JSON logs at `info`, futures rejected.
    #[must_use]
    pub fn production() -> Self {
        Self {
            logging: LogConfig::production(),
            versioning: VersioningConfig {
                unknown_version_policy: chronos_core::UnknownVersionPolicy::Reject,
                ..VersioningConfig::default()
            },
            ..Self::default()
        }
    }
}
