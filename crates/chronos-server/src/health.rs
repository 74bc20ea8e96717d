//! The built-in `GET /health` endpoint.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Body of the `/health` response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthStatus {
    /// Always `"healthy"` while the process is serving.
    pub status: String,
    /// Service name.
    pub service: String,
    /// Service build version.
    pub version: String,
    /// Seconds since the server was created.
    pub uptime_seconds: u64,
    /// Newest API version in the history.
    pub newest_api_version: String,
    /// Number of registered endpoints.
    pub endpoints: usize,
}

/// Liveness reporter.
#[derive(Debug, Clone)]
pub struct HealthCheck {
    service: String,
    version: String,
    started: Instant,
}

impl HealthCheck {
    /// Creates a health check starting its uptime clock now.
    #[must_use]
    pub fn new(service: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            version: version.into(),
            started: Instant::now(),
        }
    }

    /// Service name.
    #[must_use]
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Service build version.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Time since creation.
    #[must_use]
    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    /// Current status.
    #[must_use]
    pub fn status(&self, newest_api_version: &str, endpoints: usize) -> HealthStatus {
        HealthStatus {
            status: "healthy".to_string(),
            service: self.service.clone(),
            version: self.version.clone(),
            uptime_seconds: self.uptime().as_secs(),
            newest_api_version: newest_api_version.to_string(),
            endpoints,
        }
    }
}
