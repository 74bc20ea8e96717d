//! Configuration schema types.
//!
//! The logging and metrics sections reuse the telemetry crate's own config
//! types, so a loaded [`ChronosConfig`](crate::ChronosConfig) can be handed
//! straight to `chronos_telemetry::init_telemetry`.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chronos_core::{
    AnyVersion, FormatKind, TokenExtractor, UnknownVersionPolicy, VersionHistory, VersionSource,
    DEFAULT_VERSION_HEADER,
};
use http::header::HeaderName;
use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Server configuration section.
///
/// # Example
///
/// ```
/// use chronos_config::ServerConfig;
///
/// let config = ServerConfig {
///     http_addr: "127.0.0.1:3000".to_string(),
///     ..Default::default()
/// };
/// assert_eq!(config.request_timeout_ms, 30000);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// HTTP bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_http_addr")]
    pub http_addr: String,

    /// Graceful shutdown timeout in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Request timeout in milliseconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            request_timeout_ms: default_request_timeout(),
        }
    }
}

impl ServerConfig {
    /// Returns the shutdown timeout as a [`Duration`].
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Returns the request timeout as a [`Duration`].
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn default_http_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_request_timeout() -> u64 {
    30000
}

/// Where clients put the version token.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenSource {
    /// A request header, named by `versioning.header_name`.
    #[default]
    Header,
    /// A query parameter, named by `versioning.query_param`.
    Query,
}

impl FromStr for TokenSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "header" => Ok(Self::Header),
            "query" => Ok(Self::Query),
            other => Err(format!("unknown token source '{other}'")),
        }
    }
}

impl fmt::Display for TokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Header => f.write_str("header"),
            Self::Query => f.write_str("query"),
        }
    }
}

/// Versioning configuration section.
///
/// ```toml
/// [versioning]
/// history = ["2024-01-01", "2024-02-01"]
/// format = "date"
/// source = "header"
/// header_name = "x-api-version"
/// unknown_version_policy = "nearest"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct VersioningConfig {
    /// Every released version, oldest first.
    #[serde(default)]
    pub history: Vec<String>,

    /// How version labels and tokens are parsed.
    #[serde(default)]
    pub format: FormatKind,

    /// Where the token is read from.
    #[serde(default)]
    pub source: TokenSource,

    /// Header carrying the token when `source = "header"`.
    #[serde(default = "default_header_name")]
    pub header_name: String,

    /// Query parameter carrying the token when `source = "query"`.
    #[serde(default = "default_query_param")]
    pub query_param: String,

    /// Handling of tokens newer than the newest history version.
    #[serde(default)]
    pub unknown_version_policy: UnknownVersionPolicy,

    /// Whether responses carry the version that was actually served.
    #[serde(default = "default_true")]
    pub expose_resolved_header: bool,

    /// Response header naming the served version.
    #[serde(default = "default_header_name")]
    pub resolved_header_name: String,
}

impl Default for VersioningConfig {
    fn default() -> Self {
        Self {
            history: Vec::new(),
            format: FormatKind::default(),
            source: TokenSource::default(),
            header_name: default_header_name(),
            query_param: default_query_param(),
            unknown_version_policy: UnknownVersionPolicy::default(),
            expose_resolved_header: true,
            resolved_header_name: default_header_name(),
        }
    }
}

fn default_header_name() -> String {
    DEFAULT_VERSION_HEADER.to_string()
}

fn default_query_param() -> String {
    "api-version".to_string()
}

fn default_true() -> bool {
    true
}

impl VersioningConfig {
    /// Parses the configured labels into a [`VersionHistory`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::History`] for an empty history, duplicate
    /// labels or values, and labels the configured format cannot parse.
    pub fn history(&self) -> Result<VersionHistory<AnyVersion>, ConfigError> {
        Ok(VersionHistory::from_format(&self.history, &self.format)?)
    }

    /// Builds the token extractor described by this section.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for an invalid header name or an
    /// empty query parameter.
    pub fn extractor(&self) -> Result<TokenExtractor<FormatKind>, ConfigError> {
        let source = match self.source {
            TokenSource::Header => {
                VersionSource::Header(parse_header_name("versioning.header_name", &self.header_name)?)
            }
            TokenSource::Query => {
                if self.query_param.trim().is_empty() {
                    return Err(ConfigError::invalid_value(
                        "versioning.query_param",
                        "must not be empty",
                    ));
                }
                VersionSource::Query(self.query_param.clone())
            }
        };
        Ok(TokenExtractor::new(source, self.format))
    }

    /// Returns the response header for the served version, or `None` when
    /// it is not exposed.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for an invalid header name.
    pub fn resolved_header(&self) -> Result<Option<HeaderName>, ConfigError> {
        if !self.expose_resolved_header {
            return Ok(None);
        }
        parse_header_name("versioning.resolved_header_name", &self.resolved_header_name).map(Some)
    }
}

fn parse_header_name(field: &str, value: &str) -> Result<HeaderName, ConfigError> {
    HeaderName::from_bytes(value.trim().as_bytes())
        .map_err(|e| ConfigError::invalid_value(field, format!("'{value}' is not a valid header name: {e}")))
}
