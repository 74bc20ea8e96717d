//! Typed configuration for Chronos services.
//!
//! - TOML and JSON configuration files
//! - Environment variable overrides (`PREFIX__SECTION__KEY`)
//! - Strict parsing: unknown fields are errors
//! - Conversion of the `versioning` section into a
//!   [`VersionHistory`](chronos_core::VersionHistory) and a
//!   [`TokenExtractor`](chronos_core::TokenExtractor)
//!
//! # Example
//!
//! ```no_run
//! use chronos_config::ConfigLoader;
//!
//! # fn main() -> Result<(), chronos_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_file("chronos.toml")?
//!     .with_env_prefix("CHRONOS")
//!     .load()?;
//!
//! let history = config.versioning.history()?;
//! let extractor = config.versioning.extractor()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! http_addr = "0.0.0.0:8080"
//! shutdown_timeout_secs = 30
//! request_timeout_ms = 30000
//!
//! [versioning]
//! history = ["2024-01-01", "2024-02-01"]
//! format = "date"                     # date | integer | dotted
//! source = "header"                   # header | query
//! header_name = "x-api-version"
//! query_param = "api-version"
//! unknown_version_policy = "nearest"  # nearest | reject
//! expose_resolved_header = true
//! resolved_header_name = "x-api-version"
//!
//! [logging]
//! enabled = true
//! level = "info"
//! format = "json"                     # json | pretty
//!
//! [metrics]
//! enabled = true
//! ```
//!
//! # Environment Variable Overrides
//!
//! - `CHRONOS__SERVER__HTTP_ADDR=0.0.0.0:9000`
//! - `CHRONOS__VERSIONING__HISTORY=2024-01-01,2024-02-01`
//! - `CHRONOS__VERSIONING__UNKNOWN_VERSION_POLICY=reject`
//! - `CHRONOS__LOGGING__LEVEL=debug`
//! - `CHRONOS__METRICS__ENABLED=false`

#![warn(missing_docs)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::ChronosConfig;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::{ServerConfig, TokenSource, VersioningConfig};

pub use chronos_telemetry::{LogConfig, LogFormat, MetricsConfig};
