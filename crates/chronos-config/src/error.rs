//! Errors raised while assembling a [`ChronosConfig`](crate::ChronosConfig).

use std::path::PathBuf;

use chronos_core::HistoryError;
use thiserror::Error;

/// Errors that can occur while loading or converting configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A required config file does not exist.
    #[error("config file {path} does not exist")]
    FileNotFound {
        /// Missing path.
        path: PathBuf,
    },

    /// A config file exists but could not be read.
    #[error("cannot read config file {path}")]
    ReadError {
        /// Unreadable path.
        path: PathBuf,
        /// I/O failure.
        #[source]
        source: std::io::Error,
    },

    /// Malformed TOML, or TOML with unknown fields.
    #[error("invalid TOML config: {0}")]
    TomlError(#[from] toml::de::Error),

    /// Malformed JSON, or JSON with unknown fields.
    #[error("invalid JSON config: {0}")]
    JsonError(#[from] serde_json::Error),

    /// A field holds a value that cannot be used.
    #[error("{field}: {reason}")]
    InvalidValue {
        /// Dotted field path, e.g. `versioning.header_name`.
        field: String,
        /// What is wrong with it.
        reason: String,
    },

    /// An override variable does not parse into its field's type.
    #[error("override {var} rejected: {reason}")]
    EnvParseError {
        /// Full variable name, e.g. `CHRONOS__SERVER__REQUEST_TIMEOUT_MS`.
        var: String,
        /// Parse failure.
        reason: String,
    },

    /// The configured version history is unusable.
    #[error("invalid version history: {0}")]
    History(#[from] HistoryError),

    /// The merged config is inconsistent.
    #[error("config rejected: {0}")]
    ValidationError(String),
}

impl ConfigError {
    /// [`ConfigError::FileNotFound`] for `path`.
    pub fn file_not_found(path: impl Into<PathBuf>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    /// [`ConfigError::ReadError`] for `path`.
    pub fn read_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::ReadError {
            path: path.into(),
            source,
        }
    }

    /// [`ConfigError::InvalidValue`] for `field`.
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// [`ConfigError::EnvParseError`] for `var`.
    pub fn env_parse_error(var: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::EnvParseError {
            var: var.into(),
            reason: reason.into(),
        }
    }

    /// [`ConfigError::ValidationError`].
    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::ValidationError(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_names_path() {
        let err = ConfigError::file_not_found("/etc/chronos/config.toml");
        assert!(err.to_string().contains("/etc/chronos/config.toml"));
    }

    #[test]
    fn test_invalid_value_names_field() {
        let err = ConfigError::invalid_value("versioning.header_name", "not a valid header name");
        assert!(err.to_string().contains("versioning.header_name"));
        assert!(err.to_string().contains("not a valid header name"));
    }

    #[test]
    fn test_env_override_names_variable() {
        let err = ConfigError::env_parse_error("CHRONOS__SERVER__REQUEST_TIMEOUT_MS", "not a number: soon");
        assert!(err.to_string().contains("CHRONOS__SERVER__REQUEST_TIMEOUT_MS"));
        assert!(err.to_string().contains("soon"));
    }

    #[test]
    fn test_history_error_converts() {
        let err: ConfigError = HistoryError::Empty.into();
        assert!(matches!(err, ConfigError::History(HistoryError::Empty)));
        assert!(err.to_string().starts_with("invalid version history"));
    }
}
