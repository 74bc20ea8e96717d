//! Layered configuration loading.

use std::env;
use std::fs;
use std::path::Path;

use chronos_core::{FormatKind, UnknownVersionPolicy};
use chronos_telemetry::LogFormat;

use crate::{ChronosConfig, ConfigError, TokenSource};

/// Configuration loader.
///
/// Layers are applied in order, later layers overriding earlier ones:
/// 1. Defaults or a preset
/// 2. A TOML or JSON file (replaces the whole configuration)
/// 3. `PREFIX__SECTION__KEY` environment variables
///
/// # Example
///
/// ```no_run
/// use chronos_config::ConfigLoader;
///
/// # fn main() -> Result<(), chronos_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_dotenv()?
///     .with_optional_file("chronos.toml")?
///     .with_env_prefix("CHRONOS")
///     .load()?;
///
/// println!("listening on {}", config.server.http_addr);
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: ChronosConfig,
    env_prefix: Option<String>,
    file_loaded: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a loader starting from defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: ChronosConfig::default(),
            env_prefix: None,
            file_loaded: false,
        }
    }

    /// Reset to default values.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.config = ChronosConfig::default();
        self
    }

    /// Start from [`ChronosConfig::development`].
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = ChronosConfig::development();
        self
    }

    /// Start from [`ChronosConfig::production`].
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = ChronosConfig::production();
        self
    }

    /// Load configuration from a `.toml` or `.json` file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file is missing, unreadable, has an
    /// unsupported extension, or does not parse (unknown fields included).
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;

        self.config = Self::parse_file(&content, path)?;
        self.file_loaded = true;
        tracing::debug!(path = %path.display(), "Loaded configuration file");

        Ok(self)
    }

    /// Like [`with_file`](Self::with_file), but a missing file is skipped.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be loaded.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Load configuration from a string in the given format (`toml` or `json`).
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if parsing fails or the format is unsupported.
    ///
    /// # Example
    ///
    /// ```
    /// use chronos_config::ConfigLoader;
    ///
    /// let toml = r#"
    ///     [versioning]
    ///     history = ["2024-01-01", "2024-02-01"]
    /// "#;
    ///
    /// let config = ConfigLoader::new()
    ///     .with_string(toml, "toml")
    ///     .unwrap()
    ///     .load()
    ///     .unwrap();
    ///
    /// assert_eq!(config.versioning.history.len(), 2);
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = match format.to_lowercase().as_str() {
            "toml" => toml::from_str(content)?,
            "json" => serde_json::from_str(content)?,
            _ => {
                return Err(ConfigError::validation_error(format!(
                    "unsupported configuration format: {format}"
                )))
            }
        };
        Ok(self)
    }

    /// Enable environment overrides with the given prefix.
    ///
    /// With prefix `CHRONOS`, `CHRONOS__SERVER__HTTP_ADDR` overrides
    /// `server.http_addr` and `CHRONOS__VERSIONING__HISTORY` takes a
    /// comma-separated list.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Load variables from a `.env` file, if one exists.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a `.env` file exists but cannot be parsed.
    pub fn with_dotenv(self) -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => {
                tracing::debug!(path = %path.display(), "Loaded .env file");
                Ok(self)
            }
            Err(e) if e.not_found() => Ok(self),
            Err(e) => Err(ConfigError::validation_error(format!(
                "failed to load .env file: {e}"
            ))),
        }
    }

    /// Whether a configuration file has been loaded.
    #[must_use]
    pub fn file_loaded(&self) -> bool {
        self.file_loaded
    }

    /// Apply environment overrides and validate.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an environment variable does not parse or
    /// validation fails.
    pub fn load(mut self) -> Result<ChronosConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            self.apply_env_overrides(&prefix)?;
        }

        self.config.validate()?;

        Ok(self.config)
    }

    /// Return the configuration without env overrides or validation.
    #[must_use]
    pub fn load_unvalidated(self) -> ChronosConfig {
        self.config
    }

    fn parse_file(content: &str, path: &Path) -> Result<ChronosConfig, ConfigError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        match extension.as_deref() {
            Some("toml") => Ok(toml::from_str(content)?),
            Some("json") => Ok(serde_json::from_str(content)?),
            _ => Err(ConfigError::validation_error(format!(
                "unsupported configuration file format: {}",
                path.display()
            ))),
        }
    }

    fn apply_env_overrides(&mut self, prefix: &str) -> Result<(), ConfigError> {
        let scoped = format!("{prefix}__");
        let mut vars: Vec<(String, String)> = env::vars()
            .filter(|(k, _)| k.starts_with(&scoped))
            .collect();
        vars.sort();

        for (key, value) in vars {
            self.apply_env_var(&key, &value, prefix)?;
        }

        Ok(())
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let key_without_prefix = key
            .strip_prefix(prefix)
            .and_then(|k| k.strip_prefix("__"))
            .ok_or_else(|| ConfigError::env_parse_error(key, "invalid key format"))?;

        let parts: Vec<&str> = key_without_prefix.split("__").collect();

        match parts.as_slice() {
            // Server
            ["SERVER", "HTTP_ADDR"] => {
                self.config.server.http_addr = value.to_string();
            }
            ["SERVER", "SHUTDOWN_TIMEOUT_SECS"] => {
                self.config.server.shutdown_timeout_secs = value
                    .parse()
                    .map_err(|_| ConfigError::env_parse_error(key, "expected integer"))?;
            }
            ["SERVER", "REQUEST_TIMEOUT_MS"] => {
                self.config.server.request_timeout_ms = value
                    .parse()
                    .map_err(|_| ConfigError::env_parse_error(key, "expected integer"))?;
            }

            // Versioning
            ["VERSIONING", "HISTORY"] => {
                self.config.versioning.history = value
                    .split(',')
                    .map(str::trim)
                    .filter(|label| !label.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            ["VERSIONING", "FORMAT"] => {
                self.config.versioning.format = value
                    .parse::<FormatKind>()
                    .map_err(|e| ConfigError::env_parse_error(key, e))?;
            }
            ["VERSIONING", "SOURCE"] => {
                self.config.versioning.source = value
                    .parse::<TokenSource>()
                    .map_err(|e| ConfigError::env_parse_error(key, e))?;
            }
            ["VERSIONING", "HEADER_NAME"] => {
                self.config.versioning.header_name = value.to_string();
            }
            ["VERSIONING", "QUERY_PARAM"] => {
                self.config.versioning.query_param = value.to_string();
            }
            ["VERSIONING", "UNKNOWN_VERSION_POLICY"] => {
                self.config.versioning.unknown_version_policy = value
                    .parse::<UnknownVersionPolicy>()
                    .map_err(|e| ConfigError::env_parse_error(key, e))?;
            }
            ["VERSIONING", "EXPOSE_RESOLVED_HEADER"] => {
                self.config.versioning.expose_resolved_header = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))?;
            }
            ["VERSIONING", "RESOLVED_HEADER_NAME"] => {
                self.config.versioning.resolved_header_name = value.to_string();
            }

            // Logging
            ["LOGGING", "ENABLED"] => {
                self.config.logging.enabled = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))?;
            }
            ["LOGGING", "LEVEL"] => {
                self.config.logging.level = value.to_string();
            }
            ["LOGGING", "FORMAT"] => {
                self.config.logging.format = value
                    .parse::<LogFormat>()
                    .map_err(|_| ConfigError::env_parse_error(key, "expected 'json' or 'pretty'"))?;
            }

            // Metrics
            ["METRICS", "ENABLED"] => {
                self.config.metrics.enabled = parse_bool(value)
                    .ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))?;
            }

            _ => {
                tracing::debug!(key, "Ignoring unrecognized configuration variable");
            }
        }

        Ok(())
    }
}

/// Parse a boolean from a string.
fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_loader_new() {
        let config = ConfigLoader::new().load().unwrap();
        assert_eq!(config.server.http_addr, "0.0.0.0:8080");
    }

    #[test]
    fn test_loader_presets() {
        let config = ConfigLoader::new().with_development().load().unwrap();
        assert_eq!(config.logging.level, "debug");

        let config = ConfigLoader::new()
            .with_development()
            .with_defaults()
            .load()
            .unwrap();
        assert_eq!(config.logging.level, "info");

        let config = ConfigLoader::new().with_production().load().unwrap();
        assert_eq!(
            config.versioning.unknown_version_policy,
            UnknownVersionPolicy::Reject
        );
    }

    #[test]
    fn test_loader_with_string_toml() {
        let toml = r#"
            [server]
            http_addr = "127.0.0.1:3000"

            [versioning]
            history = ["1", "2", "3"]
            format = "integer"
            source = "query"
            unknown_version_policy = "reject"
        "#;

        let config = ConfigLoader::new()
            .with_string(toml, "toml")
            .unwrap()
            .load()
            .unwrap();

        assert_eq!(config.server.http_addr, "127.0.0.1:3000");
        assert_eq!(config.versioning.format, FormatKind::Integer);
        assert_eq!(config.versioning.source, TokenSource::Query);
        assert_eq!(config.versioning.history().unwrap().len(), 3);
    }

    #[test]
    fn test_loader_with_string_json() {
        let json = r#"{"versioning": {"history": ["2024-01-01"]}, "metrics": {"enabled": false}}"#;

        let config = ConfigLoader::new()
            .with_string(json, "json")
            .unwrap()
            .load()
            .unwrap();

        assert_eq!(config.versioning.history, vec!["2024-01-01"]);
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn test_loader_with_string_unsupported_format() {
        let result = ConfigLoader::new().with_string("a: b", "yaml");
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_loader_rejects_unknown_fields() {
        let toml = r#"
            [versioning]
            histroy = ["2024-01-01"]
        "#;
        let result = ConfigLoader::new().with_string(toml, "toml");
        assert!(matches!(result, Err(ConfigError::TomlError(_))));
    }

    #[test]
    fn test_loader_with_file_not_found() {
        let result = ConfigLoader::new().with_file("/nonexistent/chronos.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound { .. })));
    }

    #[test]
    fn test_loader_with_optional_file_not_found() {
        let loader = ConfigLoader::new()
            .with_optional_file("/nonexistent/chronos.toml")
            .unwrap();
        assert!(!loader.file_loaded());
        assert_eq!(loader.load().unwrap().server.http_addr, "0.0.0.0:8080");
    }

    #[test]
    fn test_loader_with_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chronos.toml");
        let mut file = fs::File::create(&path).unwrap();
        writeln!(
            file,
            "[versioning]\nhistory = [\"2024-01-01\", \"2024-02-01\"]\nheader_name = \"x-version\""
        )
        .unwrap();

        let loader = ConfigLoader::new().with_file(&path).unwrap();
        assert!(loader.file_loaded());

        let config = loader.load().unwrap();
        assert_eq!(config.versioning.header_name, "x-version");
        assert_eq!(config.versioning.history.len(), 2);
    }

    #[test]
    fn test_loader_with_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chronos.json");
        fs::write(&path, r#"{"server": {"request_timeout_ms": 500}}"#).unwrap();

        let config = ConfigLoader::new().with_file(&path).unwrap().load().unwrap();
        assert_eq!(config.server.request_timeout_ms, 500);
    }

    #[test]
    fn test_loader_with_unsupported_extension() {
        let file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        let result = ConfigLoader::new().with_file(file.path());
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));
    }

    #[test]
    fn test_loader_validation_failure() {
        let toml = r#"
            [versioning]
            history = ["2024-02-01", "2024-02-01"]
        "#;
        let result = ConfigLoader::new().with_string(toml, "toml").unwrap().load();
        assert!(matches!(result, Err(ConfigError::History(_))));
    }

    #[test]
    fn test_loader_load_unvalidated() {
        let mut config = ConfigLoader::new().load_unvalidated();
        config.server.http_addr = "not an address".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_bool() {
        for s in ["true", "True", "1", "yes", "on"] {
            assert_eq!(parse_bool(s), Some(true), "{s}");
        }
        for s in ["false", "FALSE", "0", "no", "off"] {
            assert_eq!(parse_bool(s), Some(false), "{s}");
        }
        assert_eq!(parse_bool("maybe"), None);
        assert_eq!(parse_bool(""), None);
    }

    // Overrides are exercised through apply_env_var directly; mutating the
    // process environment would race with other tests.

    #[test]
    fn test_apply_env_var_server() {
        let mut loader = ConfigLoader::new();
        loader
            .apply_env_var("TEST__SERVER__HTTP_ADDR", "127.0.0.1:9000", "TEST")
            .unwrap();
        loader
            .apply_env_var("TEST__SERVER__REQUEST_TIMEOUT_MS", "250", "TEST")
            .unwrap();
        assert_eq!(loader.config.server.http_addr, "127.0.0.1:9000");
        assert_eq!(loader.config.server.request_timeout_ms, 250);
    }

    #[test]
    fn test_apply_env_var_history_list() {
        let mut loader = ConfigLoader::new();
        loader
            .apply_env_var("TEST__VERSIONING__HISTORY", "2024-01-01, 2024-02-01,", "TEST")
            .unwrap();
        assert_eq!(
            loader.config.versioning.history,
            vec!["2024-01-01", "2024-02-01"]
        );
    }

    #[test]
    fn test_apply_env_var_versioning_enums() {
        let mut loader = ConfigLoader::new();
        loader
            .apply_env_var("TEST__VERSIONING__FORMAT", "dotted", "TEST")
            .unwrap();
        loader
            .apply_env_var("TEST__VERSIONING__SOURCE", "query", "TEST")
            .unwrap();
        loader
            .apply_env_var("TEST__VERSIONING__UNKNOWN_VERSION_POLICY", "reject", "TEST")
            .unwrap();
        loader
            .apply_env_var("TEST__VERSIONING__EXPOSE_RESOLVED_HEADER", "off", "TEST")
            .unwrap();

        let versioning = &loader.config.versioning;
        assert_eq!(versioning.format, FormatKind::Dotted);
        assert_eq!(versioning.source, TokenSource::Query);
        assert_eq!(versioning.unknown_version_policy, UnknownVersionPolicy::Reject);
        assert!(!versioning.expose_resolved_header);
    }

    #[test]
    fn test_apply_env_var_invalid_values() {
        let mut loader = ConfigLoader::new();
        assert!(loader
            .apply_env_var("TEST__SERVER__SHUTDOWN_TIMEOUT_SECS", "soon", "TEST")
            .is_err());
        assert!(loader
            .apply_env_var("TEST__VERSIONING__FORMAT", "roman", "TEST")
            .is_err());
        assert!(loader
            .apply_env_var("TEST__METRICS__ENABLED", "perhaps", "TEST")
            .is_err());
        assert!(loader.apply_env_var("TESTSERVER", "x", "TEST").is_err());
    }

    #[test]
    fn test_apply_env_var_logging_and_metrics() {
        let mut loader = ConfigLoader::new();
        loader
            .apply_env_var("TEST__LOGGING__FORMAT", "pretty", "TEST")
            .unwrap();
        loader
            .apply_env_var("TEST__LOGGING__LEVEL", "chronos_router=debug", "TEST")
            .unwrap();
        loader
            .apply_env_var("TEST__METRICS__ENABLED", "false", "TEST")
            .unwrap();
        assert_eq!(loader.config.logging.format, LogFormat::Pretty);
        assert_eq!(loader.config.logging.level, "chronos_router=debug");
        assert!(!loader.config.metrics.enabled);
    }

    #[test]
    fn test_apply_env_var_unknown_key_ignored() {
        let mut loader = ConfigLoader::new();
        loader
            .apply_env_var("TEST__DATABASE__URL", "postgres://", "TEST")
            .unwrap();
        assert_eq!(loader.config, ChronosConfig::default());
    }
}
