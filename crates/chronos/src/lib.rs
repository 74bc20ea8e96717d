//! # Chronos
//!
//! **Version-aware HTTP route resolution**
//!
//! Chronos serves several API versions from one process. Every endpoint
//! registers an implementation per release date (or release number), and
//! each request is served by the newest implementation that is not newer
//! than the version the client asked for.
//!
//! - **Nearest-earlier resolution**: clients pinned to an old version keep
//!   getting the behavior they were built against
//! - **Sparse registration**: an endpoint only needs an implementation for
//!   the versions in which it changed
//! - **Served version header**: responses say which version actually ran
//! - **Ambient stack**: layered configuration, structured logging, Prometheus
//!   metrics and graceful shutdown
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use chronos::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ConfigLoader::new()
//!         .with_optional_file("chronos.toml")?
//!         .with_env_prefix("CHRONOS")
//!         .load()?;
//!     let metrics = init_telemetry(&config.logging, &config.metrics)?;
//!
//!     let mut builder = chronos::router_builder(&config)?;
//!     builder
//!         .get("/users/:id")
//!         .version("2024-01-01", VersionedHandler::no_body(get_user_v1))?
//!         .version("2024-02-01", VersionedHandler::no_body(get_user_v2))?;
//!
//!     let server_config = chronos::server_config_builder(&config)?.build();
//!     Server::new(server_config, builder.build())
//!         .with_metrics(metrics)
//!         .run()
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Resolution
//!
//! ```text
//! history:        2024-01-01 ── 2024-02-01 ── 2024-03-01
//! GET /users/:id:     v1                          v3
//!
//! token 2024-02-15  →  v1 (downgraded)
//! token 2024-03-01  →  v3
//! no token          →  v3
//! token 2023-06-01  →  400 NO_QUALIFYING_VERSION
//! ```

#![doc(html_root_url = "https://docs.rs/chronos/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export core types
pub use chronos_core as core;

// Re-export router types
pub use chronos_router as router;

// Re-export configuration types
pub use chronos_config as config;

// Re-export telemetry types
pub use chronos_telemetry as telemetry;

// Re-export server types
pub use chronos_server as server;

use chronos_config::{ChronosConfig, ConfigError};
use chronos_core::{FormatKind, TokenExtractor};
use chronos_router::VersionedRouterBuilder;
use chronos_server::{Server, ServerConfigBuilder, VersionedHandler};

/// Extractor type produced from a [`ChronosConfig`].
pub type ConfiguredExtractor = TokenExtractor<FormatKind>;

/// Router builder produced by [`router_builder`].
pub type ConfiguredRouterBuilder = VersionedRouterBuilder<ConfiguredExtractor, VersionedHandler>;

/// Server type for routers built from a [`ChronosConfig`].
pub type ConfiguredServer = Server<ConfiguredExtractor>;

/// Creates a router builder from the `versioning` section: history, token
/// extractor and unknown-version policy.
///
/// # Errors
///
/// Returns [`ConfigError`] if the history is empty or invalid, or if the
/// extractor settings are unusable.
pub fn router_builder(config: &ChronosConfig) -> Result<ConfiguredRouterBuilder, ConfigError> {
    let history = config.versioning.history()?;
    let extractor = config.versioning.extractor()?;
    Ok(VersionedRouterBuilder::new(history, extractor).with_policy(config.versioning.unknown_version_policy))
}

/// Creates a server configuration builder from the `server` and
/// `versioning` sections. Service name and version can still be set on the
/// returned builder.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValue`] for an invalid served-version header
/// name.
pub fn server_config_builder(config: &ChronosConfig) -> Result<ServerConfigBuilder, ConfigError> {
    Ok(ServerConfigBuilder::new()
        .http_addr(config.server.http_addr.clone())
        .shutdown_timeout(config.server.shutdown_timeout())
        .request_timeout(config.server.request_timeout())
        .resolved_header(config.versioning.resolved_header()?))
}

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust,ignore
/// use chronos::prelude::*;
/// ```
pub mod prelude {
    pub use chronos_core::{
        AnyVersion, DateFormat, DottedFormat, EndpointKey, FormatKind, IntegerFormat, ResolveError,
        TokenExtractor, UnknownVersionPolicy, VersionExtractor, VersionFormat, VersionHistory,
    };

    pub use chronos_router::{Params, ResolvedRoute, VersionedRouter, VersionedRouterBuilder};

    pub use chronos_config::{ChronosConfig, ConfigError, ConfigLoader};

    pub use chronos_telemetry::{init_telemetry, LogConfig, MetricsConfig, MetricsRegistry};

    pub use chronos_server::{
        HandlerError, HandlerOutcome, RequestContext, Server, ServerConfig, ShutdownSignal,
        VersionedHandler,
    };

    pub use crate::{router_builder, server_config_builder, ConfiguredServer};
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use chronos_config::ConfigLoader;
    use chronos_core::UnknownVersionPolicy;
    use chronos_server::RequestContext;
    use http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use std::time::Duration;

    fn config(toml: &str) -> ChronosConfig {
        ConfigLoader::new()
            .with_string(toml, "toml")
            .unwrap()
            .load()
            .unwrap()
    }

    fn label(version: &'static str) -> VersionedHandler {
        VersionedHandler::no_body(move |_ctx: RequestContext| async move { Ok(version) })
    }

    #[test]
    fn test_router_builder_applies_versioning_section() {
        let config = config(
            r#"
            [versioning]
            history = ["1", "2", "3"]
            format = "integer"
            source = "query"
            query_param = "v"
            unknown_version_policy = "reject"
            "#,
        );

        let builder = router_builder(&config).unwrap();
        assert_eq!(builder.history().len(), 3);

        let router = builder.build();
        assert_eq!(router.policy(), UnknownVersionPolicy::Reject);
    }

    #[test]
    fn test_router_builder_requires_history() {
        let err = router_builder(&ChronosConfig::default()).unwrap_err();
        assert!(matches!(err, ConfigError::History(_)));
    }

    #[test]
    fn test_server_config_builder_maps_sections() {
        let config = config(
            r#"
            [server]
            http_addr = "127.0.0.1:9000"
            shutdown_timeout_secs = 5
            request_timeout_ms = 250

            [versioning]
            resolved_header_name = "x-served-version"
            "#,
        );

        let server_config = server_config_builder(&config).unwrap().service_name("svc").build();
        assert_eq!(server_config.http_addr(), "127.0.0.1:9000");
        assert_eq!(server_config.shutdown_timeout(), Duration::from_secs(5));
        assert_eq!(server_config.request_timeout(), Duration::from_millis(250));
        assert_eq!(server_config.resolved_header().unwrap().as_str(), "x-served-version");
        assert_eq!(server_config.service_name(), "svc");
    }

    #[test]
    fn test_server_config_builder_hidden_header() {
        let config = config("[versioning]\nexpose_resolved_header = false\n");
        let server_config = server_config_builder(&config).unwrap().build();
        assert!(server_config.resolved_header().is_none());
    }

    #[tokio::test]
    async fn test_configured_server_dispatch() {
        let config = config(
            r#"
            [versioning]
            history = ["1.0", "1.5", "2.0"]
            format = "dotted"
            "#,
        );

        let mut builder = router_builder(&config).unwrap();
        builder
            .get("/items")
            .version("1.0", label("one"))
            .unwrap()
            .version("2.0", label("two"))
            .unwrap();

        let server: ConfiguredServer = Server::new(server_config_builder(&config).unwrap().build(), builder.build());

        let request = Request::get("/items")
            .header("x-api-version", "1.5")
            .body(Bytes::new())
            .unwrap();
        let response = server.dispatch(request).await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-api-version"], "1.0");
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, Bytes::from(r#""one""#));
    }
}
