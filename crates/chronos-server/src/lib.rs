//! # Chronos Server
//!
//! Hyper-based HTTP/1.1 server that resolves each request to one versioned
//! handler and runs it.
//!
//! ## Features
//!
//! - **Versioned dispatch**: method, path and version token select the handler
//! - **Served version header**: responses carry the version that actually ran
//! - **Graceful shutdown**: SIGTERM/SIGINT stop accepting and drain connections
//! - **Timeouts**: body reads and handler execution are bounded
//! - **Built-in endpoints**: `GET /health` and an optional `GET /metrics`.
//!   These paths are reserved and shadow registered `GET` routes
//!
//! ## Example
//!
//! ```rust,ignore
//! use chronos_core::{DateFormat, TokenExtractor, VersionHistory};
//! use chronos_router::VersionedRouterBuilder;
//! use chronos_server::{RequestContext, Server, ServerConfig, VersionedHandler};
//!
//! let history = VersionHistory::from_format(["2024-01-01", "2024-02-01"], &DateFormat)?;
//! let mut builder = VersionedRouterBuilder::new(history, TokenExtractor::header_default(DateFormat));
//! builder
//!     .get("/users/:id")
//!     .version("2024-01-01", VersionedHandler::no_body(get_user_v1))?
//!     .version("2024-02-01", VersionedHandler::no_body(get_user_v2))?;
//!
//! Server::new(ServerConfig::default(), builder.build()).run().await?;
//! ```

#![warn(missing_docs)]

mod config;
mod context;
mod error;
mod handler;
mod health;
mod server;
mod shutdown;

pub use config::{
    ServerConfig, ServerConfigBuilder, DEFAULT_HTTP_ADDR, DEFAULT_REQUEST_TIMEOUT_SECS,
    DEFAULT_SHUTDOWN_TIMEOUT_SECS,
};
pub use context::{RequestContext, RequestContextBuilder};
pub use error::{error_response, handler_error_response, resolve_error_response, ServerError};
pub use handler::{BoxedHandlerFuture, HandlerError, HandlerOutcome, ResponseCustomizer, VersionedHandler};
pub use health::{HealthCheck, HealthStatus};
pub use server::{HandlerRouter, HttpResponse, ResponseBody, Server, HEALTH_PATH, METRICS_PATH};
pub use shutdown::{ConnectionToken, ConnectionTracker, ShutdownSignal};
