//! HTTP server.
//!
//! Every request goes through [`Server::dispatch`]:
//!
//! 1. Built-in endpoints (`GET /health`, `GET /metrics`) are answered directly.
//!    They are reserved: a registered `GET` route matching one of them is
//!    never reached, and [`Server::serve`] warns about each one at startup.
//! 2. The router resolves method, path and version token to one
//!    [`VersionedHandler`](crate::VersionedHandler).
//! 3. The handler runs under the request timeout.
//! 4. The response gets the served version header, and failures become
//!    JSON error envelopes.
//!
//! # Example
//!
//! ```rust,ignore
//! use chronos_server::{Server, ServerConfig};
//!
//! let server = Server::new(ServerConfig::default(), router);
//! server.run().await?;
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use chronos_core::{EndpointKey, VersionExtractor};
use chronos_router::VersionedRouter;
use chronos_telemetry::metrics::{record_request, record_resolution, record_resolution_failure};
use chronos_telemetry::{InFlightGuard, MetricsRegistry};
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::{Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};
use tracing::Instrument;

use crate::config::ServerConfig;
use crate::context::RequestContext;
use crate::error::{error_response, handler_error_response, resolve_error_response, ServerError};
use crate::handler::VersionedHandler;
use crate::health::HealthCheck;
use crate::shutdown::{ConnectionTracker, ShutdownSignal};

/// Type alias for HTTP response body.
pub type ResponseBody = Full<Bytes>;

/// Type alias for the HTTP response.
pub type HttpResponse = Response<ResponseBody>;

/// A router whose implementations are [`VersionedHandler`]s.
pub type HandlerRouter<X> = VersionedRouter<X, VersionedHandler>;

const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Endpoint label for requests that never resolved.
const UNRESOLVED_ENDPOINT: &str = "unresolved";

/// Path of the built-in health endpoint.
pub const HEALTH_PATH: &str = "/health";

/// Path of the built-in metrics endpoint, served when a registry is attached.
pub const METRICS_PATH: &str = "/metrics";

/// The Chronos HTTP server.
///
/// `GET /health` is always answered by the server, and `GET /metrics` is
/// answered whenever a [`MetricsRegistry`] is attached. Both take priority
/// over the router, so versioned `GET` routes on those paths are shadowed
/// (see [`Server::shadowed_routes`]). Other methods on those paths still go
/// through the router.
pub struct Server<X: VersionExtractor> {
    config: ServerConfig,
    router: Arc<HandlerRouter<X>>,
    health: HealthCheck,
    metrics: Option<MetricsRegistry>,
}

impl<X: VersionExtractor> Server<X> {
    /// Creates a server around a built router.
    pub fn new(config: ServerConfig, router: impl Into<Arc<HandlerRouter<X>>>) -> Self {
        let health = HealthCheck::new(config.service_name(), config.service_version());
        Self {
            config,
            router: router.into(),
            health,
            metrics: None,
        }
    }

    /// Serves `GET /metrics` from the given registry. `None` disables it.
    #[must_use]
    pub fn with_metrics(mut self, registry: Option<MetricsRegistry>) -> Self {
        self.metrics = registry;
        self
    }

    /// Returns the server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Returns the router.
    #[must_use]
    pub fn router(&self) -> &HandlerRouter<X> {
        &self.router
    }

    /// Returns the health reporter.
    #[must_use]
    pub fn health(&self) -> &HealthCheck {
        &self.health
    }

    /// Returns the registered endpoints that a built-in `GET` endpoint
    /// answers first. `/metrics` only counts while a registry is attached.
    #[must_use]
    pub fn shadowed_routes(&self) -> Vec<&EndpointKey> {
        let mut reserved = vec![HEALTH_PATH];
        if self.metrics.is_some() {
            reserved.push(METRICS_PATH);
        }
        reserved
            .into_iter()
            .filter_map(|path| self.router.table().match_request(&Method::GET, path).ok())
            .map(|(entry, _)| entry.key())
            .collect()
    }

    /// Runs until SIGTERM or SIGINT.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address is invalid or taken.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_with_shutdown(ShutdownSignal::with_os_signals()).await
    }

    /// Binds the configured address and runs until `shutdown` fires.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] if the address is invalid or taken.
    pub async fn run_with_shutdown(self, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let addr = self.config.socket_addr().map_err(|e| {
            ServerError::Bind(format!("invalid address '{}': {e}", self.config.http_addr()))
        })?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Bind(format!("failed to bind to {addr}: {e}")))?;

        self.serve(listener, shutdown).await
    }

    /// Accepts connections from `listener` until `shutdown` fires, then waits
    /// up to the shutdown timeout for open connections to drain.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the listener has no local address.
    pub async fn serve(self, listener: TcpListener, shutdown: ShutdownSignal) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        for endpoint in self.shadowed_routes() {
            tracing::warn!(%endpoint, "Registered route is shadowed by a built-in endpoint");
        }
        tracing::info!(
            %addr,
            endpoints = self.router.table().len(),
            newest_version = self.router.history().newest().label(),
            "Server listening"
        );

        let server = Arc::new(self);
        let tracker = ConnectionTracker::new();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, remote_addr)) => {
                            let server = Arc::clone(&server);
                            let token = tracker.acquire();
                            let shutdown = shutdown.clone();

                            tokio::spawn(async move {
                                if let Err(e) = server.handle_connection(stream, remote_addr, shutdown).await {
                                    tracing::debug!(%remote_addr, error = %e, "Connection error");
                                }
                                drop(token);
                            });
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to accept connection");
                        }
                    }
                }

                () = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, no longer accepting connections");
                    break;
                }
            }
        }

        let shutdown_timeout = server.config.shutdown_timeout();
        tracing::info!(
            timeout = ?shutdown_timeout,
            connections = tracker.active_connections(),
            "Waiting for connections to close"
        );

        tokio::select! {
            () = tracker.wait_for_shutdown() => {
                tracing::info!("All connections closed");
            }
            () = tokio::time::sleep(shutdown_timeout) => {
                tracing::warn!(
                    connections = tracker.active_connections(),
                    "Shutdown timeout reached with connections still open"
                );
            }
        }

        tracing::info!("Server stopped");
        Ok(())
    }

    async fn handle_connection(
        self: &Arc<Self>,
        stream: TcpStream,
        remote_addr: SocketAddr,
        shutdown: ShutdownSignal,
    ) -> Result<(), hyper::Error> {
        let io = TokioIo::new(stream);
        let server = Arc::clone(self);

        let service = service_fn(move |req: Request<Incoming>| {
            let server = Arc::clone(&server);
            async move { server.handle_request(req).await }
        });

        let conn = http1::Builder::new().serve_connection(io, service);
        tokio::pin!(conn);

        tokio::select! {
            result = conn.as_mut() => return result,
            () = shutdown.recv() => {
                tracing::debug!(%remote_addr, "Draining connection for shutdown");
                conn.as_mut().graceful_shutdown();
            }
        }

        conn.await
    }

    async fn handle_request(&self, req: Request<Incoming>) -> Result<HttpResponse, Infallible> {
        let (parts, body) = req.into_parts();

        let body = match tokio::time::timeout(self.config.request_timeout(), body.collect()).await {
            Ok(Ok(collected)) => collected.to_bytes(),
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "Failed to read request body");
                return Ok(error_response(
                    StatusCode::BAD_REQUEST,
                    "BODY_READ_ERROR",
                    &format!("failed to read request body: {e}"),
                    None,
                ));
            }
            Err(_) => {
                tracing::warn!(path = parts.uri.path(), "Request body read timed out");
                return Ok(error_response(
                    StatusCode::REQUEST_TIMEOUT,
                    "REQUEST_TIMEOUT",
                    "request body read timed out",
                    None,
                ));
            }
        };

        Ok(self.dispatch(Request::from_parts(parts, body)).await)
    }

    /// Resolves and runs one request.
    ///
    /// Never fails: every error becomes a JSON error response.
    pub async fn dispatch(&self, request: Request<Bytes>) -> HttpResponse {
        let start = Instant::now();
        let _in_flight = InFlightGuard::new();

        if request.method() == Method::GET {
            match request.uri().path() {
                HEALTH_PATH => return self.handle_health(),
                METRICS_PATH => {
                    if let Some(registry) = &self.metrics {
                        return metrics_response(registry);
                    }
                }
                _ => {}
            }
        }

        let resolved = match self.router.resolve_request(&request) {
            Ok(resolved) => resolved,
            Err(err) => {
                record_resolution_failure(err.code());
                tracing::debug!(
                    method = %request.method(),
                    path = request.uri().path(),
                    code = err.code(),
                    error = %err,
                    "Resolution failed"
                );
                let response = resolve_error_response(&err);
                record_request(UNRESOLVED_ENDPOINT, response.status().as_u16(), start.elapsed());
                return response;
            }
        };

        let endpoint = resolved.endpoint();
        let handler = resolved.implementation();
        let resolved_version = resolved.resolved_version();
        let requested_version = resolved.requested_version().map(str::to_string);
        let downgraded = resolved.is_downgraded();

        record_resolution(
            endpoint.method().as_str(),
            endpoint.path(),
            resolved_version,
            downgraded,
        );

        let (parts, body) = request.into_parts();
        let mut ctx = RequestContext::builder(endpoint.clone(), resolved_version)
            .requested_version(requested_version.clone())
            .downgraded(downgraded)
            .params(resolved.into_params())
            .headers(parts.headers);
        if let Some(query) = parts.uri.query() {
            ctx = ctx.query(query);
        }
        let ctx = ctx.build();
        let request_id = ctx.request_id().to_string();

        let span = tracing::info_span!(
            "request",
            request_id = %request_id,
            endpoint = %endpoint,
            resolved_version,
        );

        let result = tokio::time::timeout(self.config.request_timeout(), handler.call(ctx, body))
            .instrument(span)
            .await;

        let mut response = match result {
            Ok(Ok(outcome)) => {
                let mut response = Response::new(Full::new(Bytes::new()));
                outcome.apply(&mut response);
                response
            }
            Ok(Err(err)) => {
                if err.status_code().is_server_error() {
                    tracing::error!(request_id = %request_id, endpoint = %endpoint, error = %err, "Handler failed");
                } else {
                    tracing::debug!(request_id = %request_id, endpoint = %endpoint, error = %err, "Handler rejected request");
                }
                handler_error_response(&err, &request_id)
            }
            Err(_) => {
                tracing::warn!(request_id = %request_id, endpoint = %endpoint, "Handler timed out");
                error_response(
                    StatusCode::GATEWAY_TIMEOUT,
                    "HANDLER_TIMEOUT",
                    "handler execution timed out",
                    Some(&request_id),
                )
            }
        };

        if let Some(header) = self.config.resolved_header() {
            if let Ok(value) = HeaderValue::from_str(resolved_version) {
                response.headers_mut().insert(header.clone(), value);
            }
        }
        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }

        let status = response.status();
        let duration = start.elapsed();
        record_request(endpoint.path(), status.as_u16(), duration);
        tracing::info!(
            request_id = %request_id,
            endpoint = %endpoint,
            requested_version = requested_version.as_deref(),
            resolved_version,
            downgraded,
            http.status_code = status.as_u16(),
            duration_ms = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            "Request completed"
        );

        response
    }

    fn handle_health(&self) -> HttpResponse {
        let status = self.health.status(
            self.router.history().newest().label(),
            self.router.table().len(),
        );
        let body = serde_json::to_vec(&status).unwrap_or_else(|_| br#"{"status":"healthy"}"#.to_vec());

        let mut response = Response::new(Full::new(Bytes::from(body)));
        response
            .headers_mut()
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        response
    }
}

fn metrics_response(registry: &MetricsRegistry) -> HttpResponse {
    let mut response = Response::new(Full::new(Bytes::from(registry.render())));
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; version=0.0.4"),
    );
    response
}

impl<X: VersionExtractor> std::fmt::Debug for Server<X> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("config", &self.config)
            .field("endpoints", &self.router.table().len())
            .field("metrics", &self.metrics.is_some())
            .finish_non_exhaustive()
    }
}
