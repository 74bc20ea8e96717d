//! Versioned handlers.
//!
//! Every implementation registered with the router is a [`VersionedHandler`]:
//! a type-erased async function from a [`RequestContext`] and the raw body to
//! a [`HandlerOutcome`].
//!
//! ```rust,ignore
//! use chronos_server::{HandlerError, RequestContext, VersionedHandler};
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct UserV1 { id: String }
//!
//! async fn get_user_v1(ctx: RequestContext) -> Result<UserV1, HandlerError> {
//!     let id = ctx.param("id").unwrap_or_default().to_string();
//!     Ok(UserV1 { id })
//! }
//!
//! let handler = VersionedHandler::no_body(get_user_v1);
//! ```

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::StatusCode;
use serde::{de::DeserializeOwned, Serialize};
use thiserror::Error;

use crate::context::RequestContext;
use crate::server::HttpResponse;

/// Boxed future returned by an erased handler.
pub type BoxedHandlerFuture = Pin<Box<dyn Future<Output = Result<HandlerOutcome, HandlerError>> + Send>>;

type ErasedHandler = Arc<dyn Fn(RequestContext, Bytes) -> BoxedHandlerFuture + Send + Sync>;

/// A response customizer run after the server has built the base response.
pub type ResponseCustomizer = Box<dyn FnOnce(&mut HttpResponse) + Send>;

/// What a handler wants sent back.
pub enum HandlerOutcome {
    /// Send `body` with `status` as JSON.
    Send {
        /// Response status.
        status: StatusCode,
        /// JSON body.
        body: Bytes,
    },
    /// Start from an empty `200` response and let the closure shape it.
    Custom(ResponseCustomizer),
}

impl HandlerOutcome {
    /// `200 OK` with a pre-serialized JSON body.
    #[must_use]
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::Send {
            status: StatusCode::OK,
            body: body.into(),
        }
    }

    /// Serializes `value` as the JSON body.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError::Serialization`] if `value` cannot be serialized.
    pub fn json<T: Serialize>(status: StatusCode, value: &T) -> Result<Self, HandlerError> {
        let body = serde_json::to_vec(value).map_err(|e| HandlerError::Serialization(e.to_string()))?;
        Ok(Self::Send {
            status,
            body: Bytes::from(body),
        })
    }

    /// `204 No Content`.
    #[must_use]
    pub fn no_content() -> Self {
        Self::Send {
            status: StatusCode::NO_CONTENT,
            body: Bytes::new(),
        }
    }

    /// Hands the response to `f` for full control.
    pub fn custom<F>(f: F) -> Self
    where
        F: FnOnce(&mut HttpResponse) + Send + 'static,
    {
        Self::Custom(Box::new(f))
    }

    pub(crate) fn apply(self, response: &mut HttpResponse) {
        match self {
            Self::Send { status, body } => {
                *response.status_mut() = status;
                if !body.is_empty() {
                    response
                        .headers_mut()
                        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                }
                *response.body_mut() = http_body_util::Full::new(body);
            }
            Self::Custom(customize) => customize(response),
        }
    }
}

impl fmt::Debug for HandlerOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Send { status, body } => f
                .debug_struct("Send")
                .field("status", status)
                .field("body_len", &body.len())
                .finish(),
            Self::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Errors a handler can return. Each maps to a status and a stable code.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The request body does not deserialize into the handler's input type.
    #[error("invalid request body: {0}")]
    Deserialization(String),

    /// The handler's output could not be serialized.
    #[error("failed to serialize response: {0}")]
    Serialization(String),

    /// The client sent something the handler rejects.
    #[error("{0}")]
    BadRequest(String),

    /// The addressed resource does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Any other failure.
    #[error("internal error: {0}")]
    Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl HandlerError {
    /// Wraps an arbitrary error as [`HandlerError::Internal`].
    pub fn internal(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Internal(err.into())
    }

    /// HTTP status for this error.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Deserialization(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Serialization(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Deserialization(_) => "VALIDATION_ERROR",
            Self::Serialization(_) => "SERIALIZATION_ERROR",
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Deserialization(err.to_string())
    }
}

/// A type-erased, cloneable async handler for one version of one endpoint.
#[derive(Clone)]
pub struct VersionedHandler {
    inner: ErasedHandler,
}

impl VersionedHandler {
    /// Wraps a raw handler that sees the body bytes and returns an outcome.
    pub fn new<F, Fut>(handler: F) -> Self
    where
        F: Fn(RequestContext, Bytes) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HandlerOutcome, HandlerError>> + Send + 'static,
    {
        Self {
            inner: Arc::new(move |ctx: RequestContext, body: Bytes| -> BoxedHandlerFuture {
                Box::pin(handler(ctx, body))
            }),
        }
    }

    /// Wraps a typed handler: the body is decoded from JSON and the result
    /// is encoded as a `200 OK` JSON body.
    pub fn json<Req, Res, F, Fut>(handler: F) -> Self
    where
        Req: DeserializeOwned + Send + 'static,
        Res: Serialize + Send + 'static,
        F: Fn(RequestContext, Req) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Res, HandlerError>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        Self::new(move |ctx, body: Bytes| {
            let handler = Arc::clone(&handler);
            async move {
                let request: Req = serde_json::from_slice(&body)?;
                let response = handler(ctx, request).await?;
                HandlerOutcome::json(StatusCode::OK, &response)
            }
        })
    }

    /// Wraps a typed handler that ignores the request body.
    pub fn no_body<Res, F, Fut>(handler: F) -> Self
    where
        Res: Serialize + Send + 'static,
        F: Fn(RequestContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Res, HandlerError>> + Send + 'static,
    {
        let handler = Arc::new(handler);
        Self::new(move |ctx, _body: Bytes| {
            let handler = Arc::clone(&handler);
            async move {
                let response = handler(ctx).await?;
                HandlerOutcome::json(StatusCode::OK, &response)
            }
        })
    }

    /// Invokes the handler.
    pub fn call(&self, ctx: RequestContext, body: Bytes) -> BoxedHandlerFuture {
        (self.inner)(ctx, body)
    }
}

impl fmt::Debug for VersionedHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VersionedHandler").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronos_core::EndpointKey;
    use http::{Method, Response};
    use http_body_util::{BodyExt, Full};
    use serde::Deserialize;

    fn ctx() -> RequestContext {
        RequestContext::builder(EndpointKey::new(Method::POST, "/echo"), "1").build()
    }

    async fn body_of(outcome: HandlerOutcome) -> (StatusCode, Bytes) {
        let mut response = Response::new(Full::new(Bytes::new()));
        outcome.apply(&mut response);
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, bytes)
    }

    #[derive(Deserialize)]
    struct Echo {
        message: String,
    }

    #[derive(Serialize, Deserialize, Debug, PartialEq)]
    struct Echoed {
        echo: String,
        version: String,
    }

    #[tokio::test]
    async fn test_json_handler_round_trip() {
        let handler = VersionedHandler::json(|ctx: RequestContext, req: Echo| async move {
            Ok(Echoed {
                echo: req.message,
                version: ctx.resolved_version().to_string(),
            })
        });

        let outcome = handler
            .call(ctx(), Bytes::from(r#"{"message":"hi"}"#))
            .await
            .unwrap();
        let (status, body) = body_of(outcome).await;

        assert_eq!(status, StatusCode::OK);
        let echoed: Echoed = serde_json::from_slice(&body).unwrap();
        assert_eq!(echoed.echo, "hi");
        assert_eq!(echoed.version, "1");
    }

    #[tokio::test]
    async fn test_json_handler_rejects_bad_body() {
        let handler = VersionedHandler::json(|_ctx: RequestContext, req: Echo| async move {
            Ok(req.message)
        });

        let err = handler.call(ctx(), Bytes::from("nope")).await.unwrap_err();
        assert!(matches!(err, HandlerError::Deserialization(_)));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_no_body_handler() {
        let handler = VersionedHandler::no_body(|ctx: RequestContext| async move {
            Ok(serde_json::json!({ "endpoint": ctx.endpoint().to_string() }))
        });

        let outcome = handler.call(ctx(), Bytes::from("ignored")).await.unwrap();
        let (_, body) = body_of(outcome).await;
        assert_eq!(body, Bytes::from(r#"{"endpoint":"POST /echo"}"#));
    }

    #[tokio::test]
    async fn test_custom_outcome() {
        let outcome = HandlerOutcome::custom(|response| {
            *response.status_mut() = StatusCode::ACCEPTED;
            response
                .headers_mut()
                .insert("location", HeaderValue::from_static("/jobs/1"));
        });
        let mut response = Response::new(Full::new(Bytes::new()));
        outcome.apply(&mut response);
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(response.headers()["location"], "/jobs/1");
    }

    #[tokio::test]
    async fn test_no_content_has_no_content_type() {
        let mut response = Response::new(Full::new(Bytes::new()));
        HandlerOutcome::no_content().apply(&mut response);
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!(response.headers().get(CONTENT_TYPE).is_none());
    }

    #[test]
    fn test_error_mapping() {
        assert_eq!(HandlerError::NotFound("user 9".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(HandlerError::BadRequest("x".into()).code(), "BAD_REQUEST");

        let err = HandlerError::internal("database unavailable");
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.to_string().contains("database unavailable"));
    }

    #[test]
    fn test_handler_is_send_sync_clone() {
        fn assert_traits<T: Send + Sync + Clone>() {}
        assert_traits::<VersionedHandler>();
    }
}
