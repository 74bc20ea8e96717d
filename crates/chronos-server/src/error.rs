//! Server errors and the JSON error envelope.
//!
//! Every error response has the same shape:
//!
//! ```json
//! {"error": {"code": "NO_QUALIFYING_VERSION", "message": "...", "request_id": "..."}}
//! ```

use bytes::Bytes;
use chronos_core::ResolveError;
use http::header::{HeaderValue, ALLOW, CONTENT_TYPE};
use http::{Response, StatusCode};
use http_body_util::Full;
use serde::Serialize;
use thiserror::Error;

use crate::handler::HandlerError;
use crate::server::HttpResponse;

/// Errors that stop the server itself.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The bind address is invalid or already in use.
    #[error("bind error: {0}")]
    Bind(String),

    /// I/O error in the accept loop.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Serialize)]
struct Envelope<'a> {
    error: ErrorBody<'a>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    code: &'a str,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    request_id: Option<&'a str>,
}

/// Builds a JSON error response.
#[must_use]
pub fn error_response(status: StatusCode, code: &str, message: &str, request_id: Option<&str>) -> HttpResponse {
    let envelope = Envelope {
        error: ErrorBody {
            code,
            message,
            request_id,
        },
    };
    let body = serde_json::to_vec(&envelope).unwrap_or_default();

    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

/// Maps a resolution failure to its response. `405` responses list the
/// allowed methods in an `Allow` header.
#[must_use]
pub fn resolve_error_response(err: &ResolveError) -> HttpResponse {
    let mut response = error_response(err.status_code(), err.code(), &err.to_string(), None);

    if let ResolveError::MethodNotAllowed { allowed, .. } = err {
        let allow = allowed
            .iter()
            .map(http::Method::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        if let Ok(value) = HeaderValue::from_str(&allow) {
            response.headers_mut().insert(ALLOW, value);
        }
    }

    response
}

/// Maps a handler failure to its response.
///
/// Internal errors are logged but their details never reach the client.
#[must_use]
pub fn handler_error_response(err: &HandlerError, request_id: &str) -> HttpResponse {
    let message = match err {
        HandlerError::Internal(_) | HandlerError::Serialization(_) => "internal server error".to_string(),
        other => other.to_string(),
    };
    error_response(err.status_code(), err.code(), &message, Some(request_id))
}
