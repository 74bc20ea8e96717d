//! Error types for Chronos.
//!
//! Errors fall into two groups:
//!
//! | Error | When | Handling |
//! |-------|------|----------|
//! | [`HistoryError`] | history construction | startup-fatal |
//! | [`RegistrationError`] | route registration | startup-fatal |
//! | [`VersionParseError`] | token parsing | per request, `400` |
//! | [`ResolveError`] | request resolution | per request, mapped to a status code |
//!
//! Startup errors must stop the service before it accepts traffic. Request
//! errors are plain values returned to the transport layer.

use http::{Method, StatusCode};
use thiserror::Error;

use crate::key::EndpointKey;

/// A version token that could not be parsed into a comparable value.
///
/// # Example
///
/// ```
/// use chronos_core::VersionParseError;
///
/// let err = VersionParseError::new("tomorrow", "expected a YYYY-MM-DD date");
/// assert_eq!(err.token(), "tomorrow");
/// assert!(err.to_string().contains("YYYY-MM-DD"));
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid version token '{token}': {reason}")]
pub struct VersionParseError {
    token: String,
    reason: String,
}

impl VersionParseError {
    /// Creates a new parse error for the given raw token.
    #[must_use]
    pub fn new(token: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            reason: reason.into(),
        }
    }

    /// Returns the raw token that failed to parse.
    #[must_use]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Returns a human-readable explanation.
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

/// Errors raised while building a [`VersionHistory`](crate::VersionHistory).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HistoryError {
    /// The history declares no versions.
    #[error("version history must declare at least one version")]
    Empty,

    /// The same label appears twice.
    #[error("version '{label}' is declared more than once in the history")]
    DuplicateLabel {
        /// The repeated label.
        label: String,
    },

    /// Two different labels parse to the same comparable value.
    #[error("versions '{first}' and '{second}' parse to the same value")]
    DuplicateValue {
        /// The label declared first.
        first: String,
        /// The later label with the same value.
        second: String,
    },

    /// A declared label is not a valid token for the version format.
    #[error("version '{label}' in the history cannot be parsed")]
    Unparseable {
        /// The label that failed to parse.
        label: String,
        /// The underlying parse failure.
        #[source]
        source: VersionParseError,
    },
}

/// Errors raised while registering routes.
///
/// Every variant is fatal at startup: a service with a partially registered
/// route table must not serve traffic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    /// The version is not part of the version history.
    #[error("cannot register {endpoint} at version '{version}': version is not declared in the history")]
    UnknownVersion {
        /// The endpoint being registered.
        endpoint: EndpointKey,
        /// The undeclared version label.
        version: String,
    },

    /// The endpoint already has an implementation for this version.
    #[error("{endpoint} already has an implementation for version '{version}'")]
    DuplicateVersion {
        /// The endpoint being registered.
        endpoint: EndpointKey,
        /// The repeated version label.
        version: String,
    },

    /// The path pattern is malformed.
    #[error("invalid route pattern '{pattern}': {reason}")]
    InvalidPattern {
        /// The offending pattern.
        pattern: String,
        /// Why it was rejected.
        reason: String,
    },
}

impl RegistrationError {
    /// Creates an invalid pattern error.
    pub fn invalid_pattern(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPattern {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }
}

/// Errors returned when a request cannot be resolved to an implementation.
///
/// # Example
///
/// ```
/// use chronos_core::{ResolveError, VersionParseError};
/// use http::StatusCode;
///
/// let err = ResolveError::from(VersionParseError::new("abc", "expected an integer"));
/// assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
/// assert_eq!(err.code(), "INVALID_VERSION");
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    /// No route pattern matches the path.
    #[error("no route matches {method} {path}")]
    UnknownEndpoint {
        /// Request method.
        method: Method,
        /// Request path.
        path: String,
    },

    /// A route pattern matches the path, but not for this method.
    #[error("method {method} is not allowed for {path}")]
    MethodNotAllowed {
        /// Request method.
        method: Method,
        /// Request path.
        path: String,
        /// Methods registered for the matching pattern.
        allowed: Vec<Method>,
    },

    /// The client sent a version token that does not parse.
    #[error(transparent)]
    InvalidVersion(#[from] VersionParseError),

    /// The client version is older than every implementation of the endpoint.
    #[error("{endpoint} has no implementation at or before version '{requested}' (oldest is '{oldest}')")]
    NoQualifyingVersion {
        /// The matched endpoint.
        endpoint: EndpointKey,
        /// The raw token the client sent.
        requested: String,
        /// The oldest version registered for the endpoint.
        oldest: String,
    },

    /// The client version is newer than every released version and the
    /// router is configured to reject such versions.
    #[error("version '{requested}' is newer than the newest released version '{newest}'")]
    FutureVersion {
        /// The raw token the client sent.
        requested: String,
        /// The newest version in the history.
        newest: String,
    },
}

impl ResolveError {
    /// Returns the HTTP status code the transport layer should respond with.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::UnknownEndpoint { .. } => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            Self::InvalidVersion(_) | Self::NoQualifyingVersion { .. } | Self::FutureVersion { .. } => {
                StatusCode::BAD_REQUEST
            }
        }
    }

    /// Returns a stable machine-readable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::UnknownEndpoint { .. } => "NOT_FOUND",
            Self::MethodNotAllowed { .. } => "METHOD_NOT_ALLOWED",
            Self::InvalidVersion(_) => "INVALID_VERSION",
            Self::NoQualifyingVersion { .. } => "NO_QUALIFYING_VERSION",
            Self::FutureVersion { .. } => "FUTURE_VERSION",
        }
    }

    /// Returns `true` when the failure is caused by the version token rather
    /// than by the method or path.
    #[must_use]
    pub const fn is_version_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidVersion(_) | Self::NoQualifyingVersion { .. } | Self::FutureVersion { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = VersionParseError::new("v-one", "expected an integer");
        assert_eq!(err.to_string(), "invalid version token 'v-one': expected an integer");
        assert_eq!(err.reason(), "expected an integer");
    }

    #[test]
    fn test_history_error_source() {
        let err = HistoryError::Unparseable {
            label: "nope".to_string(),
            source: VersionParseError::new("nope", "bad"),
        };
        let source = std::error::Error::source(&err).map(ToString::to_string);
        assert_eq!(source.as_deref(), Some("invalid version token 'nope': bad"));
    }

    #[test]
    fn test_registration_error_display() {
        let err = RegistrationError::UnknownVersion {
            endpoint: EndpointKey::new(Method::GET, "/users/:id"),
            version: "2099-01-01".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("GET /users/{id}"));
        assert!(message.contains("2099-01-01"));
    }

    #[test]
    fn test_resolve_error_status_codes() {
        let not_found = ResolveError::UnknownEndpoint {
            method: Method::GET,
            path: "/nope".to_string(),
        };
        assert_eq!(not_found.status_code(), StatusCode::NOT_FOUND);
        assert!(!not_found.is_version_error());

        let not_allowed = ResolveError::MethodNotAllowed {
            method: Method::PUT,
            path: "/users".to_string(),
            allowed: vec![Method::GET],
        };
        assert_eq!(not_allowed.status_code(), StatusCode::METHOD_NOT_ALLOWED);

        let too_old = ResolveError::NoQualifyingVersion {
            endpoint: EndpointKey::new(Method::GET, "/users"),
            requested: "2023-12-01".to_string(),
            oldest: "2024-01-01".to_string(),
        };
        assert_eq!(too_old.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(too_old.code(), "NO_QUALIFYING_VERSION");
        assert!(too_old.is_version_error());
    }

    #[test]
    fn test_invalid_version_is_transparent() {
        let err = ResolveError::from(VersionParseError::new("x", "bad"));
        assert_eq!(err.to_string(), "invalid version token 'x': bad");
    }
}
