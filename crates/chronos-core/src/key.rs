//! Endpoint identity and path normalization.

use std::fmt;

use http::Method;

/// Identity of a versioned endpoint: an HTTP method plus a normalized path pattern.
///
/// Patterns are normalized on construction so that `/users/`, `//users` and
/// `/users` produce the same key, and Express-style parameters (`:id`) are
/// rewritten to the `{id}` form used by the router.
///
/// # Example
///
/// ```
/// use chronos_core::EndpointKey;
/// use http::Method;
///
/// let a = EndpointKey::new(Method::GET, "/users/:id/");
/// let b = EndpointKey::new(Method::GET, "/users/{id}");
/// assert_eq!(a, b);
/// assert_eq!(a.to_string(), "GET /users/{id}");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointKey {
    method: Method,
    path: String,
}

impl EndpointKey {
    /// Creates a key, normalizing the path pattern.
    #[must_use]
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: normalize_path(path),
        }
    }

    /// Returns the HTTP method.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the normalized path pattern.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl fmt::Display for EndpointKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.path)
    }
}

/// Normalizes a path pattern.
///
/// Empty segments are dropped (which removes trailing and doubled slashes),
/// `:name` segments become `{name}`, and the empty path becomes `/`.
///
/// ```
/// use chronos_core::normalize_path;
///
/// assert_eq!(normalize_path("users/:id/"), "/users/{id}");
/// assert_eq!(normalize_path(""), "/");
/// ```
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let mut normalized = String::with_capacity(path.len() + 1);
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        normalized.push('/');
        match segment.strip_prefix(':') {
            Some(name) if !name.is_empty() => {
                normalized.push('{');
                normalized.push_str(name);
                normalized.push('}');
            }
            _ => normalized.push_str(segment),
        }
    }
    if normalized.is_empty() {
        normalized.push('/');
    }
    normalized
}

/// Joins a scope prefix and a route path, then normalizes the result.
///
/// ```
/// use chronos_core::join_path;
///
/// assert_eq!(join_path("/users", "/:id"), "/users/{id}");
/// assert_eq!(join_path("/", "/"), "/");
/// assert_eq!(join_path("/api/", "health"), "/api/health");
/// ```
#[must_use]
pub fn join_path(prefix: &str, path: &str) -> String {
    normalize_path(&format!("{prefix}/{path}"))
}
