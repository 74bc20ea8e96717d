//! Per-request context handed to versioned handlers.

use chronos_core::EndpointKey;
use chronos_router::Params;
use http::{HeaderMap, Method};
use uuid::Uuid;

/// Everything a handler knows about the request besides its body.
///
/// # Example
///
/// ```rust
/// use chronos_server::RequestContext;
/// use chronos_core::EndpointKey;
/// use http::Method;
///
/// let ctx = RequestContext::builder(EndpointKey::new(Method::GET, "/users/:id"), "2024-01-01")
///     .param("id", "42")
///     .query("fields=name&verbose")
///     .build();
///
/// assert_eq!(ctx.param("id"), Some("42"));
/// assert_eq!(ctx.query_param("fields"), Some("name"));
/// assert_eq!(ctx.query_param("verbose"), Some(""));
/// assert!(!ctx.is_downgraded());
/// ```
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: Uuid,
    endpoint: EndpointKey,
    resolved_version: String,
    requested_version: Option<String>,
    downgraded: bool,
    params: Params,
    headers: HeaderMap,
    query: Option<String>,
    query_pairs: Vec<(String, String)>,
}

impl RequestContext {
    /// Starts a context for the given endpoint and served version.
    pub fn builder(endpoint: EndpointKey, resolved_version: impl Into<String>) -> RequestContextBuilder {
        RequestContextBuilder {
            ctx: Self {
                request_id: Uuid::now_v7(),
                endpoint,
                resolved_version: resolved_version.into(),
                requested_version: None,
                downgraded: false,
                params: Params::new(),
                headers: HeaderMap::new(),
                query: None,
                query_pairs: Vec::new(),
            },
        }
    }

    /// Time-ordered request ID.
    #[must_use]
    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// The matched endpoint (`GET /users/{id}`).
    #[must_use]
    pub fn endpoint(&self) -> &EndpointKey {
        &self.endpoint
    }

    /// Request method.
    #[must_use]
    pub fn method(&self) -> &Method {
        self.endpoint.method()
    }

    /// Version label of the implementation being invoked.
    #[must_use]
    pub fn resolved_version(&self) -> &str {
        &self.resolved_version
    }

    /// Raw version token sent by the client.
    #[must_use]
    pub fn requested_version(&self) -> Option<&str> {
        self.requested_version.as_deref()
    }

    /// Whether an older implementation than the requested one is serving.
    #[must_use]
    pub fn is_downgraded(&self) -> bool {
        self.downgraded
    }

    /// Path parameters.
    #[must_use]
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// A single path parameter.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// Request headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Raw query string, without the leading `?`.
    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.query.as_deref()
    }

    /// First value of a query parameter, matched and returned percent-decoded.
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_pairs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Builder for [`RequestContext`].
#[derive(Debug)]
pub struct RequestContextBuilder {
    ctx: RequestContext,
}

impl RequestContextBuilder {
    /// Overrides the generated request ID.
    #[must_use]
    pub fn request_id(mut self, id: Uuid) -> Self {
        self.ctx.request_id = id;
        self
    }

    /// Sets the raw token the client sent.
    #[must_use]
    pub fn requested_version(mut self, token: Option<impl Into<String>>) -> Self {
        self.ctx.requested_version = token.map(Into::into);
        self
    }

    /// Marks the resolution as a downgrade.
    #[must_use]
    pub fn downgraded(mut self, downgraded: bool) -> Self {
        self.ctx.downgraded = downgraded;
        self
    }

    /// Replaces all path parameters.
    #[must_use]
    pub fn params(mut self, params: Params) -> Self {
        self.ctx.params = params;
        self
    }

    /// Adds one path parameter.
    #[must_use]
    pub fn param(mut self, name: &str, value: impl Into<String>) -> Self {
        self.ctx.params.push(name, value);
        self
    }

    /// Sets the request headers.
    #[must_use]
    pub fn headers(mut self, headers: HeaderMap) -> Self {
        self.ctx.headers = headers;
        self
    }

    /// Sets the raw query string and decodes its parameters.
    ///
    /// A malformed query string leaves [`RequestContext::query_param`]
    /// empty; the raw string stays available.
    #[must_use]
    pub fn query(mut self, query: impl Into<String>) -> Self {
        let query = query.into();
        self.ctx.query_pairs = serde_urlencoded::from_str(&query).unwrap_or_else(|e| {
            tracing::debug!(error = %e, "Ignoring malformed query string");
            Vec::new()
        });
        self.ctx.query = Some(query);
        self
    }

    /// Finishes the context.
    #[must_use]
    pub fn build(self) -> RequestContext {
        self.ctx
    }
}
