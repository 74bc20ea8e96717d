//! The frozen, request-time router.

use std::sync::Arc;

use chronos_core::{
    EndpointKey, ResolveError, UnknownVersionPolicy, VersionExtractor, VersionHistory,
};
use http::{Method, Request};

use crate::node::Captures;
use crate::params::Params;
use crate::resolve::{select, ResolvedRoute};
use crate::table::{RouteTable, RouteTableEntry};

/// A version-aware router, frozen after [`build`](crate::VersionedRouterBuilder::build).
///
/// The router is immutable and can be shared behind an [`Arc`] across
/// connection tasks. Resolution takes no locks.
///
/// # Example
///
/// ```rust
/// use chronos_core::{IntegerFormat, TokenExtractor, VersionHistory};
/// use chronos_router::VersionedRouterBuilder;
/// use http::Method;
///
/// let history = VersionHistory::from_format(["1", "2"], &IntegerFormat).unwrap();
/// let mut builder = VersionedRouterBuilder::new(history, TokenExtractor::header_default(IntegerFormat));
/// builder.get("/users/:id").version("1", "get_user_v1").unwrap().version("2", "get_user_v2").unwrap();
/// let router = builder.build();
///
/// let resolved = router.resolve(&Method::GET, "/users/7", Some("1")).unwrap();
/// assert_eq!(*resolved.implementation(), "get_user_v1");
/// assert_eq!(resolved.params().get("id"), Some("7"));
///
/// let latest = router.resolve(&Method::GET, "/users/7", None).unwrap();
/// assert_eq!(latest.resolved_version(), "2");
/// ```
#[derive(Debug)]
pub struct VersionedRouter<X: VersionExtractor, H> {
    extractor: X,
    policy: UnknownVersionPolicy,
    table: RouteTable<X::Version, H>,
}

impl<X: VersionExtractor, H> VersionedRouter<X, H> {
    pub(crate) fn new(
        extractor: X,
        policy: UnknownVersionPolicy,
        table: RouteTable<X::Version, H>,
    ) -> Self {
        Self {
            extractor,
            policy,
            table,
        }
    }

    /// Resolves a method, a concrete request path and an optional raw token.
    ///
    /// The endpoint is matched before the token is parsed, so an unknown
    /// path is reported as such even when the token is malformed.
    pub fn resolve(
        &self,
        method: &Method,
        path: &str,
        raw_token: Option<&str>,
    ) -> Result<ResolvedRoute<'_, H>, ResolveError> {
        let (entry, captures) = self.table.match_request(method, path)?;
        self.resolve_entry(entry, captures, raw_token)
    }

    /// Resolves a request, reading the version token with the extractor.
    ///
    /// A token that is present but unreadable is reported as
    /// [`ResolveError::InvalidVersion`], after the endpoint has matched.
    pub fn resolve_request<B>(&self, request: &Request<B>) -> Result<ResolvedRoute<'_, H>, ResolveError> {
        let (entry, captures) = self
            .table
            .match_request(request.method(), request.uri().path())?;
        let raw_token = self.extractor.extract(request)?;
        self.resolve_entry(entry, captures, raw_token.as_deref())
    }

    /// Resolves an exact endpoint key without matching a concrete path.
    pub fn resolve_key(
        &self,
        key: &EndpointKey,
        raw_token: Option<&str>,
    ) -> Result<ResolvedRoute<'_, H>, ResolveError> {
        let entry = self
            .table
            .lookup(key)
            .ok_or_else(|| ResolveError::UnknownEndpoint {
                method: key.method().clone(),
                path: key.path().to_string(),
            })?;
        self.resolve_entry(entry, Captures::new(), raw_token)
    }

    fn resolve_entry<'a>(
        &'a self,
        entry: &'a RouteTableEntry<H>,
        captures: Captures,
        raw_token: Option<&str>,
    ) -> Result<ResolvedRoute<'a, H>, ResolveError> {
        let history = self.history();
        let requested = raw_token.map(|raw| self.extractor.parse(raw)).transpose()?;

        if let Some(value) = &requested {
            if self.policy == UnknownVersionPolicy::Reject && history.is_beyond_newest(value) {
                return Err(ResolveError::FutureVersion {
                    requested: raw_token.unwrap_or_default().to_string(),
                    newest: history.newest().label().to_string(),
                });
            }
        }

        let Some(route) = select(entry, history, requested.as_ref()) else {
            return Err(ResolveError::NoQualifyingVersion {
                endpoint: entry.key().clone(),
                requested: raw_token.unwrap_or_default().to_string(),
                oldest: entry.versions().next().unwrap_or_default().to_string(),
            });
        };

        let downgraded = match &requested {
            Some(value) => history.value(route.position()) != Some(value),
            None => false,
        };

        tracing::debug!(
            endpoint = %entry.key(),
            requested = raw_token.unwrap_or("-"),
            resolved = route.version(),
            downgraded,
            "resolved versioned route"
        );

        // Captured values are named by the version that serves the request.
        let params = Params::named(route.param_names(), captures);
        Ok(ResolvedRoute::new(
            route,
            raw_token.map(str::to_string),
            downgraded,
            params,
        ))
    }

    /// Returns the entry for an exact endpoint key.
    #[must_use]
    pub fn lookup(&self, key: &EndpointKey) -> Option<&RouteTableEntry<H>> {
        self.table.lookup(key)
    }

    /// Returns the version history.
    #[must_use]
    pub fn history(&self) -> &VersionHistory<X::Version> {
        self.table.history()
    }

    /// Returns a shared handle to the version history.
    #[must_use]
    pub fn shared_history(&self) -> Arc<VersionHistory<X::Version>> {
        Arc::clone(self.table.history())
    }

    /// Returns the version extractor.
    #[must_use]
    pub fn extractor(&self) -> &X {
        &self.extractor
    }

    /// Returns the policy for versions newer than the history.
    #[must_use]
    pub fn policy(&self) -> UnknownVersionPolicy {
        self.policy
    }

    /// Returns the underlying route table.
    #[must_use]
    pub fn table(&self) -> &RouteTable<X::Version, H> {
        &self.table
    }

    /// Iterates over all endpoints in registration order.
    pub fn endpoints(&self) -> impl Iterator<Item = &RouteTableEntry<H>> {
        self.table.entries()
    }
}
