//! Startup-time registration of versioned routes.
//!
//! Registration is fail-fast: every error is returned as a
//! [`RegistrationError`] so the startup path can propagate it with `?` and
//! refuse to serve a partially registered table.

use std::sync::Arc;

use chronos_core::{
    join_path, EndpointKey, RegistrationError, UnknownVersionPolicy, VersionExtractor,
    VersionHistory,
};
use http::Method;

use crate::router::VersionedRouter;
use crate::table::RouteTable;

/// Builder collecting versioned routes before freezing them into a
/// [`VersionedRouter`].
///
/// # Example
///
/// ```rust
/// use chronos_core::{DateFormat, TokenExtractor, VersionHistory};
/// use chronos_router::VersionedRouterBuilder;
/// use http::Method;
///
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let history = VersionHistory::from_format(["2024-01-01", "2024-02-01"], &DateFormat)?;
/// let mut builder = VersionedRouterBuilder::new(history, TokenExtractor::header_default(DateFormat));
///
/// let mut users = builder.scope("/users");
/// users.get("/:id").version("2024-01-01", "get_user_v1")?;
/// users.get("/:id").version("2024-02-01", "get_user_v2")?;
///
/// let router = builder.build();
/// let resolved = router.resolve(&Method::GET, "/users/42", Some("2024-01-15"))?;
/// assert_eq!(resolved.resolved_version(), "2024-01-01");
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct VersionedRouterBuilder<X: VersionExtractor, H> {
    extractor: X,
    policy: UnknownVersionPolicy,
    table: RouteTable<X::Version, H>,
}

impl<X: VersionExtractor, H> VersionedRouterBuilder<X, H> {
    /// Creates a builder for the given history and extractor.
    #[must_use]
    pub fn new(history: impl Into<Arc<VersionHistory<X::Version>>>, extractor: X) -> Self {
        Self {
            extractor,
            policy: UnknownVersionPolicy::default(),
            table: RouteTable::new(history.into()),
        }
    }

    /// Sets the policy for version tokens newer than the whole history.
    #[must_use]
    pub fn with_policy(mut self, policy: UnknownVersionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Returns the version history.
    #[must_use]
    pub fn history(&self) -> &VersionHistory<X::Version> {
        self.table.history()
    }

    /// Registers one implementation of `method path` at `version`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::UnknownVersion`] when `version` is not in
    /// the history, [`RegistrationError::DuplicateVersion`] when the endpoint
    /// already has an implementation for it, and
    /// [`RegistrationError::InvalidPattern`] for a malformed pattern.
    /// Parameter names may differ between versions and methods of the same
    /// path.
    pub fn register(
        &mut self,
        method: Method,
        path: &str,
        version: &str,
        implementation: H,
    ) -> Result<&mut Self, RegistrationError> {
        let key = EndpointKey::new(method, path);
        tracing::trace!(endpoint = %key, version, "registering versioned route");
        self.table.register(key, version, implementation)?;
        Ok(self)
    }

    /// Starts declaring versions of `method path`.
    pub fn route(&mut self, method: Method, path: &str) -> RouteBuilder<'_, X, H> {
        RouteBuilder {
            builder: self,
            method,
            path: path.to_string(),
        }
    }

    /// Shorthand for `route(Method::GET, path)`.
    pub fn get(&mut self, path: &str) -> RouteBuilder<'_, X, H> {
        self.route(Method::GET, path)
    }

    /// Shorthand for `route(Method::POST, path)`.
    pub fn post(&mut self, path: &str) -> RouteBuilder<'_, X, H> {
        self.route(Method::POST, path)
    }

    /// Shorthand for `route(Method::PUT, path)`.
    pub fn put(&mut self, path: &str) -> RouteBuilder<'_, X, H> {
        self.route(Method::PUT, path)
    }

    /// Shorthand for `route(Method::PATCH, path)`.
    pub fn patch(&mut self, path: &str) -> RouteBuilder<'_, X, H> {
        self.route(Method::PATCH, path)
    }

    /// Shorthand for `route(Method::DELETE, path)`.
    pub fn delete(&mut self, path: &str) -> RouteBuilder<'_, X, H> {
        self.route(Method::DELETE, path)
    }

    /// Opens a scope whose routes are registered under `prefix`.
    pub fn scope(&mut self, prefix: &str) -> Scope<'_, X, H> {
        Scope {
            builder: self,
            prefix: prefix.to_string(),
        }
    }

    /// Freezes the table into an immutable router.
    #[must_use]
    pub fn build(self) -> VersionedRouter<X, H> {
        tracing::info!(
            endpoints = self.table.len(),
            implementations = self.table.implementation_count(),
            versions = self.table.history().len(),
            policy = %self.policy,
            "versioned router built"
        );
        VersionedRouter::new(self.extractor, self.policy, self.table)
    }
}

/// Declares successive versions of one endpoint.
#[derive(Debug)]
pub struct RouteBuilder<'b, X: VersionExtractor, H> {
    builder: &'b mut VersionedRouterBuilder<X, H>,
    method: Method,
    path: String,
}

impl<X: VersionExtractor, H> RouteBuilder<'_, X, H> {
    /// Registers `implementation` at `version` and returns the builder for
    /// further versions.
    ///
    /// # Errors
    ///
    /// Same as [`VersionedRouterBuilder::register`].
    pub fn version(self, version: &str, implementation: H) -> Result<Self, RegistrationError> {
        self.builder
            .register(self.method.clone(), &self.path, version, implementation)?;
        Ok(self)
    }

    /// Returns the normalized endpoint key being declared.
    #[must_use]
    pub fn key(&self) -> EndpointKey {
        EndpointKey::new(self.method.clone(), &self.path)
    }
}

/// Registers routes under a common path prefix.
///
/// Scopes nest: `builder.scope("/api").scope("/users")` registers under
/// `/api/users`.
#[derive(Debug)]
pub struct Scope<'b, X: VersionExtractor, H> {
    builder: &'b mut VersionedRouterBuilder<X, H>,
    prefix: String,
}

impl<X: VersionExtractor, H> Scope<'_, X, H> {
    /// Returns the joined prefix of this scope.
    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Registers one implementation of `method prefix/path` at `version`.
    ///
    /// # Errors
    ///
    /// Same as [`VersionedRouterBuilder::register`].
    pub fn register(
        &mut self,
        method: Method,
        path: &str,
        version: &str,
        implementation: H,
    ) -> Result<&mut Self, RegistrationError> {
        self.builder
            .register(method, &join_path(&self.prefix, path), version, implementation)?;
        Ok(self)
    }

    /// Starts declaring versions of `method prefix/path`.
    pub fn route(&mut self, method: Method, path: &str) -> RouteBuilder<'_, X, H> {
        let joined = join_path(&self.prefix, path);
        self.builder.route(method, &joined)
    }

    /// Shorthand for `route(Method::GET, path)`.
    pub fn get(&mut self, path: &str) -> RouteBuilder<'_, X, H> {
        self.route(Method::GET, path)
    }

    /// Shorthand for `route(Method::POST, path)`.
    pub fn post(&mut self, path: &str) -> RouteBuilder<'_, X, H> {
        self.route(Method::POST, path)
    }

    /// Shorthand for `route(Method::PUT, path)`.
    pub fn put(&mut self, path: &str) -> RouteBuilder<'_, X, H> {
        self.route(Method::PUT, path)
    }

    /// Shorthand for `route(Method::PATCH, path)`.
    pub fn patch(&mut self, path: &str) -> RouteBuilder<'_, X, H> {
        self.route(Method::PATCH, path)
    }

    /// Shorthand for `route(Method::DELETE, path)`.
    pub fn delete(&mut self, path: &str) -> RouteBuilder<'_, X, H> {
        self.route(Method::DELETE, path)
    }

    /// Opens a nested scope.
    pub fn scope(&mut self, prefix: &str) -> Scope<'_, X, H> {
        Scope {
            prefix: join_path(&self.prefix, prefix),
            builder: &mut *self.builder,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronos_core::{IntegerFormat, ResolveError, TokenExtractor};

    type Builder = VersionedRouterBuilder<TokenExtractor<IntegerFormat>, &'static str>;

    fn builder() -> Builder {
        let history = VersionHistory::from_format(["1", "2", "3"], &IntegerFormat).unwrap();
        VersionedRouterBuilder::new(history, TokenExtractor::header_default(IntegerFormat))
    }

    #[test]
    fn test_register_chains() {
        let mut builder = builder();
        builder
            .register(Method::GET, "/users", "1", "list_v1")
            .unwrap()
            .register(Method::GET, "/users", "3", "list_v3")
            .unwrap();
        let router = builder.build();

        let resolved = router.resolve(&Method::GET, "/users", Some("2")).unwrap();
        assert_eq!(*resolved.implementation(), "list_v1");
    }

    #[test]
    fn test_route_builder_versions() {
        let mut builder = builder();
        let route = builder
            .patch("/users/:id")
            .version("1", "patch_v1")
            .unwrap()
            .version("2", "patch_v2")
            .unwrap();
        assert_eq!(route.key().to_string(), "PATCH /users/{id}");

        let router = builder.build();
        let resolved = router.resolve(&Method::PATCH, "/users/5", None).unwrap();
        assert_eq!(resolved.resolved_version(), "2");
    }

    #[test]
    fn test_duplicate_across_independent_calls() {
        let mut builder = builder();
        builder.get("/users").version("1", "a").unwrap();
        let err = builder.get("/users/").version("1", "b").unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicateVersion { .. }));
    }

    #[test]
    fn test_unknown_version() {
        let mut builder = builder();
        let err = builder.put("/users/:id").version("4", "put_v4").unwrap_err();
        assert!(matches!(
            err,
            RegistrationError::UnknownVersion { ref version, .. } if version == "4"
        ));
    }

    #[test]
    fn test_scope_joins_prefix() {
        let mut builder = builder();
        {
            let mut users = builder.scope("/users/");
            assert_eq!(users.prefix(), "/users");
            users.get("/").version("1", "list").unwrap();
            users.delete(":id").version("2", "delete").unwrap();
            users
                .register(Method::POST, "", "1", "create")
                .unwrap();
        }
        let router = builder.build();

        assert_eq!(
            *router.resolve(&Method::GET, "/users", None).unwrap().implementation(),
            "list"
        );
        assert_eq!(
            *router.resolve(&Method::DELETE, "/users/3", None).unwrap().implementation(),
            "delete"
        );
        assert_eq!(
            *router.resolve(&Method::POST, "/users/", None).unwrap().implementation(),
            "create"
        );
    }

    #[test]
    fn test_nested_scopes() {
        let mut builder = builder();
        {
            let mut api = builder.scope("/api");
            let mut orgs = api.scope("/orgs/:orgId");
            assert_eq!(orgs.prefix(), "/api/orgs/{orgId}");
            orgs.get("/members").version("1", "members").unwrap();
        }
        let router = builder.build();
        let resolved = router
            .resolve(&Method::GET, "/api/orgs/acme/members", Some("3"))
            .unwrap();
        assert_eq!(resolved.params().get("orgId"), Some("acme"));
        assert_eq!(resolved.resolved_version(), "1");
    }

    #[test]
    fn test_renamed_param_in_scope() {
        let mut builder = builder();
        {
            let mut users = builder.scope("/users");
            users.get("/:id").version("1", "get").unwrap();
            users.put("/:userId").version("1", "put").unwrap();
        }
        let router = builder.build();

        let get = router.resolve(&Method::GET, "/users/4", None).unwrap();
        assert_eq!(get.params().get("id"), Some("4"));
        let put = router.resolve(&Method::PUT, "/users/4", None).unwrap();
        assert_eq!(put.params().get("userId"), Some("4"));
    }

    #[test]
    fn test_method_not_allowed_after_build() {
        let mut builder = builder();
        builder.get("/users").version("1", "list").unwrap();
        let router = builder.build();

        let err = router.resolve(&Method::DELETE, "/users", None).unwrap_err();
        assert!(matches!(err, ResolveError::MethodNotAllowed { .. }));
    }

    #[test]
    fn test_history_accessor() {
        let builder = builder();
        assert_eq!(builder.history().oldest().label(), "1");
    }
}
