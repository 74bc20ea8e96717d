//! The route table: every endpoint and all of its versioned implementations.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chronos_core::{EndpointKey, RegistrationError, ResolveError, VersionHistory};
use http::Method;

use crate::node::{Captures, Node};

/// One version's implementation of an endpoint.
#[derive(Debug, Clone)]
pub struct RouteImplementation<H> {
    endpoint: EndpointKey,
    param_names: Arc<[Arc<str>]>,
    version: String,
    position: usize,
    implementation: H,
}

impl<H> RouteImplementation<H> {
    /// Returns the endpoint this implementation serves.
    #[must_use]
    pub fn endpoint(&self) -> &EndpointKey {
        &self.endpoint
    }

    /// Returns the parameter names of this implementation's pattern, in
    /// order. Versions of one endpoint may name the same position differently.
    #[must_use]
    pub fn param_names(&self) -> &[Arc<str>] {
        &self.param_names
    }

    /// Returns the declared version label.
    #[must_use]
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Returns the position of the version in the history.
    #[must_use]
    pub fn position(&self) -> usize {
        self.position
    }

    /// Returns the implementation value.
    #[must_use]
    pub fn implementation(&self) -> &H {
        &self.implementation
    }
}

/// All implementations of one endpoint, ordered by history position.
#[derive(Debug, Clone)]
pub struct RouteTableEntry<H> {
    key: EndpointKey,
    implementations: BTreeMap<usize, RouteImplementation<H>>,
}

impl<H> RouteTableEntry<H> {
    fn new(key: EndpointKey) -> Self {
        Self {
            key,
            implementations: BTreeMap::new(),
        }
    }

    /// Returns the endpoint key as first registered.
    #[must_use]
    pub fn key(&self) -> &EndpointKey {
        &self.key
    }

    /// Iterates over implementations from oldest to newest.
    pub fn implementations(&self) -> impl DoubleEndedIterator<Item = &RouteImplementation<H>> {
        self.implementations.values()
    }

    /// Returns the implementation registered at a history position.
    #[must_use]
    pub fn at_position(&self, position: usize) -> Option<&RouteImplementation<H>> {
        self.implementations.get(&position)
    }

    /// Returns the oldest registered implementation.
    #[must_use]
    pub fn oldest(&self) -> Option<&RouteImplementation<H>> {
        self.implementations.values().next()
    }

    /// Returns the newest registered implementation.
    #[must_use]
    pub fn newest(&self) -> Option<&RouteImplementation<H>> {
        self.implementations.values().next_back()
    }

    /// Returns the registered version labels, oldest first.
    pub fn versions(&self) -> impl Iterator<Item = &str> {
        self.implementations.values().map(RouteImplementation::version)
    }

    /// Returns the number of implementations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.implementations.len()
    }

    /// Returns true if the entry has no implementation.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.implementations.is_empty()
    }
}

/// Index of endpoints keyed by method and path pattern.
///
/// Request paths are matched through a segment tree whose leaves map methods
/// to entries. Exact key lookups go through a hash index. Entries are only
/// ever added.
///
/// Patterns that differ only in parameter names are the same endpoint:
/// `GET /users/{id}` at one version and `GET /users/{userId}` at the next
/// share an entry, and each implementation keeps its own names.
#[derive(Debug, Clone)]
pub struct RouteTable<V, H> {
    history: Arc<VersionHistory<V>>,
    root: Node,
    entries: Vec<RouteTableEntry<H>>,
    index: HashMap<(Method, String), usize>,
}

impl<V, H> RouteTable<V, H> {
    /// Creates an empty table validated against `history`.
    #[must_use]
    pub fn new(history: Arc<VersionHistory<V>>) -> Self {
        Self {
            history,
            root: Node::root(),
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Returns the version history.
    #[must_use]
    pub fn history(&self) -> &Arc<VersionHistory<V>> {
        &self.history
    }

    /// Registers `implementation` for `key` at `version`.
    ///
    /// # Errors
    ///
    /// Fails when the version is not declared in the history, when the
    /// endpoint already has an implementation for it, or when the pattern is
    /// invalid. A failed registration leaves no implementation behind.
    pub fn register(
        &mut self,
        key: EndpointKey,
        version: &str,
        implementation: H,
    ) -> Result<(), RegistrationError> {
        let Some(position) = self.history.position(version) else {
            return Err(RegistrationError::UnknownVersion {
                endpoint: key,
                version: version.to_string(),
            });
        };

        let shape = (key.method().clone(), shape(key.path()));
        if let Some(&existing) = self.index.get(&shape) {
            if self.entries[existing].implementations.contains_key(&position) {
                return Err(RegistrationError::DuplicateVersion {
                    endpoint: key,
                    version: version.to_string(),
                });
            }
        }

        let (methods, names) = self.root.insert(key.path())?;
        let next = self.entries.len();
        let slot = methods.get_or_insert_with(key.method(), || next);
        if slot == next {
            self.entries.push(RouteTableEntry::new(key.clone()));
            self.index.insert(shape, slot);
        }

        self.entries[slot].implementations.insert(
            position,
            RouteImplementation {
                endpoint: key,
                param_names: names.into(),
                version: version.to_string(),
                position,
                implementation,
            },
        );
        Ok(())
    }

    /// Returns the entry for an endpoint key, or `None` when the endpoint is
    /// not served. Parameter names in `key` are not significant.
    #[must_use]
    pub fn lookup(&self, key: &EndpointKey) -> Option<&RouteTableEntry<H>> {
        self.index
            .get(&(key.method().clone(), shape(key.path())))
            .map(|&i| &self.entries[i])
    }

    /// Matches a concrete request path and method, returning the entry and
    /// the captured parameter values by position.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::UnknownEndpoint`] when no pattern matches the
    /// path and [`ResolveError::MethodNotAllowed`] when a pattern matches but
    /// does not serve `method`.
    pub fn match_request(
        &self,
        method: &Method,
        path: &str,
    ) -> Result<(&RouteTableEntry<H>, Captures), ResolveError> {
        let Some((methods, captures)) = self.root.match_path(path) else {
            return Err(ResolveError::UnknownEndpoint {
                method: method.clone(),
                path: path.to_string(),
            });
        };

        match methods.get(method) {
            Some(index) => Ok((&self.entries[index], captures)),
            None => Err(ResolveError::MethodNotAllowed {
                method: method.clone(),
                path: path.to_string(),
                allowed: methods.allowed().cloned().collect(),
            }),
        }
    }

    /// Iterates over all entries in registration order.
    pub fn entries(&self) -> impl Iterator<Item = &RouteTableEntry<H>> {
        self.entries.iter()
    }

    /// Returns the number of endpoints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no endpoint is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the total number of implementations across all endpoints.
    #[must_use]
    pub fn implementation_count(&self) -> usize {
        self.entries.iter().map(RouteTableEntry::len).sum()
    }
}

/// Erases parameter and wildcard names from a normalized pattern.
fn shape(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if segment.starts_with('{') {
                "{}"
            } else if segment.starts_with('*') {
                "*"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chronos_core::IntegerFormat;

    fn table() -> RouteTable<u64, &'static str> {
        let history = VersionHistory::from_format(["1", "2", "3"], &IntegerFormat).unwrap();
        RouteTable::new(Arc::new(history))
    }

    #[test]
    fn test_register_and_lookup() {
        let mut table = table();
        let key = EndpointKey::new(Method::GET, "/users/:id");
        table.register(key.clone(), "1", "v1").unwrap();
        table.register(key.clone(), "3", "v3").unwrap();

        let entry = table.lookup(&key).unwrap();
        assert_eq!(entry.len(), 2);
        assert_eq!(entry.versions().collect::<Vec<_>>(), vec!["1", "3"]);
        assert_eq!(entry.oldest().map(RouteImplementation::version), Some("1"));
        assert_eq!(entry.newest().map(|r| *r.implementation()), Some("v3"));
        assert_eq!(entry.at_position(2).map(RouteImplementation::position), Some(2));
        assert_eq!(table.len(), 1);
        assert_eq!(table.implementation_count(), 2);
    }

    #[test]
    fn test_entries_sorted_by_position_regardless_of_order() {
        let mut table = table();
        let key = EndpointKey::new(Method::GET, "/users");
        table.register(key.clone(), "3", "v3").unwrap();
        table.register(key.clone(), "1", "v1").unwrap();
        table.register(key.clone(), "2", "v2").unwrap();

        let versions: Vec<_> = table.lookup(&key).unwrap().versions().collect();
        assert_eq!(versions, vec!["1", "2", "3"]);
    }

    #[test]
    fn test_lookup_normalizes_keys() {
        let mut table = table();
        table
            .register(EndpointKey::new(Method::GET, "/users/"), "1", "list")
            .unwrap();
        assert!(table.lookup(&EndpointKey::new(Method::GET, "/users")).is_some());
        assert!(table.lookup(&EndpointKey::new(Method::POST, "/users")).is_none());
    }

    #[test]
    fn test_unknown_version_rejected() {
        let mut table = table();
        let key = EndpointKey::new(Method::GET, "/users");
        let err = table.register(key.clone(), "9", "v9").unwrap_err();
        assert_eq!(
            err,
            RegistrationError::UnknownVersion {
                endpoint: key.clone(),
                version: "9".to_string(),
            }
        );
        assert!(table.lookup(&key).is_none());
    }

    #[test]
    fn test_duplicate_version_rejected() {
        let mut table = table();
        let key = EndpointKey::new(Method::GET, "/users");
        table.register(key.clone(), "2", "first").unwrap();
        let err = table.register(key.clone(), "2", "second").unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicateVersion { .. }));

        let entry = table.lookup(&key).unwrap();
        assert_eq!(entry.newest().map(|r| *r.implementation()), Some("first"));
    }

    #[test]
    fn test_same_version_different_methods() {
        let mut table = table();
        table
            .register(EndpointKey::new(Method::GET, "/users"), "1", "list")
            .unwrap();
        table
            .register(EndpointKey::new(Method::POST, "/users"), "1", "create")
            .unwrap();
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_match_request() {
        let mut table = table();
        table
            .register(EndpointKey::new(Method::GET, "/users/:id"), "1", "get")
            .unwrap();

        let (entry, captures) = table.match_request(&Method::GET, "/users/7").unwrap();
        assert_eq!(entry.key().path(), "/users/{id}");
        assert_eq!(captures.as_slice(), ["7"]);
    }

    #[test]
    fn test_match_request_unknown_and_not_allowed() {
        let mut table = table();
        table
            .register(EndpointKey::new(Method::GET, "/users/:id"), "1", "get")
            .unwrap();
        table
            .register(EndpointKey::new(Method::DELETE, "/users/:id"), "2", "delete")
            .unwrap();

        let err = table.match_request(&Method::GET, "/posts/7").unwrap_err();
        assert!(matches!(err, ResolveError::UnknownEndpoint { .. }));

        let err = table.match_request(&Method::PUT, "/users/7").unwrap_err();
        match err {
            ResolveError::MethodNotAllowed { allowed, .. } => {
                assert_eq!(allowed, vec![Method::GET, Method::DELETE]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_renamed_param_is_same_endpoint() {
        let mut table = table();
        table
            .register(EndpointKey::new(Method::GET, "/users/:id"), "1", "get")
            .unwrap();
        table
            .register(EndpointKey::new(Method::GET, "/users/:userId"), "2", "get2")
            .unwrap();
        table
            .register(EndpointKey::new(Method::DELETE, "/users/:userId"), "1", "delete")
            .unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.implementation_count(), 3);

        let entry = table
            .lookup(&EndpointKey::new(Method::GET, "/users/{userId}"))
            .unwrap();
        assert_eq!(entry.key().path(), "/users/{id}");
        let names: Vec<_> = entry
            .implementations()
            .map(|r| r.param_names()[0].to_string())
            .collect();
        assert_eq!(names, vec!["id", "userId"]);
        assert_eq!(
            entry.at_position(1).map(|r| r.endpoint().path()),
            Some("/users/{userId}")
        );
    }

    #[test]
    fn test_renamed_param_duplicate_version_rejected() {
        let mut table = table();
        table
            .register(EndpointKey::new(Method::GET, "/users/:id"), "1", "get")
            .unwrap();
        let err = table
            .register(EndpointKey::new(Method::GET, "/users/:userId"), "1", "get2")
            .unwrap_err();
        assert!(matches!(err, RegistrationError::DuplicateVersion { .. }));
        assert_eq!(table.implementation_count(), 1);
    }

    #[test]
    fn test_invalid_pattern_leaves_table_untouched() {
        let mut table = table();
        let err = table
            .register(EndpointKey::new(Method::GET, "/files/*path/meta"), "1", "get")
            .unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidPattern { .. }));
        assert!(table.is_empty());
        assert!(table.match_request(&Method::GET, "/files/a/meta").is_err());
    }

    #[test]
    fn test_shape_erases_names() {
        assert_eq!(shape("/users/{id}"), shape("/users/{userId}"));
        assert_eq!(shape("/files/*path"), "/files/*");
        assert_ne!(shape("/users/{id}"), shape("/users/*id"));
        assert_eq!(shape("/"), "/");
    }
}
