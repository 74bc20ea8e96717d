//! Selection of one implementation for a requested version.

use chronos_core::{EndpointKey, VersionHistory};

use crate::params::Params;
use crate::table::{RouteImplementation, RouteTableEntry};

/// Picks the implementation of `entry` that serves `requested`.
///
/// - With no requested version, the newest registered implementation wins.
/// - Otherwise implementations are scanned from newest to oldest history
///   position and the first whose declared version is not newer than
///   `requested` wins.
///
/// Returns `None` only when `requested` is older than every registered
/// implementation, or when the entry is empty.
#[must_use]
pub fn select<'e, V: Ord, H>(
    entry: &'e RouteTableEntry<H>,
    history: &VersionHistory<V>,
    requested: Option<&V>,
) -> Option<&'e RouteImplementation<H>> {
    let Some(requested) = requested else {
        return entry.newest();
    };
    entry.implementations().rev().find(|candidate| {
        history
            .value(candidate.position())
            .is_some_and(|declared| declared <= requested)
    })
}

/// The outcome of resolving one request.
///
/// Borrows the chosen implementation from the router and is never shared
/// across requests.
#[derive(Debug)]
pub struct ResolvedRoute<'a, H> {
    route: &'a RouteImplementation<H>,
    requested: Option<String>,
    downgraded: bool,
    params: Params,
}

impl<'a, H> ResolvedRoute<'a, H> {
    pub(crate) fn new(
        route: &'a RouteImplementation<H>,
        requested: Option<String>,
        downgraded: bool,
        params: Params,
    ) -> Self {
        Self {
            route,
            requested,
            downgraded,
            params,
        }
    }

    /// Returns the chosen implementation.
    #[must_use]
    pub fn implementation(&self) -> &'a H {
        self.route.implementation()
    }

    /// Returns the chosen route with its metadata.
    #[must_use]
    pub fn route(&self) -> &'a RouteImplementation<H> {
        self.route
    }

    /// Returns the matched endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &'a EndpointKey {
        self.route.endpoint()
    }

    /// Returns the declared label of the version that was selected.
    #[must_use]
    pub fn resolved_version(&self) -> &'a str {
        self.route.version()
    }

    /// Returns the raw version token the client sent, if any.
    #[must_use]
    pub fn requested_version(&self) -> Option<&str> {
        self.requested.as_deref()
    }

    /// Returns true when a version was requested and a different, older
    /// version was selected.
    #[must_use]
    pub fn is_downgraded(&self) -> bool {
        self.downgraded
    }

    /// Returns the path parameters captured from the request path.
    #[must_use]
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Consumes the result and returns the captured parameters.
    #[must_use]
    pub fn into_params(self) -> Params {
        self.params
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::table::RouteTable;
    use chronos_core::IntegerFormat;
    use http::Method;

    fn entry_with(registered: &[&'static str]) -> (RouteTable<u64, &'static str>, EndpointKey) {
        let history = VersionHistory::from_format(["10", "20", "30", "40"], &IntegerFormat).unwrap();
        let mut table = RouteTable::new(Arc::new(history));
        let key = EndpointKey::new(Method::GET, "/things");
        for version in registered {
            table.register(key.clone(), version, *version).unwrap();
        }
        (table, key)
    }

    fn pick(registered: &[&'static str], requested: Option<u64>) -> Option<&'static str> {
        let (table, key) = entry_with(registered);
        let entry = table.lookup(&key).unwrap();
        select(entry, table.history(), requested.as_ref()).map(|r| *r.implementation())
    }

    #[test]
    fn test_no_version_selects_newest() {
        assert_eq!(pick(&["10", "30"], None), Some("30"));
    }

    #[test]
    fn test_exact_version() {
        assert_eq!(pick(&["10", "30"], Some(10)), Some("10"));
        assert_eq!(pick(&["10", "30"], Some(30)), Some("30"));
    }

    #[test]
    fn test_between_versions_selects_earlier() {
        assert_eq!(pick(&["10", "30"], Some(25)), Some("10"));
        assert_eq!(pick(&["10", "30"], Some(20)), Some("10"));
    }

    #[test]
    fn test_future_version_selects_newest() {
        assert_eq!(pick(&["10", "30"], Some(99)), Some("30"));
        assert_eq!(pick(&["10", "30"], Some(40)), Some("30"));
    }

    #[test]
    fn test_too_old_has_no_qualifying_version() {
        assert_eq!(pick(&["20", "30"], Some(15)), None);
        assert_eq!(pick(&["20"], Some(0)), None);
    }

    #[test]
    fn test_resolved_route_accessors() {
        let (table, key) = entry_with(&["10", "30"]);
        let entry = table.lookup(&key).unwrap();
        let route = entry.newest().unwrap();
        let mut params = Params::new();
        params.push("id", "1");

        let resolved = ResolvedRoute::new(route, Some("35".to_string()), true, params);
        assert_eq!(resolved.resolved_version(), "30");
        assert_eq!(resolved.requested_version(), Some("35"));
        assert!(resolved.is_downgraded());
        assert_eq!(resolved.endpoint(), &key);
        assert_eq!(*resolved.implementation(), "30");
        assert_eq!(resolved.route().position(), 2);
        assert_eq!(resolved.into_params().get("id"), Some("1"));
    }
}
