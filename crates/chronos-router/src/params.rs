//! Path parameters captured while matching a request path.

use std::sync::Arc;

use smallvec::SmallVec;

use crate::node::Captures;

/// Parameters stored inline before spilling to the heap.
pub(crate) const INLINE_PARAMS: usize = 4;

/// Path parameters captured from a request path, in pattern order.
///
/// Names come from the pattern of the implementation that was selected, so
/// two versions of an endpoint may name the same position differently.
/// Names are shared with the route table and only values are allocated.
///
/// # Example
///
/// ```rust
/// use chronos_router::Params;
///
/// let mut params = Params::new();
/// params.push("userId", "123");
///
/// assert_eq!(params.get("userId"), Some("123"));
/// assert_eq!(params.get("orgId"), None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Params {
    inner: SmallVec<[(Arc<str>, String); INLINE_PARAMS]>,
}

impl Params {
    /// Creates an empty parameter set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a parameter.
    pub fn push(&mut self, name: impl Into<Arc<str>>, value: impl Into<String>) {
        self.inner.push((name.into(), value.into()));
    }

    /// Returns the value of a parameter by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.inner
            .iter()
            .find(|(n, _)| &**n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Returns true if no parameters were captured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Returns the number of captured parameters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Iterates over `(name, value)` pairs in pattern order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.inner.iter().map(|(n, v)| (&**n, v.as_str()))
    }

    /// Pairs positional values with the names of the selected implementation.
    pub(crate) fn named(names: &[Arc<str>], values: Captures) -> Self {
        Self {
            inner: names.iter().cloned().zip(values).collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Params {
    type Item = (&'a str, &'a str);
    type IntoIter = std::iter::Map<
        std::slice::Iter<'a, (Arc<str>, String)>,
        fn(&'a (Arc<str>, String)) -> (&'a str, &'a str),
    >;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.iter().map(|(n, v)| (&**n, v.as_str()))
    }
}

impl<N: Into<Arc<str>>, V: Into<String>> FromIterator<(N, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        Self {
            inner: iter
                .into_iter()
                .map(|(n, v)| (n.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_push_and_get() {
        let mut params = Params::new();
        params.push("id", "123");
        params.push("name", "alice");

        assert_eq!(params.get("id"), Some("123"));
        assert_eq!(params.get("name"), Some("alice"));
        assert_eq!(params.get("unknown"), None);
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_params_iter_keeps_order() {
        let params: Params = [("b", "2"), ("a", "1")].into_iter().collect();
        let pairs: Vec<_> = params.iter().collect();
        assert_eq!(pairs, vec![("b", "2"), ("a", "1")]);

        let borrowed: Vec<_> = (&params).into_iter().collect();
        assert_eq!(borrowed, pairs);
    }

    #[test]
    fn test_params_named_from_captures() {
        let names: Vec<Arc<str>> = vec![Arc::from("orgId"), Arc::from("userId")];
        let values: Captures = ["acme", "7"].into_iter().map(String::from).collect();
        let params = Params::named(&names, values);

        assert_eq!(params.get("orgId"), Some("acme"));
        assert_eq!(params.get("userId"), Some("7"));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_params_spill_to_heap() {
        let mut params = Params::new();
        for i in 0..10 {
            params.push(format!("key{i}"), format!("value{i}"));
        }

        assert_eq!(params.len(), 10);
        assert_eq!(params.get("key7"), Some("value7"));
    }
}
