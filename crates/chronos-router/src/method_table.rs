//! Per-pattern map from HTTP method to route table entry.

use http::Method;
use smallvec::SmallVec;

/// Maps HTTP methods to route table entries for one path pattern.
///
/// A pattern rarely serves more than a handful of methods, so the table is a
/// small inline vector scanned linearly. Extension methods are supported.
#[derive(Debug, Clone, Default)]
pub struct MethodTable {
    entries: SmallVec<[(Method, usize); 4]>,
}

impl MethodTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the entry index registered for `method`.
    #[must_use]
    pub fn get(&self, method: &Method) -> Option<usize> {
        self.entries
            .iter()
            .find(|(m, _)| m == method)
            .map(|(_, index)| *index)
    }

    /// Returns the entry index for `method`, inserting `make()` if absent.
    pub fn get_or_insert_with(&mut self, method: &Method, make: impl FnOnce() -> usize) -> usize {
        if let Some(index) = self.get(method) {
            return index;
        }
        let index = make();
        self.entries.push((method.clone(), index));
        index
    }

    /// Returns the methods served by this pattern, in registration order.
    pub fn allowed(&self) -> impl Iterator<Item = &Method> {
        self.entries.iter().map(|(m, _)| m)
    }

    /// Returns the number of methods served.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no method is served.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_or_insert_reuses_index() {
        let mut table = MethodTable::new();
        assert_eq!(table.get_or_insert_with(&Method::GET, || 0), 0);
        assert_eq!(table.get_or_insert_with(&Method::GET, || 99), 0);
        assert_eq!(table.get_or_insert_with(&Method::POST, || 1), 1);

        assert_eq!(table.get(&Method::GET), Some(0));
        assert_eq!(table.get(&Method::POST), Some(1));
        assert_eq!(table.get(&Method::DELETE), None);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_allowed_methods() {
        let mut table = MethodTable::new();
        table.get_or_insert_with(&Method::GET, || 0);
        table.get_or_insert_with(&Method::DELETE, || 1);

        let allowed: Vec<_> = table.allowed().cloned().collect();
        assert_eq!(allowed, vec![Method::GET, Method::DELETE]);
    }

    #[test]
    fn test_extension_method() {
        let purge = Method::from_bytes(b"PURGE").unwrap();
        let mut table = MethodTable::new();
        table.get_or_insert_with(&purge, || 3);
        assert_eq!(table.get(&purge), Some(3));
    }
}
