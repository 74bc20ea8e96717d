//! Segment tree used to match request paths against route patterns.
//!
//! Patterns are split on `/`. Each segment is static (`users`), a named
//! parameter (`{id}`) or a trailing catch-all (`*path`). Matching prefers
//! static children, then the parameter child, then the wildcard child, and
//! backtracks when a preferred branch dead-ends.
//!
//! Parameters are keyed by position, not by name: `/users/{id}` and
//! `/users/{userId}` end at the same leaf. The tree captures values only and
//! each route implementation names them.

use std::sync::Arc;

use chronos_core::RegistrationError;
use smallvec::SmallVec;

use crate::method_table::MethodTable;
use crate::params::INLINE_PARAMS;

/// Parameter values captured while matching a path, in pattern order.
pub type Captures = SmallVec<[String; INLINE_PARAMS]>;

/// Type of a pattern segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentKind {
    /// Literal segment (e.g. `users`).
    Static,
    /// Named parameter (e.g. `{id}`).
    Param,
    /// Catch-all tail (e.g. `*path`).
    Wildcard,
}

/// A node of the segment tree.
///
/// Nodes where a pattern ends carry a [`MethodTable`].
#[derive(Debug, Clone)]
pub struct Node {
    segment: String,
    kind: SegmentKind,
    methods: Option<MethodTable>,
    // Sorted by segment for binary search.
    static_children: Vec<Node>,
    param_child: Option<Box<Node>>,
    wildcard_child: Option<Box<Node>>,
}

impl Node {
    fn new(segment: String, kind: SegmentKind) -> Self {
        Self {
            segment,
            kind,
            methods: None,
            static_children: Vec::new(),
            param_child: None,
            wildcard_child: None,
        }
    }

    /// Creates the root node.
    #[must_use]
    pub fn root() -> Self {
        Self::new(String::new(), SegmentKind::Static)
    }

    /// Returns the segment text of the first pattern that created this node.
    #[must_use]
    pub fn segment(&self) -> &str {
        &self.segment
    }

    /// Returns the segment kind.
    #[must_use]
    pub fn kind(&self) -> SegmentKind {
        self.kind
    }

    /// Returns the method table, if a pattern ends at this node.
    #[must_use]
    pub fn methods(&self) -> Option<&MethodTable> {
        self.methods.as_ref()
    }

    /// Inserts a normalized pattern.
    ///
    /// Returns the method table of its leaf together with the pattern's
    /// parameter names in order. Patterns that differ only in parameter names
    /// share a leaf.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::InvalidPattern`] for malformed segments or a
    /// wildcard that is not last. The tree is unchanged on error.
    pub fn insert(&mut self, pattern: &str) -> Result<(&mut MethodTable, Vec<Arc<str>>), RegistrationError> {
        let segments = parse_pattern(pattern)?;
        let names = segments
            .iter()
            .filter_map(|s| s.name)
            .map(Arc::<str>::from)
            .collect();

        let mut node = self;
        for segment in &segments {
            node = node.child_for(segment.text, segment.kind);
        }
        Ok((node.methods.get_or_insert_with(MethodTable::new), names))
    }

    fn child_for(&mut self, segment: &str, kind: SegmentKind) -> &mut Node {
        let slot = match kind {
            SegmentKind::Static => {
                let index = match self
                    .static_children
                    .binary_search_by(|c| c.segment.as_str().cmp(segment))
                {
                    Ok(index) => index,
                    Err(index) => {
                        self.static_children
                            .insert(index, Node::new(segment.to_string(), SegmentKind::Static));
                        index
                    }
                };
                return &mut self.static_children[index];
            }
            SegmentKind::Param => &mut self.param_child,
            SegmentKind::Wildcard => &mut self.wildcard_child,
        };
        slot.get_or_insert_with(|| Box::new(Node::new(segment.to_string(), kind)))
    }

    /// Matches a request path and returns the leaf's method table and the
    /// captured parameter values.
    #[must_use]
    pub fn match_path(&self, path: &str) -> Option<(&MethodTable, Captures)> {
        let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
        let mut captures = Captures::new();
        let methods = self.match_segments(&segments, &mut captures)?;
        Some((methods, captures))
    }

    fn match_segments<'a>(&'a self, segments: &[&str], captures: &mut Captures) -> Option<&'a MethodTable> {
        let Some((&segment, remaining)) = segments.split_first() else {
            return self.methods.as_ref();
        };

        if let Some(child) = self.find_static_child(segment) {
            if let Some(found) = child.match_segments(remaining, captures) {
                return Some(found);
            }
        }

        if let Some(child) = &self.param_child {
            let mark = captures.len();
            captures.push(segment.to_string());
            if let Some(found) = child.match_segments(remaining, captures) {
                return Some(found);
            }
            captures.truncate(mark);
        }

        if let Some(child) = &self.wildcard_child {
            let methods = child.methods.as_ref()?;
            captures.push(segments.join("/"));
            return Some(methods);
        }

        None
    }

    fn find_static_child(&self, segment: &str) -> Option<&Node> {
        self.static_children
            .binary_search_by(|c| c.segment.as_str().cmp(segment))
            .ok()
            .map(|i| &self.static_children[i])
    }
}

/// One parsed pattern segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PatternSegment<'p> {
    text: &'p str,
    kind: SegmentKind,
    name: Option<&'p str>,
}

/// Splits a normalized pattern into typed segments.
fn parse_pattern(pattern: &str) -> Result<Vec<PatternSegment<'_>>, RegistrationError> {
    let raw: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    let last = raw.len().saturating_sub(1);

    raw.iter()
        .enumerate()
        .map(|(i, &text)| {
            if let Some(inner) = text.strip_prefix('{') {
                let name = inner
                    .strip_suffix('}')
                    .filter(|n| !n.is_empty() && !n.contains(['{', '}']))
                    .ok_or_else(|| {
                        RegistrationError::invalid_pattern(
                            pattern,
                            format!("malformed parameter segment '{text}'"),
                        )
                    })?;
                Ok(PatternSegment {
                    text,
                    kind: SegmentKind::Param,
                    name: Some(name),
                })
            } else if let Some(name) = text.strip_prefix('*') {
                if name.is_empty() {
                    return Err(RegistrationError::invalid_pattern(
                        pattern,
                        "wildcard segment needs a name",
                    ));
                }
                if i != last {
                    return Err(RegistrationError::invalid_pattern(
                        pattern,
                        "wildcard must be the last segment",
                    ));
                }
                Ok(PatternSegment {
                    text,
                    kind: SegmentKind::Wildcard,
                    name: Some(name),
                })
            } else if text.contains(['{', '}']) {
                Err(RegistrationError::invalid_pattern(
                    pattern,
                    format!("braces are only allowed around a whole segment, found '{text}'"),
                ))
            } else {
                Ok(PatternSegment {
                    text,
                    kind: SegmentKind::Static,
                    name: None,
                })
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(patterns: &[&str]) -> Node {
        let mut root = Node::root();
        for (i, pattern) in patterns.iter().enumerate() {
            root.insert(pattern)
                .unwrap()
                .0
                .get_or_insert_with(&http::Method::GET, || i);
        }
        root
    }

    fn matched(root: &Node, path: &str) -> Option<(usize, Captures)> {
        let (methods, captures) = root.match_path(path)?;
        Some((methods.get(&http::Method::GET)?, captures))
    }

    #[test]
    fn test_parse_pattern_kinds() {
        let segments = parse_pattern("/files/{id}/*rest").unwrap();
        let kinds: Vec<_> = segments.iter().map(|s| (s.text, s.kind, s.name)).collect();
        assert_eq!(
            kinds,
            vec![
                ("files", SegmentKind::Static, None),
                ("{id}", SegmentKind::Param, Some("id")),
                ("*rest", SegmentKind::Wildcard, Some("rest")),
            ]
        );
    }

    #[test]
    fn test_insert_returns_param_names() {
        let mut root = Node::root();
        let (_, names) = root.insert("/orgs/{orgId}/files/*path").unwrap();
        assert_eq!(names, vec![Arc::<str>::from("orgId"), Arc::from("path")]);
    }

    #[test]
    fn test_match_static_and_param() {
        let root = tree(&["/users", "/users/{id}"]);

        let (index, captures) = matched(&root, "/users").unwrap();
        assert_eq!(index, 0);
        assert!(captures.is_empty());

        let (index, captures) = matched(&root, "/users/42").unwrap();
        assert_eq!(index, 1);
        assert_eq!(captures.as_slice(), ["42"]);
    }

    #[test]
    fn test_root_pattern() {
        let root = tree(&["/"]);
        assert_eq!(matched(&root, "/").map(|(i, _)| i), Some(0));
        assert!(matched(&root, "/x").is_none());
    }

    #[test]
    fn test_static_beats_param() {
        let root = tree(&["/users/{id}", "/users/me"]);
        assert_eq!(matched(&root, "/users/me").map(|(i, _)| i), Some(1));
        assert_eq!(matched(&root, "/users/7").map(|(i, _)| i), Some(0));
    }

    #[test]
    fn test_backtracking_drops_stale_captures() {
        // "/a/{x}/c" is tried first for "/a/b/d" and fails after capturing x.
        let root = tree(&["/a/{x}/c", "/a/*rest"]);
        let (index, captures) = matched(&root, "/a/b/d").unwrap();
        assert_eq!(index, 1);
        assert_eq!(captures.as_slice(), ["b/d"]);
    }

    #[test]
    fn test_backtracking_from_static_to_param() {
        let root = tree(&["/users/me/settings", "/users/{id}/posts"]);
        let (index, captures) = matched(&root, "/users/me/posts").unwrap();
        assert_eq!(index, 1);
        assert_eq!(captures.as_slice(), ["me"]);
    }

    #[test]
    fn test_wildcard_needs_a_segment() {
        let root = tree(&["/files/*path"]);
        assert!(matched(&root, "/files").is_none());
        let (_, captures) = matched(&root, "/files/a/b.png").unwrap();
        assert_eq!(captures.as_slice(), ["a/b.png"]);
    }

    #[test]
    fn test_intermediate_node_without_methods() {
        let root = tree(&["/api/v1/users"]);
        assert!(root.match_path("/api/v1").is_none());
        assert!(root.match_path("/api/v1/users").is_some());
    }

    #[test]
    fn test_same_pattern_returns_same_leaf() {
        let mut root = Node::root();
        root.insert("/users/{id}")
            .unwrap()
            .0
            .get_or_insert_with(&http::Method::GET, || 0);
        let (leaf, _) = root.insert("/users/{id}").unwrap();
        assert_eq!(leaf.get(&http::Method::GET), Some(0));
    }

    #[test]
    fn test_renamed_param_shares_leaf() {
        let mut root = tree(&["/users/{id}"]);
        let (leaf, names) = root.insert("/users/{userId}").unwrap();
        assert_eq!(leaf.get(&http::Method::GET), Some(0));
        assert_eq!(names, vec![Arc::<str>::from("userId")]);

        // The node keeps the text it was created with.
        let param = root.static_children[0].param_child.as_deref().unwrap();
        assert_eq!(param.segment(), "{id}");
        assert_eq!(param.kind(), SegmentKind::Param);
    }

    #[test]
    fn test_renamed_wildcard_shares_leaf() {
        let mut root = tree(&["/files/*path"]);
        let (leaf, _) = root.insert("/files/*rest").unwrap();
        assert_eq!(leaf.get(&http::Method::GET), Some(0));
    }

    #[test]
    fn test_wildcard_must_be_last() {
        let mut root = Node::root();
        let err = root.insert("/files/*path/meta").unwrap_err();
        assert!(matches!(err, RegistrationError::InvalidPattern { .. }));
    }

    #[test]
    fn test_malformed_segments() {
        let mut root = Node::root();
        assert!(root.insert("/users/{}").is_err());
        assert!(root.insert("/users/{id").is_err());
        assert!(root.insert("/users/x{id}").is_err());
        assert!(root.insert("/files/*").is_err());
        assert!(root.static_children.is_empty());
    }
}
