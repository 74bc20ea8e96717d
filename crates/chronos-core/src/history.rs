//! The ordered list of released contract versions.

use std::cmp::Ordering;
use std::collections::HashSet;

use crate::error::HistoryError;
use crate::extract::VersionFormat;

/// One declared version: the label as written plus its parsed value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry<V> {
    label: String,
    value: V,
}

impl<V> HistoryEntry<V> {
    /// Returns the label as declared, e.g. `"2024-01-01"`.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the parsed comparable value.
    #[must_use]
    pub fn value(&self) -> &V {
        &self.value
    }
}

/// Ordered sequence of distinct version identifiers, oldest first.
///
/// The history is supplied once per service and never changes afterwards.
/// A version's rank is its position in the sequence; resolution walks
/// positions, never the parsed values directly.
///
/// # Example
///
/// ```
/// use chronos_core::{IntegerFormat, VersionHistory};
///
/// let history = VersionHistory::from_format(["1", "2", "5"], &IntegerFormat).unwrap();
///
/// assert_eq!(history.len(), 3);
/// assert_eq!(history.position("5"), Some(2));
/// assert_eq!(history.newest().label(), "5");
/// assert_eq!(history.oldest().label(), "1");
/// ```
#[derive(Debug, Clone)]
pub struct VersionHistory<V> {
    entries: Vec<HistoryEntry<V>>,
}

impl<V> VersionHistory<V>
where
    V: Ord + Clone + std::fmt::Debug,
{
    /// Builds a history from `(label, value)` pairs, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::Empty`] for an empty list,
    /// [`HistoryError::DuplicateLabel`] when a label repeats, and
    /// [`HistoryError::DuplicateValue`] when two labels share a value.
    pub fn new<L, I>(entries: I) -> Result<Self, HistoryError>
    where
        L: Into<String>,
        I: IntoIterator<Item = (L, V)>,
    {
        let entries: Vec<HistoryEntry<V>> = entries
            .into_iter()
            .map(|(label, value)| HistoryEntry {
                label: label.into(),
                value,
            })
            .collect();

        if entries.is_empty() {
            return Err(HistoryError::Empty);
        }

        let mut labels = HashSet::with_capacity(entries.len());
        for entry in &entries {
            if !labels.insert(entry.label.as_str()) {
                return Err(HistoryError::DuplicateLabel {
                    label: entry.label.clone(),
                });
            }
        }

        for (i, later) in entries.iter().enumerate() {
            if let Some(earlier) = entries[..i].iter().find(|e| e.value == later.value) {
                return Err(HistoryError::DuplicateValue {
                    first: earlier.label.clone(),
                    second: later.label.clone(),
                });
            }
        }

        if let Some(pair) = entries.windows(2).find(|w| w[0].value >= w[1].value) {
            tracing::warn!(
                earlier = %pair[0].label,
                later = %pair[1].label,
                "version history is not in ascending order; positions are used as declared"
            );
        }

        Ok(Self { entries })
    }

    /// Builds a history by parsing each label with `format`.
    ///
    /// # Errors
    ///
    /// Returns [`HistoryError::Unparseable`] when a label is not a valid token,
    /// plus every error [`VersionHistory::new`] can return.
    pub fn from_format<F, L, I>(labels: I, format: &F) -> Result<Self, HistoryError>
    where
        F: VersionFormat<Version = V>,
        L: AsRef<str>,
        I: IntoIterator<Item = L>,
    {
        let parsed = labels
            .into_iter()
            .map(|label| {
                let label = label.as_ref();
                format
                    .parse(label)
                    .map(|value| (label.to_string(), value))
                    .map_err(|source| HistoryError::Unparseable {
                        label: label.to_string(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(parsed)
    }
}

impl<V> VersionHistory<V> {
    /// Returns the position of a declared label, or `None` if it is unknown.
    #[must_use]
    pub fn position(&self, label: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.label == label)
    }

    /// Returns `true` if the label is declared.
    #[must_use]
    pub fn contains(&self, label: &str) -> bool {
        self.position(label).is_some()
    }

    /// Returns the number of declared versions. Never zero.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always `false`; an empty history cannot be constructed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the entry at `position`.
    #[must_use]
    pub fn get(&self, position: usize) -> Option<&HistoryEntry<V>> {
        self.entries.get(position)
    }

    /// Returns the label at `position`.
    #[must_use]
    pub fn label(&self, position: usize) -> Option<&str> {
        self.get(position).map(HistoryEntry::label)
    }

    /// Returns the parsed value at `position`.
    #[must_use]
    pub fn value(&self, position: usize) -> Option<&V> {
        self.get(position).map(HistoryEntry::value)
    }

    /// Returns the oldest declared version.
    #[must_use]
    pub fn oldest(&self) -> &HistoryEntry<V> {
        &self.entries[0]
    }

    /// Returns the newest declared version.
    #[must_use]
    pub fn newest(&self) -> &HistoryEntry<V> {
        &self.entries[self.entries.len() - 1]
    }

    /// Iterates over the entries, oldest first.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &HistoryEntry<V>> + ExactSizeIterator {
        self.entries.iter()
    }

    /// Iterates over the labels, oldest first.
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(HistoryEntry::label)
    }
}

impl<V: Ord> VersionHistory<V> {
    /// Compares two comparable values, which need not be declared.
    #[must_use]
    pub fn compare(&self, a: &V, b: &V) -> Ordering {
        a.cmp(b)
    }

    /// Returns `true` if `value` is strictly newer than every declared version.
    ///
    /// In a non-monotonic history this compares against the greatest value,
    /// not against [`newest`](Self::newest), which is the last declared.
    #[must_use]
    pub fn is_beyond_newest(&self, value: &V) -> bool {
        self.entries.iter().all(|e| value > &e.value)
    }
}
