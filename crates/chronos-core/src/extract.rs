//! Version token extraction and parsing.
//!
//! Extraction is split in two steps so the router can find the endpoint
//! before it looks at the version:
//!
//! 1. [`VersionExtractor::extract`] pulls the raw token out of a request.
//!    A missing token is a normal outcome, not an error. A token that is
//!    present but unreadable (a non-UTF-8 header) is a client error.
//! 2. [`VersionExtractor::parse`] turns the raw token into a comparable value.
//!    A token that does not parse is a client error.
//!
//! [`TokenExtractor`] combines a [`VersionSource`] (header or query
//! parameter) with a [`VersionFormat`] and covers the common cases.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate};
use http::header::HeaderName;
use http::Request;
use serde::{Deserialize, Serialize};

use crate::error::VersionParseError;

/// Header read by [`TokenExtractor::header_default`].
pub const DEFAULT_VERSION_HEADER: &str = "x-api-version";

/// Parses raw version tokens into comparable values.
pub trait VersionFormat: Send + Sync + 'static {
    /// The comparable value produced by this format.
    type Version: Ord + Clone + fmt::Debug + Send + Sync + 'static;

    /// Parses a raw, already trimmed token.
    fn parse(&self, raw: &str) -> Result<Self::Version, VersionParseError>;
}

/// Strategy that reads a version token out of a request and parses it.
///
/// # Example
///
/// ```
/// use chronos_core::{IntegerFormat, TokenExtractor, VersionExtractor};
/// use http::Request;
///
/// let extractor = TokenExtractor::header_default(IntegerFormat);
/// let request = Request::builder()
///     .header("x-api-version", "v3")
///     .body(())
///     .unwrap();
///
/// let raw = extractor.extract(&request).unwrap().unwrap();
/// assert_eq!(raw, "v3");
/// assert_eq!(extractor.parse(&raw).unwrap(), 3);
/// ```
pub trait VersionExtractor: Send + Sync + 'static {
    /// The comparable value produced by [`parse`](VersionExtractor::parse).
    type Version: Ord + Clone + fmt::Debug + Send + Sync + 'static;

    /// Returns the raw token, or `None` when the request carries no version.
    ///
    /// Empty and whitespace-only tokens count as absent. Query values are
    /// percent-decoded, so the token may be owned.
    ///
    /// # Errors
    ///
    /// Returns [`VersionParseError`] when a token is present but cannot be
    /// read as text.
    fn extract<'r, B>(&self, request: &'r Request<B>) -> Result<Option<Cow<'r, str>>, VersionParseError>;

    /// Parses a raw token returned by [`extract`](VersionExtractor::extract).
    fn parse(&self, raw: &str) -> Result<Self::Version, VersionParseError>;
}

// ============================================================================
// Sources
// ============================================================================

/// Where in the request the version token lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSource {
    /// A request header.
    Header(HeaderName),
    /// A query string parameter.
    Query(String),
}

impl VersionSource {
    fn read<'r, B>(&self, request: &'r Request<B>) -> Result<Option<Cow<'r, str>>, VersionParseError> {
        let raw = match self {
            Self::Header(name) => {
                let Some(value) = request.headers().get(name) else {
                    return Ok(None);
                };
                let text = std::str::from_utf8(value.as_bytes()).map_err(|_| {
                    VersionParseError::new(
                        String::from_utf8_lossy(value.as_bytes()),
                        format!("header '{name}' is not valid UTF-8"),
                    )
                })?;
                Cow::Borrowed(text.trim())
            }
            Self::Query(param) => {
                let Some(query) = request.uri().query() else {
                    return Ok(None);
                };
                let pairs: Vec<(String, String)> = serde_urlencoded::from_str(query)
                    .map_err(|e| VersionParseError::new(query, format!("malformed query string: {e}")))?;
                let Some((_, value)) = pairs.into_iter().find(|(key, _)| key == param) else {
                    return Ok(None);
                };
                Cow::Owned(value.trim().to_string())
            }
        };
        Ok((!raw.is_empty()).then_some(raw))
    }
}

impl fmt::Display for VersionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Header(name) => write!(f, "header '{name}'"),
            Self::Query(param) => write!(f, "query parameter '{param}'"),
        }
    }
}

/// A [`VersionExtractor`] reading from a [`VersionSource`] and parsing with a [`VersionFormat`].
#[derive(Debug, Clone)]
pub struct TokenExtractor<F> {
    source: VersionSource,
    format: F,
}

impl<F: VersionFormat> TokenExtractor<F> {
    /// Creates an extractor for the given source and format.
    #[must_use]
    pub fn new(source: VersionSource, format: F) -> Self {
        Self { source, format }
    }

    /// Reads the token from the `x-api-version` header.
    #[must_use]
    pub fn header_default(format: F) -> Self {
        Self::header(HeaderName::from_static(DEFAULT_VERSION_HEADER), format)
    }

    /// Reads the token from the given header.
    #[must_use]
    pub fn header(name: HeaderName, format: F) -> Self {
        Self::new(VersionSource::Header(name), format)
    }

    /// Reads the token from the given query parameter.
    #[must_use]
    pub fn query(param: impl Into<String>, format: F) -> Self {
        Self::new(VersionSource::Query(param.into()), format)
    }

    /// Returns the token source.
    #[must_use]
    pub fn source(&self) -> &VersionSource {
        &self.source
    }

    /// Returns the format.
    #[must_use]
    pub fn format(&self) -> &F {
        &self.format
    }
}

impl<F: VersionFormat> VersionExtractor for TokenExtractor<F> {
    type Version = F::Version;

    fn extract<'r, B>(&self, request: &'r Request<B>) -> Result<Option<Cow<'r, str>>, VersionParseError> {
        self.source.read(request)
    }

    fn parse(&self, raw: &str) -> Result<Self::Version, VersionParseError> {
        self.format.parse(raw.trim())
    }
}

// ============================================================================
// Formats
// ============================================================================

/// Calendar-date versions (`2024-01-15`).
///
/// Full RFC 3339 timestamps are accepted as well and truncated to their date.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateFormat;

impl VersionFormat for DateFormat {
    type Version = NaiveDate;

    fn parse(&self, raw: &str) -> Result<NaiveDate, VersionParseError> {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .or_else(|_| DateTime::parse_from_rfc3339(raw).map(|ts| ts.date_naive()))
            .map_err(|_| VersionParseError::new(raw, "expected a YYYY-MM-DD date"))
    }
}

/// Integer versions (`3`, `v3`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntegerFormat;

impl VersionFormat for IntegerFormat {
    type Version = u64;

    fn parse(&self, raw: &str) -> Result<u64, VersionParseError> {
        strip_v(raw)
            .parse()
            .map_err(|_| VersionParseError::new(raw, "expected a non-negative integer"))
    }
}

/// Dotted numeric versions (`1`, `1.2`, `v1.2.3`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DottedFormat;

impl VersionFormat for DottedFormat {
    type Version = DottedVersion;

    fn parse(&self, raw: &str) -> Result<DottedVersion, VersionParseError> {
        raw.parse()
    }
}

fn strip_v(raw: &str) -> &str {
    raw.strip_prefix(['v', 'V']).unwrap_or(raw)
}

/// A dotted numeric version compared component by component.
///
/// Missing components count as zero, so `1.2` and `1.2.0` are equal.
///
/// ```
/// use chronos_core::DottedVersion;
///
/// let a: DottedVersion = "1.2".parse().unwrap();
/// let b: DottedVersion = "v1.2.0".parse().unwrap();
/// let c: DottedVersion = "1.10".parse().unwrap();
///
/// assert_eq!(a, b);
/// assert!(a < c);
/// assert_eq!(c.to_string(), "1.10");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DottedVersion {
    // Trailing zeros trimmed so that derived equality and ordering treat
    // missing components as zero.
    components: Vec<u64>,
}

impl DottedVersion {
    /// Creates a version from its numeric components.
    #[must_use]
    pub fn new(components: impl Into<Vec<u64>>) -> Self {
        let mut components = components.into();
        while components.last() == Some(&0) {
            components.pop();
        }
        Self { components }
    }

    /// Returns the components with trailing zeros removed.
    #[must_use]
    pub fn components(&self) -> &[u64] {
        &self.components
    }
}

impl FromStr for DottedVersion {
    type Err = VersionParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let body = strip_v(raw);
        if body.is_empty() {
            return Err(VersionParseError::new(raw, "expected a dotted version like 1.2.3"));
        }
        body.split('.')
            .map(|part| {
                if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(VersionParseError::new(raw, "expected a dotted version like 1.2.3"));
                }
                part.parse::<u64>()
                    .map_err(|_| VersionParseError::new(raw, "version component is too large"))
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Self::new)
    }
}

impl fmt::Display for DottedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.components.is_empty() {
            return f.write_str("0");
        }
        for (i, c) in self.components.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{c}")?;
        }
        Ok(())
    }
}

// ============================================================================
// Runtime-selected format
// ============================================================================

/// Version format chosen at runtime, typically from configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatKind {
    /// [`DateFormat`].
    #[default]
    Date,
    /// [`IntegerFormat`].
    Integer,
    /// [`DottedFormat`].
    Dotted,
}

impl FormatKind {
    /// Returns the configuration name of the format.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Date => "date",
            Self::Integer => "integer",
            Self::Dotted => "dotted",
        }
    }
}

impl FromStr for FormatKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "date" => Ok(Self::Date),
            "integer" => Ok(Self::Integer),
            "dotted" => Ok(Self::Dotted),
            other => Err(format!("unknown version format '{other}'")),
        }
    }
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A version value produced by [`FormatKind`].
///
/// A single router only ever parses one kind, so comparisons across kinds
/// never happen in practice.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AnyVersion {
    /// A calendar date.
    Date(NaiveDate),
    /// An integer.
    Integer(u64),
    /// A dotted version.
    Dotted(DottedVersion),
}

impl fmt::Display for AnyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Self::Integer(n) => write!(f, "{n}"),
            Self::Dotted(v) => write!(f, "{v}"),
        }
    }
}

impl VersionFormat for FormatKind {
    type Version = AnyVersion;

    fn parse(&self, raw: &str) -> Result<AnyVersion, VersionParseError> {
        match self {
            Self::Date => DateFormat.parse(raw).map(AnyVersion::Date),
            Self::Integer => IntegerFormat.parse(raw).map(AnyVersion::Integer),
            Self::Dotted => DottedFormat.parse(raw).map(AnyVersion::Dotted),
        }
    }
}
