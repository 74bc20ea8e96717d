//! # Chronos Core
//!
//! Core types for the Chronos version-aware router.
//!
//! This crate provides the building blocks that every other Chronos crate
//! depends on:
//!
//! - [`VersionHistory`] - The ordered list of released contract versions
//! - [`VersionExtractor`] - Strategy that pulls a version token out of a request
//! - [`VersionFormat`] - Parser turning raw tokens into comparable values
//! - [`EndpointKey`] - Normalized `(method, path pattern)` identity of an endpoint
//! - [`ResolveError`] / [`RegistrationError`] - The error taxonomy
//!
//! # Example
//!
//! ```
//! use chronos_core::{DateFormat, TokenExtractor, VersionHistory};
//!
//! let extractor = TokenExtractor::header_default(DateFormat);
//! let history = VersionHistory::from_format(["2024-01-01", "2024-02-01"], &DateFormat).unwrap();
//!
//! assert_eq!(history.position("2024-02-01"), Some(1));
//! assert_eq!(history.position("2099-01-01"), None);
//! # let _ = extractor;
//! ```

#![doc(html_root_url = "https://docs.rs/chronos-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
pub mod extract;
mod history;
mod key;
mod policy;

pub use error::{HistoryError, RegistrationError, ResolveError, VersionParseError};
pub use extract::{
    AnyVersion, DateFormat, DottedFormat, DottedVersion, FormatKind, IntegerFormat,
    TokenExtractor, VersionExtractor, VersionFormat, VersionSource, DEFAULT_VERSION_HEADER,
};
pub use history::{HistoryEntry, VersionHistory};
pub use key::{join_path, normalize_path, EndpointKey};
pub use policy::UnknownVersionPolicy;
