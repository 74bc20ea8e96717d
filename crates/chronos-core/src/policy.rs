//! Handling of version tokens newer than every released version.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What the router does with a version token that is strictly newer than the
/// newest version in the history.
///
/// Tokens between two released versions are never affected; they always
/// resolve to the closest earlier implementation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownVersionPolicy {
    /// Serve the newest implementation of the endpoint.
    #[default]
    Nearest,
    /// Fail with [`ResolveError::FutureVersion`](crate::ResolveError::FutureVersion).
    Reject,
}

impl UnknownVersionPolicy {
    /// Returns the configuration name of the policy.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Nearest => "nearest",
            Self::Reject => "reject",
        }
    }
}

impl FromStr for UnknownVersionPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "nearest" => Ok(Self::Nearest),
            "reject" => Ok(Self::Reject),
            other => Err(format!("unknown version policy '{other}'")),
        }
    }
}

impl fmt::Display for UnknownVersionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
