//! Version-aware radix tree router for Chronos.
//!
//! One logical endpoint (method + path) can carry several implementations,
//! each released at a version of the service's
//! [`VersionHistory`](chronos_core::VersionHistory). For every request the
//! router picks exactly one of them:
//!
//! - **No version**: the newest registered implementation
//! - **Exact version**: that implementation
//! - **Version between releases**: the closest earlier implementation
//! - **Version newer than every release**: the newest implementation, or an
//!   error under [`UnknownVersionPolicy::Reject`](chronos_core::UnknownVersionPolicy)
//! - **Version older than every implementation**: [`ResolveError::NoQualifyingVersion`](chronos_core::ResolveError)
//!
//! # Example
//!
//! ```rust
//! use chronos_core::{DateFormat, TokenExtractor, VersionHistory};
//! use chronos_router::VersionedRouterBuilder;
//! use http::Method;
//!
//! let history = VersionHistory::from_format(["2024-01-01", "2024-02-01"], &DateFormat).unwrap();
//! let mut builder = VersionedRouterBuilder::new(history, TokenExtractor::header_default(DateFormat));
//!
//! builder
//!     .get("/users/:id")
//!     .version("2024-01-01", "getUserV1")
//!     .unwrap()
//!     .version("2024-02-01", "getUserV2")
//!     .unwrap();
//!
//! let router = builder.build();
//! let resolved = router.resolve(&Method::GET, "/users/123", Some("2024-01-15")).unwrap();
//!
//! assert_eq!(*resolved.implementation(), "getUserV1");
//! assert_eq!(resolved.resolved_version(), "2024-01-01");
//! assert_eq!(resolved.params().get("id"), Some("123"));
//! ```
//!
//! # Architecture
//!
//! ```text
//!                    (root)
//!                      │
//!                   "users"
//!                      │
//!                   "{id}"
//!                      │
//!               MethodTable [GET -> entry 0]
//!                      │
//!        RouteTableEntry "GET /users/{id}"
//!        ├── position 0: "2024-01-01" -> getUserV1
//!        └── position 1: "2024-02-01" -> getUserV2
//! ```

mod builder;
mod method_table;
mod node;
mod params;
mod resolve;
mod router;
mod table;

pub use builder::{RouteBuilder, Scope, VersionedRouterBuilder};
pub use method_table::MethodTable;
pub use node::{Captures, Node, SegmentKind};
pub use params::Params;
pub use resolve::{select, ResolvedRoute};
pub use router::VersionedRouter;
pub use table::{RouteImplementation, RouteTable, RouteTableEntry};
