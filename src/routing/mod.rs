//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route Declaration (at startup):
//!     get/post/.../map/view/auth/redirect
//!     → pattern.rs (compile, reject invalid patterns)
//!     → table.rs (duplicate check, append, attach middleware)
//!     → Freeze as Arc<RouteTable>
//!
//! Incoming Request (method, target):
//!     → uri.rs (strip query, decode, trim slashes, convention target)
//!     → redirect.rs (rewrite old path to new path)
//!     → pattern.rs (match each candidate, extract params)
//!     → Return: MatchResult or no-match
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (segment comparison only)
//! - Deterministic: same input always matches same route
//! - First match wins; override mode reverses traversal so the last wins

pub mod pattern;
pub mod redirect;
pub mod table;
pub mod types;
pub mod uri;

pub use pattern::{match_path, Pattern, WILDCARD};
pub use redirect::RedirectRule;
pub use table::{RouteEntry, RouteHandler, RouteTable};
pub use types::{MatchResult, Param, RouteError, RouteMethod, RouteResult};
