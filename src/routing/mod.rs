//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Route registration (at startup):
//!     pattern text
//!     → pattern.rs (literal / :param / *wildcard segments)
//!     → tree.rs (merge into the method's radix tree)
//!     → router.rs (one tree per method + method-agnostic tree)
//!
//! Incoming request (method, path):
//!     → router.rs (pick method tree, fall back to agnostic tree)
//!     → tree.rs (backtracking search: static > param > wildcard)
//!     → Return: matched value + bound params, or no match
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in the hot path
//! - Deterministic: precedence does not depend on registration order

pub mod pattern;
pub mod router;
pub mod tree;

pub use pattern::{IntoPattern, PathPattern, Segment};
pub use router::{MethodRouter, Params, RouteMatch};
