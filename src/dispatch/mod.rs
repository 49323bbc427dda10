//! Dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! Context (after plugins and before hooks)
//!     → compose.rs (layer 0 → layer 1 → ... in registration order)
//!     → lookup.rs (innermost: find route, bind params, call handler,
//!                  render template, store body)
//!     → unwind back out through each layer's after-`next` code
//! ```
//!
//! # Design Decisions
//! - Composed once when the app is frozen, shared by every request
//! - Errors propagate outward through `?`; layers that want cleanup match
//!   on the result of `next.run` instead
//! - Calling `next` twice from one layer is an error, not a re-run

pub mod compose;
pub mod handler;
pub mod lookup;

pub use compose::{compose, from_fn, Middleware, Next, Outcome, Pipeline};
pub use handler::{handler_fn, hook_fn, Handler, HandlerResult, Hook};
pub use lookup::{Route, RouteLookup};
