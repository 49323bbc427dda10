//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID / trace / timeout layers,
//!                  body buffering)
//!     → context.rs (per-request Context built from the request parts)
//!     → [app request cycle: plugins, hooks, middleware, route lookup]
//!     → response.rs (status + headers + body frozen into the response)
//!     → Send to client
//! ```

pub mod context;
pub mod request;
pub mod response;
pub mod server;

pub use context::{Context, CookieOptions};
pub use request::{MakeRequestUuidV4, X_REQUEST_ID};
pub use response::{Outgoing, ResponseBody};
pub use server::HttpServer;
