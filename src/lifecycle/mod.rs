//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     trigger → broadcast to subscribers → server stops accepting,
//!     drains in-flight requests, exits
//! ```
//!
//! # Design Decisions
//! - One broadcast channel; every long-running task subscribes
//! - In-flight requests finish; new connections are refused

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
