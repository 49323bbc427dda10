//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Request cycle produces:
//!     → logging.rs (structured log events, request ID as a field)
//!     → metrics.rs (request counter, latency histogram)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID flows through every log line of a request
//! - Metrics are cheap (atomic increments)

pub mod logging;
pub mod metrics;
