//! Spark: a small HTTP application framework.
//!
//! Routes live in per-method radix trees, requests run through an
//! onion-style middleware pipeline, and a request cycle wraps both with
//! plugins, before/after hooks and error mapping.

pub mod app;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod routing;
pub mod template;

pub use app::{App, Spark};
pub use config::ServerConfig;
pub use dispatch::{from_fn, Middleware, Next, Outcome};
pub use error::{HttpError, RegistrationError};
pub use http::{Context, CookieOptions, HttpServer, ResponseBody};
pub use lifecycle::Shutdown;
pub use template::Renderer;
