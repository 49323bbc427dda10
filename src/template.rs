//! Template rendering boundary.
//!
//! The framework does not compile templates itself. A `Renderer` is
//! plugged into the app and called when a route names a template or a
//! handler calls `ctx.view(..)`.

use serde_json::Value;

use crate::error::HttpError;

pub trait Renderer: Send + Sync + 'static {
    /// Render `template` (a name or inline text, renderer's choice) with `data`.
    fn render(&self, template: &str, data: &Value) -> Result<String, HttpError>;
}

impl<F> Renderer for F
where
    F: Fn(&str, &Value) -> Result<String, HttpError> + Send + Sync + 'static,
{
    fn render(&self, template: &str, data: &Value) -> Result<String, HttpError> {
        self(template, data)
    }
}
