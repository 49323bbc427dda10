//! Route handlers and request hooks.

use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::dispatch::compose::Outcome;
use crate::error::HttpError;
use crate::http::{Context, ResponseBody};

/// What a route handler resolves to: the response body, or the error that
/// aborts the request.
pub type HandlerResult = Result<ResponseBody, HttpError>;

pub trait Handler: Send + Sync + 'static {
    fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, HandlerResult>;
}

impl<F> Handler for F
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
{
    fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, HandlerResult> {
        self(ctx)
    }
}

/// A before/after hook. Runs to completion before the next one starts.
pub trait Hook: Send + Sync + 'static {
    fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, Outcome>;
}

impl<F> Hook for F
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, Outcome> + Send + Sync + 'static,
{
    fn call<'a>(&'a self, ctx: &'a mut Context) -> BoxFuture<'a, Outcome> {
        self(ctx)
    }
}

/// Wrap a closure as a route handler.
pub fn handler_fn<F>(f: F) -> Arc<dyn Handler>
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wrap a closure as a before/after hook.
pub fn hook_fn<F>(f: F) -> Arc<dyn Hook>
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, Outcome> + Send + Sync + 'static,
{
    Arc::new(f)
}
