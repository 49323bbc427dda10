//! Application builder and the per-request cycle.
//!
//! # Responsibilities
//! - Collect routes, middleware, hooks, plugins and the error handler
//!   (optionally rendered through an error template)
//! - Freeze them into an immutable `Spark` shared by every request
//! - Run one request: plugins → before hooks → pipeline → after hooks,
//!   map any error to a response, flush once
//!
//! # Design Decisions
//! - `App::freeze` consumes the builder; nothing can be registered after
//!   the first request is served
//! - Registration failures surface immediately as `RegistrationError`
//!   and leave the builder as it was
//! - Per-request errors never escape `Spark::handle`

use std::any::Any;
use std::sync::Arc;
use std::time::Instant;

use axum::http::Method;
use futures_util::future::BoxFuture;

use crate::dispatch::{
    compose, handler_fn, hook_fn, Handler, HandlerResult, Hook, Middleware, Next, Outcome, Pipeline,
    Route, RouteLookup,
};
use crate::error::{HttpError, RegistrationError};
use crate::http::context::RESERVED_NAMES;
use crate::http::{Context, ResponseBody};
use crate::observability::metrics;
use crate::routing::{IntoPattern, MethodRouter};
use crate::template::Renderer;

type Capability = Arc<dyn Any + Send + Sync>;

/// Route, middleware and plugin registration.
#[derive(Default)]
pub struct App {
    router: MethodRouter<Route>,
    middleware: Vec<Arc<dyn Middleware>>,
    befores: Vec<Arc<dyn Hook>>,
    afters: Vec<Arc<dyn Hook>>,
    plugins: Vec<(String, Capability)>,
    renderer: Option<Arc<dyn Renderer>>,
    error_handler: Option<Arc<dyn Handler>>,
    error_template: Option<String>,
}

impl App {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `method` and `pattern`.
    pub fn route<P, F>(
        &mut self,
        method: Method,
        pattern: P,
        handler: F,
    ) -> Result<&mut Self, RegistrationError>
    where
        P: IntoPattern,
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.add_route(Some(method), pattern, handler_fn(handler), None)
    }

    /// Register `handler` for every method.
    pub fn all<P, F>(&mut self, pattern: P, handler: F) -> Result<&mut Self, RegistrationError>
    where
        P: IntoPattern,
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.add_route(None, pattern, handler_fn(handler), None)
    }

    pub fn get<P, F>(&mut self, pattern: P, handler: F) -> Result<&mut Self, RegistrationError>
    where
        P: IntoPattern,
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.route(Method::GET, pattern, handler)
    }

    pub fn post<P, F>(&mut self, pattern: P, handler: F) -> Result<&mut Self, RegistrationError>
    where
        P: IntoPattern,
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.route(Method::POST, pattern, handler)
    }

    pub fn put<P, F>(&mut self, pattern: P, handler: F) -> Result<&mut Self, RegistrationError>
    where
        P: IntoPattern,
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.route(Method::PUT, pattern, handler)
    }

    pub fn delete<P, F>(&mut self, pattern: P, handler: F) -> Result<&mut Self, RegistrationError>
    where
        P: IntoPattern,
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.route(Method::DELETE, pattern, handler)
    }

    pub fn patch<P, F>(&mut self, pattern: P, handler: F) -> Result<&mut Self, RegistrationError>
    where
        P: IntoPattern,
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.route(Method::PATCH, pattern, handler)
    }

    pub fn head<P, F>(&mut self, pattern: P, handler: F) -> Result<&mut Self, RegistrationError>
    where
        P: IntoPattern,
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.route(Method::HEAD, pattern, handler)
    }

    pub fn options<P, F>(&mut self, pattern: P, handler: F) -> Result<&mut Self, RegistrationError>
    where
        P: IntoPattern,
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.route(Method::OPTIONS, pattern, handler)
    }

    /// Register a route whose handler result is rendered through `template`.
    pub fn view_route<P, F>(
        &mut self,
        method: Method,
        pattern: P,
        template: impl Into<String>,
        handler: F,
    ) -> Result<&mut Self, RegistrationError>
    where
        P: IntoPattern,
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.add_route(
            Some(method),
            pattern,
            handler_fn(handler),
            Some(template.into()),
        )
    }

    fn add_route<P: IntoPattern>(
        &mut self,
        method: Option<Method>,
        pattern: P,
        handler: Arc<dyn Handler>,
        template: Option<String>,
    ) -> Result<&mut Self, RegistrationError> {
        let pattern = pattern.into_pattern()?;
        let route = Route {
            pattern: pattern.clone(),
            handler,
            template,
        };
        self.router.add(method, &pattern, route)?;
        Ok(self)
    }

    /// Append a middleware layer. The first one registered is outermost.
    pub fn use_middleware(&mut self, middleware: impl Middleware) -> &mut Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    pub fn use_fn<F>(&mut self, f: F) -> &mut Self
    where
        F: for<'a> Fn(&'a mut Context, Next<'a>) -> BoxFuture<'a, Outcome> + Send + Sync + 'static,
    {
        self.middleware.push(Arc::new(f));
        self
    }

    /// Hook run before the pipeline, in registration order.
    pub fn before<F>(&mut self, hook: F) -> &mut Self
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, Outcome> + Send + Sync + 'static,
    {
        self.befores.push(hook_fn(hook));
        self
    }

    /// Hook run after the pipeline, in registration order.
    pub fn after<F>(&mut self, hook: F) -> &mut Self
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, Outcome> + Send + Sync + 'static,
    {
        self.afters.push(hook_fn(hook));
        self
    }

    /// Declare a named capability attached to every request context.
    pub fn plugin<T: Any + Send + Sync>(
        &mut self,
        name: &str,
        capability: T,
    ) -> Result<&mut Self, RegistrationError> {
        if RESERVED_NAMES.contains(&name) {
            return Err(RegistrationError::ReservedPlugin(name.to_string()));
        }
        if self.plugins.iter().any(|(n, _)| n == name) {
            return Err(RegistrationError::DuplicatePlugin(name.to_string()));
        }
        self.plugins.push((name.to_string(), Arc::new(capability)));
        Ok(self)
    }

    pub fn renderer(&mut self, renderer: impl Renderer) -> &mut Self {
        self.renderer = Some(Arc::new(renderer));
        self
    }

    /// Produce the response body when a request fails. The failure is
    /// available through `ctx.error()`.
    pub fn error_handler<F>(&mut self, handler: F) -> &mut Self
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.error_handler = Some(handler_fn(handler));
        self.error_template = None;
        self
    }

    /// Like `error_handler`, but the handler's result is rendered through
    /// `template` and sent as HTML.
    pub fn error_view<F>(&mut self, template: impl Into<String>, handler: F) -> &mut Self
    where
        F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
    {
        self.error_handler = Some(handler_fn(handler));
        self.error_template = Some(template.into());
        self
    }

    /// Finish registration.
    pub fn freeze(self) -> Spark {
        let routes = self.router.len();
        let mut layers = self.middleware;
        layers.push(Arc::new(RouteLookup::new(Arc::new(self.router))));

        tracing::info!(
            routes,
            middleware = layers.len() - 1,
            befores = self.befores.len(),
            afters = self.afters.len(),
            plugins = self.plugins.len(),
            "Application frozen"
        );

        Spark {
            pipeline: compose(layers),
            befores: self.befores,
            afters: self.afters,
            plugins: self.plugins,
            renderer: self.renderer,
            error_handler: self.error_handler,
            error_template: self.error_template,
            routes,
        }
    }
}

/// A frozen application. Cheap to share behind an `Arc`.
pub struct Spark {
    pipeline: Pipeline,
    befores: Vec<Arc<dyn Hook>>,
    afters: Vec<Arc<dyn Hook>>,
    plugins: Vec<(String, Capability)>,
    renderer: Option<Arc<dyn Renderer>>,
    error_handler: Option<Arc<dyn Handler>>,
    error_template: Option<String>,
    routes: usize,
}

impl Spark {
    /// Run one request to completion. The response is flushed on return.
    pub async fn handle(&self, ctx: &mut Context) {
        let start = Instant::now();
        if let Some(renderer) = &self.renderer {
            ctx.set_renderer(renderer.clone());
        }

        tracing::debug!(
            request_id = ctx.request_id().unwrap_or("unknown"),
            method = %ctx.method(),
            path = %ctx.path(),
            "Dispatching request"
        );

        if let Err(err) = self.cycle(ctx).await {
            self.recover(ctx, err).await;
        }
        ctx.flush();

        let status = ctx.outgoing().map(|out| out.status()).unwrap_or(ctx.status());
        metrics::record_request(ctx.method().as_str(), status.as_u16(), start);
    }

    async fn cycle(&self, ctx: &mut Context) -> Outcome {
        for (name, capability) in &self.plugins {
            ctx.inject_plugin(name, capability.clone())?;
        }
        for hook in &self.befores {
            hook.call(ctx).await?;
        }
        self.pipeline.run(ctx).await?;
        for hook in &self.afters {
            hook.call(ctx).await?;
        }
        Ok(())
    }

    async fn recover(&self, ctx: &mut Context, err: HttpError) {
        let status = err.status();
        if status.is_server_error() {
            tracing::error!(
                request_id = ctx.request_id().unwrap_or("unknown"),
                method = %ctx.method(),
                path = %ctx.path(),
                status = status.as_u16(),
                error = %err,
                "Request failed"
            );
        } else {
            tracing::warn!(
                request_id = ctx.request_id().unwrap_or("unknown"),
                method = %ctx.method(),
                path = %ctx.path(),
                status = status.as_u16(),
                error = %err,
                "Request rejected"
            );
        }

        ctx.set_status(status);
        ctx.set_error(err.clone());

        let body = match &self.error_handler {
            Some(handler) => match handler
                .call(ctx)
                .await
                .and_then(|body| self.render_error(ctx, body))
            {
                Ok(body) => body,
                Err(handler_err) => {
                    tracing::error!(error = %handler_err, "Error handler failed");
                    ResponseBody::from(err.message())
                }
            },
            None => ResponseBody::from(err.message()),
        };
        ctx.set_body(body);
    }

    fn render_error(&self, ctx: &mut Context, body: ResponseBody) -> HandlerResult {
        match &self.error_template {
            Some(template) => Ok(ctx.view(template, &body.into_value())?.into()),
            None => Ok(body),
        }
    }

    pub fn route_count(&self) -> usize {
        self.routes
    }
}
