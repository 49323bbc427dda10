//! Terminal layer: route lookup and handler invocation.
//!
//! # Responsibilities
//! - Resolve (method, path) against the frozen router
//! - Bind path parameters onto the context
//! - Call the handler and render its template, if the route names one
//! - Store the result in the context's body slot
//!
//! # Design Decisions
//! - A miss is an error (404), never a silent fall-through
//! - Still calls `next` afterwards so layers registered behind the lookup
//!   observe a populated body

use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};

use crate::dispatch::compose::{Middleware, Next, Outcome};
use crate::dispatch::handler::Handler;
use crate::error::HttpError;
use crate::http::Context;
use crate::routing::{MethodRouter, PathPattern};

/// A registered route.
pub struct Route {
    pub pattern: PathPattern,
    pub handler: Arc<dyn Handler>,
    /// Template rendered with the handler's result as data.
    pub template: Option<String>,
}

pub struct RouteLookup {
    router: Arc<MethodRouter<Route>>,
}

impl RouteLookup {
    pub fn new(router: Arc<MethodRouter<Route>>) -> Self {
        Self { router }
    }

    async fn dispatch(&self, ctx: &mut Context, next: Next<'_>) -> Outcome {
        let matched = self
            .router
            .find(ctx.method(), ctx.path())
            .ok_or_else(|| HttpError::not_found(format!("Route not found: {}", ctx.path())))?;

        let route = matched.value;
        tracing::debug!(
            method = %ctx.method(),
            path = %ctx.path(),
            route = %route.pattern,
            "Route matched"
        );
        ctx.set_params(matched.params);

        let body = route.handler.call(ctx).await?;
        match &route.template {
            Some(template) => {
                let html = ctx.view(template, &body.into_value())?;
                ctx.set_body(html);
            }
            None => ctx.set_body(body),
        }

        next.run(ctx).await
    }
}

impl Middleware for RouteLookup {
    fn call<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, Outcome> {
        self.dispatch(ctx, next).boxed()
    }

    fn name(&self) -> &str {
        "route_lookup"
    }
}
