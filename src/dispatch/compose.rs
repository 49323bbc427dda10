//! Onion-style middleware composition.
//!
//! # Responsibilities
//! - Define the `Middleware` seam and the `Next` continuation
//! - Compose registered layers into a single `Pipeline`
//! - Detect a layer that calls `next` more than once
//!
//! # Design Decisions
//! - First registered layer is outermost
//! - One atomic cursor per dispatch records the deepest layer entered;
//!   re-entering at or above it is an error and never reaches the inner layers
//! - An exhausted chain is a no-op terminal step

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::future::{self, BoxFuture, FutureExt};

use crate::error::HttpError;
use crate::http::Context;

/// What a layer (or hook) resolves to.
pub type Outcome = Result<(), HttpError>;

pub trait Middleware: Send + Sync + 'static {
    fn call<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, Outcome>;

    /// Label used in logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}

impl<F> Middleware for F
where
    F: for<'a> Fn(&'a mut Context, Next<'a>) -> BoxFuture<'a, Outcome> + Send + Sync + 'static,
{
    fn call<'a>(&'a self, ctx: &'a mut Context, next: Next<'a>) -> BoxFuture<'a, Outcome> {
        self(ctx, next)
    }

    fn name(&self) -> &str {
        "closure"
    }
}

/// Wrap a closure as a middleware layer.
pub fn from_fn<F>(f: F) -> Arc<dyn Middleware>
where
    F: for<'a> Fn(&'a mut Context, Next<'a>) -> BoxFuture<'a, Outcome> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Continuation handed to a layer: runs everything further in.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    chain: &'a [Arc<dyn Middleware>],
    index: usize,
    cursor: &'a AtomicUsize,
}

impl<'a> Next<'a> {
    pub fn run<'c>(&self, ctx: &'c mut Context) -> BoxFuture<'c, Outcome>
    where
        'a: 'c,
    {
        let entered = self.cursor.fetch_max(self.index + 1, Ordering::AcqRel);
        if entered > self.index {
            return future::ready(Err(HttpError::internal("next() called multiple times"))).boxed();
        }

        match self.chain.get(self.index) {
            Some(layer) => {
                tracing::trace!(layer = layer.name(), depth = self.index, "Entering middleware");
                layer.call(
                    ctx,
                    Next {
                        chain: self.chain,
                        index: self.index + 1,
                        cursor: self.cursor,
                    },
                )
            }
            None => future::ready(Ok(())).boxed(),
        }
    }
}

/// The composed chain.
#[derive(Default)]
pub struct Pipeline {
    chain: Vec<Arc<dyn Middleware>>,
}

/// Compose `layers` so that `layers[0]` wraps `layers[1]` wraps ...
pub fn compose(layers: Vec<Arc<dyn Middleware>>) -> Pipeline {
    Pipeline { chain: layers }
}

impl Pipeline {
    /// Dispatch `ctx` through every layer. Resolves exactly once.
    pub async fn run(&self, ctx: &mut Context) -> Outcome {
        let cursor = AtomicUsize::new(0);
        Next {
            chain: &self.chain,
            index: 0,
            cursor: &cursor,
        }
        .run(ctx)
        .await
    }

    pub fn len(&self) -> usize {
        self.chain.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{Method, StatusCode};
    use std::sync::Mutex;

    fn ctx() -> Context {
        Context::new(Method::GET, "/".parse().unwrap())
    }

    type Log = Arc<Mutex<Vec<String>>>;

    fn tracer(log: &Log, name: &'static str) -> Arc<dyn Middleware> {
        let log = log.clone();
        from_fn(move |ctx, next| {
            let log = log.clone();
            async move {
                log.lock().unwrap().push(format!("{name}-before"));
                next.run(ctx).await?;
                log.lock().unwrap().push(format!("{name}-after"));
                Ok(())
            }
            .boxed()
        })
    }

    fn terminal(log: &Log, outcome: Outcome) -> Arc<dyn Middleware> {
        let log = log.clone();
        from_fn(move |_ctx, _next| {
            log.lock().unwrap().push("H".to_string());
            future::ready(outcome.clone()).boxed()
        })
    }

    #[tokio::test]
    async fn test_layers_nest_in_registration_order() {
        let log: Log = Arc::default();
        let pipeline = compose(vec![
            tracer(&log, "A"),
            tracer(&log, "B"),
            terminal(&log, Ok(())),
        ]);

        pipeline.run(&mut ctx()).await.unwrap();
        assert_eq!(
            *log.lock().unwrap(),
            ["A-before", "B-before", "H", "B-after", "A-after"]
        );
    }

    #[tokio::test]
    async fn test_error_skips_after_code() {
        let log: Log = Arc::default();
        let pipeline = compose(vec![
            tracer(&log, "A"),
            tracer(&log, "B"),
            terminal(&log, Err(HttpError::new("nope", StatusCode::FORBIDDEN))),
        ]);

        let err = pipeline.run(&mut ctx()).await.unwrap_err();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(*log.lock().unwrap(), ["A-before", "B-before", "H"]);
    }

    #[tokio::test]
    async fn test_short_circuit_never_reaches_inner_layers() {
        let log: Log = Arc::default();
        let gate = from_fn(|ctx, _next| {
            ctx.set_status(StatusCode::UNAUTHORIZED);
            future::ready(Ok(())).boxed()
        });
        let pipeline = compose(vec![tracer(&log, "A"), gate, terminal(&log, Ok(()))]);

        let mut ctx = ctx();
        pipeline.run(&mut ctx).await.unwrap();
        assert_eq!(ctx.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(*log.lock().unwrap(), ["A-before", "A-after"]);
    }

    #[tokio::test]
    async fn test_double_next_is_rejected() {
        let log: Log = Arc::default();
        let twice = from_fn(|ctx, next| {
            async move {
                next.run(ctx).await?;
                next.run(ctx).await
            }
            .boxed()
        });
        let pipeline = compose(vec![twice, terminal(&log, Ok(()))]);

        let err = pipeline.run(&mut ctx()).await.unwrap_err();
        assert_eq!(err.message(), "next() called multiple times");
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        // The inner layer ran once.
        assert_eq!(*log.lock().unwrap(), ["H"]);
    }

    #[tokio::test]
    async fn test_double_next_at_end_of_chain_is_rejected() {
        let twice = from_fn(|ctx, next| {
            async move {
                next.run(ctx).await?;
                next.run(ctx).await
            }
            .boxed()
        });
        let pipeline = compose(vec![twice]);
        assert!(pipeline.run(&mut ctx()).await.is_err());
    }

    #[tokio::test]
    async fn test_empty_pipeline_is_noop() {
        let pipeline = compose(Vec::new());
        assert!(pipeline.is_empty());
        pipeline.run(&mut ctx()).await.unwrap();
    }

    #[tokio::test]
    async fn test_each_dispatch_gets_fresh_cursor() {
        let log: Log = Arc::default();
        let pipeline = compose(vec![tracer(&log, "A"), terminal(&log, Ok(()))]);
        pipeline.run(&mut ctx()).await.unwrap();
        pipeline.run(&mut ctx()).await.unwrap();
        assert_eq!(log.lock().unwrap().len(), 6);
    }
}
