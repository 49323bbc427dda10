//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Adapt the frozen `Spark` app onto an Axum `Router`
//! - Wire up middleware (request ID, tracing, timeout)
//! - Buffer request bodies up to the configured limit
//! - Bind server to listener and shut down gracefully

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderName, Request, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::app::Spark;
use crate::config::ServerConfig;
use crate::http::context::Context;
use crate::http::request::{MakeRequestUuidV4, X_REQUEST_ID};

/// Application state injected into the dispatch handler.
#[derive(Clone)]
struct ServerState {
    app: Arc<Spark>,
    max_body_bytes: usize,
}

/// HTTP server for a frozen application.
pub struct HttpServer {
    router: Router,
    config: ServerConfig,
}

impl HttpServer {
    pub fn new(app: Spark, config: ServerConfig) -> Self {
        let state = ServerState {
            app: Arc::new(app),
            max_body_bytes: config.limits.max_body_bytes,
        };
        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &ServerConfig, state: ServerState) -> Router {
        let request_id = HeaderName::from_static(X_REQUEST_ID);
        Router::new()
            .fallback(dispatch)
            .with_state(state)
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::new(request_id.clone(), MakeRequestUuidV4))
                    .layer(TraceLayer::new_for_http())
                    .layer(TimeoutLayer::new(Duration::from_secs(
                        config.timeouts.request_secs,
                    )))
                    .layer(PropagateRequestIdLayer::new(request_id)),
            )
    }

    /// The fully layered router, for in-process use.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Draining in-flight requests");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// Single entry point: every request goes through the app's request cycle.
async fn dispatch(State(state): State<ServerState>, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, state.max_body_bytes).await {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!(
                path = %parts.uri.path(),
                limit = state.max_body_bytes,
                error = %err,
                "Request body rejected"
            );
            return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
        }
    };

    let mut ctx = Context::from_parts(parts, body);
    state.app.handle(&mut ctx).await;
    ctx.into_response()
}
