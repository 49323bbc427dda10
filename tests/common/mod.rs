//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;

use axum::body::Body;
use axum::http::{HeaderMap, Method, Request, StatusCode};
use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tower::ServiceExt;

use spark::{HttpServer, ServerConfig, Shutdown, Spark};

/// A response read fully into memory.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl TestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

/// Build the fully layered router for `app` with default config.
pub fn router(app: Spark) -> Router {
    HttpServer::new(app, ServerConfig::default()).router()
}

pub fn router_with(app: Spark, config: ServerConfig) -> Router {
    HttpServer::new(app, config).router()
}

/// Drive one request through `router` in-process.
pub async fn send(
    router: &Router,
    method: Method,
    uri: &str,
    headers: &[(&str, &str)],
    body: impl Into<Body>,
) -> TestResponse {
    let mut request = Request::builder().method(method).uri(uri);
    for (name, value) in headers {
        request = request.header(*name, *value);
    }
    let request = request.body(body.into()).unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    TestResponse {
        status,
        headers,
        body: String::from_utf8(bytes.to_vec()).unwrap(),
    }
}

pub async fn get(router: &Router, uri: &str) -> TestResponse {
    send(router, Method::GET, uri, &[], Body::empty()).await
}

/// Serve `app` on an ephemeral port.
pub async fn start_server(
    app: Spark,
    config: ServerConfig,
) -> (SocketAddr, Shutdown, JoinHandle<std::io::Result<()>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = HttpServer::new(app, config);
    let handle = tokio::spawn(server.run(listener, shutdown.subscribe()));
    (addr, shutdown, handle)
}
