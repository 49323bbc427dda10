//! Request cycle tests through the fully layered router.

use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::http::{Method, StatusCode};
use futures_util::future::{self, BoxFuture, FutureExt};
use serde::Deserialize;
use serde_json::{json, Value};

use spark::dispatch::HandlerResult;
use spark::{App, Context, CookieOptions, HttpError, ResponseBody, ServerConfig};

mod common;

/// Handler answering with a fixed text body.
fn text(
    body: &'static str,
) -> impl for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static {
    move |_ctx| future::ready(Ok(body.into())).boxed()
}

#[tokio::test]
async fn test_static_param_and_wildcard_precedence() {
    let mut app = App::new();
    app.get("/users/me", text("static")).unwrap();
    app.get("/users/:id", |ctx| {
        let id = ctx.param("id").unwrap_or_default().to_string();
        future::ready(Ok(format!("param {id}").into())).boxed()
    })
    .unwrap();
    app.get("/users/*rest", |ctx| {
        let rest = ctx.param("rest").unwrap_or_default().to_string();
        future::ready(Ok(format!("wildcard {rest}").into())).boxed()
    })
    .unwrap();
    let router = common::router(app.freeze());

    assert_eq!(common::get(&router, "/users/me").await.body, "static");
    assert_eq!(common::get(&router, "/users/42").await.body, "param 42");
    assert_eq!(
        common::get(&router, "/users/42/posts/7").await.body,
        "wildcard 42/posts/7"
    );
}

#[tokio::test]
async fn test_unmatched_route_is_404() {
    let router = common::router(App::new().freeze());
    let response = common::get(&router, "/nothing/here").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(response.body, "Route not found: /nothing/here");
}

#[tokio::test]
async fn test_path_is_percent_decoded_before_routing() {
    let mut app = App::new();
    app.get("/hello/:name", |ctx| {
        let name = ctx.param("name").unwrap_or_default().to_string();
        future::ready(Ok(name.into())).boxed()
    })
    .unwrap();
    let router = common::router(app.freeze());

    assert_eq!(common::get(&router, "/hello/caf%C3%A9").await.body, "café");
}

#[tokio::test]
async fn test_encoded_slash_stays_in_one_segment() {
    let mut app = App::new();
    app.get("/files/:name", |ctx| {
        let name = ctx.param("name").unwrap_or_default().to_string();
        future::ready(Ok(name.into())).boxed()
    })
    .unwrap();
    let router = common::router(app.freeze());

    let response = common::get(&router, "/files/a%2Fb").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, "a%2Fb");

    let response = common::get(&router, "/files/a/b").await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_query_parameters() {
    let mut app = App::new();
    app.get("/search", |ctx| {
        let q = ctx.query_param("q").unwrap_or("none").to_string();
        future::ready(Ok(q.into())).boxed()
    })
    .unwrap();
    let router = common::router(app.freeze());

    assert_eq!(common::get(&router, "/search?q=radix+tree").await.body, "radix tree");
    assert_eq!(common::get(&router, "/search").await.body, "none");
}

#[tokio::test]
async fn test_middleware_onion_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let mut app = App::new();
    for name in ["A", "B"] {
        let log = log.clone();
        app.use_fn(move |ctx, next| {
            let log = log.clone();
            async move {
                log.lock().unwrap().push(format!("{name}-before"));
                next.run(ctx).await?;
                log.lock().unwrap().push(format!("{name}-after"));
                Ok(())
            }
            .boxed()
        });
    }
    let handler_log = log.clone();
    app.get("/", move |_ctx| {
        handler_log.lock().unwrap().push("H".to_string());
        future::ready(Ok("ok".into())).boxed()
    })
    .unwrap();
    let router = common::router(app.freeze());

    let response = common::get(&router, "/").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        *log.lock().unwrap(),
        ["A-before", "B-before", "H", "B-after", "A-after"]
    );
}

#[tokio::test]
async fn test_middleware_calling_next_twice_fails_the_request() {
    let mut app = App::new();
    app.use_fn(|ctx, next| {
        async move {
            next.run(ctx).await?;
            next.run(ctx).await
        }
        .boxed()
    });
    app.get("/", text("once")).unwrap();
    let router = common::router(app.freeze());

    let response = common::get(&router, "/").await;
    assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.body, "next() called multiple times");
}

#[tokio::test]
async fn test_middleware_sees_error_and_can_recover() {
    let mut app = App::new();
    app.use_fn(|ctx, next| {
        async move {
            match next.run(ctx).await {
                Err(err) if err.status() == StatusCode::NOT_FOUND => {
                    ctx.set_status(StatusCode::OK);
                    ctx.set_body("fallback page");
                    Ok(())
                }
                other => other,
            }
        }
        .boxed()
    });
    let router = common::router(app.freeze());

    let response = common::get(&router, "/missing").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.body, "fallback page");
}

#[tokio::test]
async fn test_error_handler_renders_json() {
    let mut app = App::new();
    app.error_handler(|ctx| {
        let message = ctx.error().map(|e| e.message().to_string()).unwrap_or_default();
        future::ready(ResponseBody::json(json!({ "error": message }))).boxed()
    });
    app.get("/fail", |_ctx| {
        future::ready(Err(HttpError::new("Forbidden zone", StatusCode::FORBIDDEN))).boxed()
    })
    .unwrap();
    let router = common::router(app.freeze());

    let response = common::get(&router, "/fail").await;
    assert_eq!(response.status, StatusCode::FORBIDDEN);
    assert_eq!(
        response.header("content-type"),
        Some("application/json; charset=utf-8")
    );
    let body: Value = serde_json::from_str(&response.body).unwrap();
    assert_eq!(body, json!({"error": "Forbidden zone"}));
}

#[derive(Debug, Deserialize)]
struct Item {
    name: String,
    qty: u32,
}

#[tokio::test]
async fn test_json_request_body() {
    let mut app = App::new();
    app.post("/items", |ctx| {
        let item = ctx.json::<Item>();
        ctx.set_status(StatusCode::CREATED);
        async move {
            let item = item?;
            ResponseBody::json(json!({ "name": item.name, "total": item.qty * 2 }))
        }
        .boxed()
    })
    .unwrap();
    let router = common::router(app.freeze());

    let response = common::send(
        &router,
        Method::POST,
        "/items",
        &[("content-type", "application/json")],
        r#"{"name":"bolt","qty":21}"#,
    )
    .await;
    assert_eq!(response.status, StatusCode::CREATED);
    assert_eq!(response.body, r#"{"name":"bolt","total":42}"#);

    let response = common::send(&router, Method::POST, "/items", &[], "{broken").await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(response.body.starts_with("Invalid JSON body"));
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let mut app = App::new();
    app.post("/upload", text("stored")).unwrap();
    let mut config = ServerConfig::default();
    config.limits.max_body_bytes = 16;
    let router = common::router_with(app.freeze(), config);

    let response = common::send(&router, Method::POST, "/upload", &[], vec![b'x'; 64]).await;
    assert_eq!(response.status, StatusCode::PAYLOAD_TOO_LARGE);

    let response = common::send(&router, Method::POST, "/upload", &[], "small").await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_redirect_is_not_overwritten() {
    let mut app = App::new();
    app.get("/old", |ctx| {
        let result = ctx.redirect("/new", StatusCode::FOUND);
        future::ready(result.map(|_| "ignored".into())).boxed()
    })
    .unwrap();
    let router = common::router(app.freeze());

    let response = common::get(&router, "/old").await;
    assert_eq!(response.status, StatusCode::FOUND);
    assert_eq!(response.header("location"), Some("/new"));
    assert!(response.body.is_empty());
}

#[tokio::test]
async fn test_cookies_in_and_out() {
    let mut app = App::new();
    app.get("/session", |ctx| {
        let seen = ctx.cookies().get("sid").cloned().unwrap_or_default();
        let options = CookieOptions {
            http_only: true,
            path: Some("/".into()),
            ..Default::default()
        };
        let result = ctx.set_cookie("sid", Some("fresh"), &options);
        future::ready(result.map(|_| format!("seen {seen}").into())).boxed()
    })
    .unwrap();
    let router = common::router(app.freeze());

    let response = common::send(
        &router,
        Method::GET,
        "/session",
        &[("cookie", "sid=old; theme=dark")],
        Body::empty(),
    )
    .await;
    assert_eq!(response.body, "seen old");
    assert_eq!(response.header("set-cookie"), Some("sid=fresh; Path=/; HttpOnly"));
}

#[tokio::test]
async fn test_request_id_is_generated_and_propagated() {
    let mut app = App::new();
    app.get("/id", |ctx| {
        let id = ctx.request_id().unwrap_or("missing").to_string();
        future::ready(Ok(id.into())).boxed()
    })
    .unwrap();
    let router = common::router(app.freeze());

    let response = common::get(&router, "/id").await;
    let echoed = response.header("x-request-id").unwrap();
    assert_eq!(response.body, echoed);
    assert_eq!(echoed.len(), 36);

    let response = common::send(
        &router,
        Method::GET,
        "/id",
        &[("x-request-id", "client-chosen")],
        Body::empty(),
    )
    .await;
    assert_eq!(response.body, "client-chosen");
    assert_eq!(response.header("x-request-id"), Some("client-chosen"));
}

#[tokio::test]
async fn test_method_agnostic_route_fallback() {
    let mut app = App::new();
    app.get("/resource", text("get")).unwrap();
    app.all("/resource", text("any")).unwrap();
    let router = common::router(app.freeze());

    assert_eq!(common::get(&router, "/resource").await.body, "get");
    let response = common::send(&router, Method::DELETE, "/resource", &[], Body::empty()).await;
    assert_eq!(response.body, "any");
}

#[tokio::test]
async fn test_streamed_body_arrives_in_full() {
    let mut app = App::new();
    app.get("/feed/:count", |ctx| {
        let count: usize = ctx.param("count").and_then(|c| c.parse().ok()).unwrap_or(0);
        let chunks = (1..=count).map(|n| Ok::<_, std::io::Error>(format!("chunk-{n};")));
        let _ = ctx.set_header("content-type", "text/plain");
        future::ready(Ok(ResponseBody::stream(futures_util::stream::iter(chunks)))).boxed()
    })
    .unwrap();
    let router = common::router(app.freeze());

    let response = common::get(&router, "/feed/3").await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.header("content-type"), Some("text/plain"));
    assert_eq!(response.body, "chunk-1;chunk-2;chunk-3;");
}

#[tokio::test]
async fn test_no_content_has_empty_body() {
    let mut app = App::new();
    app.delete("/items/:id", |ctx| {
        ctx.set_status(StatusCode::NO_CONTENT);
        future::ready(Ok("dropped".into())).boxed()
    })
    .unwrap();
    let router = common::router(app.freeze());

    let response = common::send(&router, Method::DELETE, "/items/1", &[], Body::empty()).await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);
    assert!(response.body.is_empty());
}
