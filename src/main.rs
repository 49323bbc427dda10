//! Spark demonstration server.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ http::server (axum, request ID, trace, timeout)
//!                          │
//!                          ▼
//!                     app::Spark::handle
//!                          │  plugins → before hooks
//!                          ▼
//!                     dispatch pipeline (middleware, outermost first)
//!                          │
//!                          ▼
//!                     route lookup (routing radix trees) → handler
//!                          │
//!                          ▼  after hooks, error mapping, flush
//!     Client Response ◀────┘
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use axum::http::StatusCode;
use clap::Parser;
use futures_util::future::{self, FutureExt};
use serde::Deserialize;
use serde_json::json;
use tokio::net::TcpListener;

use spark::config::{load_config, ServerConfig};
use spark::lifecycle::{signals, Shutdown};
use spark::observability::{logging, metrics};
use spark::{App, HttpError, HttpServer, RegistrationError, ResponseBody};

#[derive(Debug, Parser)]
#[command(name = "spark", version, about = "Spark demonstration server")]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Greeting {
    name: String,
}

/// Visit counter shared through the plugin registry.
#[derive(Debug, Default)]
struct Visits(AtomicU64);

fn build_app() -> Result<App, RegistrationError> {
    let mut app = App::new();

    app.plugin("visits", Visits::default())?;

    app.use_fn(|ctx, next| {
        async move {
            let start = Instant::now();
            let result = next.run(ctx).await;
            let elapsed = format!("{}ms", start.elapsed().as_millis());
            ctx.set_header("x-response-time", &elapsed)?;
            result
        }
        .boxed()
    });

    app.before(|ctx| {
        if let Some(visits) = ctx.plugin::<Visits>("visits") {
            visits.0.fetch_add(1, Ordering::Relaxed);
        }
        future::ready(Ok(())).boxed()
    });

    app.after(|ctx| future::ready(ctx.set_header("x-powered-by", "spark")).boxed());

    app.error_handler(|ctx| {
        let (status, message) = match ctx.error() {
            Some(err) => (err.status().as_u16(), err.message().to_string()),
            None => (500, "Internal Server Error".to_string()),
        };
        future::ready(ResponseBody::json(json!({ "status": status, "error": message }))).boxed()
    });

    app.get("/", |_ctx| future::ready(Ok("Spark is running".into())).boxed())?;

    app.get("/hello/:name", |ctx| {
        let name = ctx.param("name").unwrap_or("stranger").to_string();
        future::ready(Ok(format!("Hello, {name}!").into())).boxed()
    })?;

    app.post("/hello", |ctx| {
        let greeting = ctx.json::<Greeting>();
        async move {
            let greeting = greeting?;
            ResponseBody::json(json!({ "message": format!("Hello, {}!", greeting.name) }))
        }
        .boxed()
    })?;

    app.get("/visits", |ctx| {
        let count = ctx
            .plugin::<Visits>("visits")
            .map(|v| v.0.load(Ordering::Relaxed))
            .unwrap_or_default();
        future::ready(ResponseBody::json(json!({ "visits": count }))).boxed()
    })?;

    app.get("/files/*path", |ctx| {
        let path = ctx.param("path").unwrap_or_default().to_string();
        future::ready(Ok(format!("file: {path}").into())).boxed()
    })?;

    app.get("/old", |ctx| {
        let result = ctx.redirect("/", StatusCode::MOVED_PERMANENTLY);
        future::ready(result.map(|_| ResponseBody::Empty)).boxed()
    })?;

    app.all("/teapot", |_ctx| {
        future::ready(Err(HttpError::new("I'm a teapot", StatusCode::IM_A_TEAPOT))).boxed()
    })?;

    Ok(app)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    logging::init(&config.observability)?;
    tracing::info!("spark v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_body_bytes = config.limits.max_body_bytes,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let app = build_app()?.freeze();

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(app, config);
    let server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    signals::shutdown_on_signal(&shutdown).await;
    server_task.await??;

    tracing::info!("Shutdown complete");
    Ok(())
}
