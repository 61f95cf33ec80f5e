//! huddle-server — HTTP entry point for the huddle agent bus.
//!
//! One listener serves the REST console API, the console SSE stream, image
//! uploads, and the MCP SSE transport; all of them route into a single
//! `ChatBus` instance.

use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderValue, Method, Request};
use tokio_util::sync::CancellationToken;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{
    MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer,
};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use huddle_api::AppState;
use huddle_bus::{BusConfig, ChatBus, PresenceSweeper};
use huddle_core::defaults;
use huddle_db::Database;

/// Generates time-ordered UUIDv7 request correlation IDs.
///
/// UUIDv7 embeds a Unix timestamp, so IDs sort chronologically — useful for
/// log correlation when tracing a request across the bus.
#[derive(Clone, Default)]
struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string();
        HeaderValue::from_str(&id).ok().map(RequestId::new)
    }
}

/// Parse allowed origins from a comma-separated environment variable.
///
/// Defaults to the local console origins; set `ALLOWED_ORIGINS` to expose
/// the console from elsewhere.
fn parse_allowed_origins(default_port: u16) -> Vec<HeaderValue> {
    let defaults = || {
        vec![
            HeaderValue::from_str(&format!("http://localhost:{}", default_port)).unwrap(),
            HeaderValue::from_str(&format!("http://127.0.0.1:{}", default_port)).unwrap(),
        ]
    };
    let Ok(origins_str) = std::env::var("ALLOWED_ORIGINS") else {
        return defaults();
    };
    if origins_str.trim().is_empty() {
        return defaults();
    }
    origins_str
        .split(',')
        .filter_map(|s| {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            match trimmed.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(e) => {
                    tracing::warn!("Invalid CORS origin '{}': {}", trimmed, e);
                    None
                }
            }
        })
        .collect()
}

fn init_tracing() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    // Environment variables:
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables file logging)
    //   RUST_LOG    - standard env filter
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "huddle_api=debug,huddle_bus=debug,huddle_db=debug,tower_http=debug".into()
    });
    let registry = tracing_subscriber::registry().with(env_filter);

    if let Some(ref path) = log_file {
        let dir = std::path::Path::new(path)
            .parent()
            .unwrap_or(std::path::Path::new("."));
        let name = std::path::Path::new(path)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("huddle-server.log");
        let appender = tracing_appender::rolling::daily(dir, name);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_writer(non_blocking))
                .init();
        } else {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false),
                )
                .init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry.with(tracing_subscriber::fmt::layer().json()).init();
        } else {
            registry.with(tracing_subscriber::fmt::layer()).init();
        }
        None
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let _log_guard = init_tracing();

    let config = BusConfig::from_env();
    info!(
        host = %config.host,
        port = config.port,
        db = %config.db_path,
        "Starting huddle bus"
    );

    let db = Database::connect(&config.db_path).await?;
    info!("Database ready");

    let shutdown = CancellationToken::new();
    let bus = Arc::new(ChatBus::new(db.clone(), config.clone(), shutdown.clone())?);

    let sweeper = PresenceSweeper::new(
        db,
        bus.events(),
        config.heartbeat_timeout_secs,
        config.thread_timeout_minutes,
        shutdown.clone(),
    );
    let sweeper_handle = sweeper.spawn();

    let state = AppState::new(bus);
    let app = huddle_api::router(state)
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .layer({
            let allowed_origins = parse_allowed_origins(config.port);
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(allowed_origins))
                .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
                .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
                .max_age(Duration::from_secs(3600))
        })
        // Uploads are the largest accepted bodies.
        .layer(RequestBodyLimitLayer::new(config.upload_max_bytes + 64 * 1024));

    // Ctrl-C / SIGTERM cancels the root token, which wakes every parked
    // waiter and stops the sweeper.
    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let ctrl_c = async {
                let _ = tokio::signal::ctrl_c().await;
            };
            #[cfg(unix)]
            let terminate = async {
                match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                    Ok(mut sig) => {
                        sig.recv().await;
                    }
                    Err(_) => std::future::pending().await,
                }
            };
            #[cfg(not(unix))]
            let terminate = std::future::pending::<()>();
            tokio::select! {
                _ = ctrl_c => {}
                _ = terminate => {}
            }
            info!("Shutdown signal received");
            shutdown.cancel();
        });
    }

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", addr);

    let graceful = {
        let shutdown = shutdown.clone();
        async move { shutdown.cancelled().await }
    };
    let serve = axum::serve(listener, app)
        .with_graceful_shutdown(graceful)
        .into_future();

    // Open SSE streams can outlive the accept loop; bound the drain so the
    // process quiesces within the grace window.
    tokio::select! {
        result = serve => result?,
        _ = async {
            shutdown.cancelled().await;
            tokio::time::sleep(Duration::from_secs(defaults::SHUTDOWN_GRACE_SECS)).await;
        } => {
            tracing::warn!("grace period elapsed; dropping remaining connections");
        }
    }

    shutdown.cancel();
    let _ = tokio::time::timeout(
        Duration::from_secs(defaults::SHUTDOWN_GRACE_SECS),
        sweeper_handle,
    )
    .await;
    info!("Bus stopped");
    Ok(())
}
