//! huddle-stdio — MCP stdio transport.
//!
//! Speaks newline-delimited JSON-RPC on stdin/stdout against the same
//! database file as the HTTP server, for MCP clients that cannot open an
//! SSE connection. Runs as its own process: `msg_wait` here falls back to
//! the safety-net poll because the event bus is per-process.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use huddle_api::mcp::{JsonRpcRequest, McpServer};
use huddle_bus::{BusConfig, ChatBus};
use huddle_db::Database;

/// `--lang <name>` sets the per-session language preference.
fn parse_lang() -> Option<String> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--lang" {
            return args.next();
        }
        if let Some(value) = arg.strip_prefix("--lang=") {
            return Some(value.to_string());
        }
    }
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // stdout carries the protocol; all diagnostics go to stderr.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "warn".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(false),
        )
        .init();

    let config = BusConfig::from_env();
    let db = Database::connect(&config.db_path).await?;
    let shutdown = CancellationToken::new();
    let bus = Arc::new(ChatBus::new(db, config, shutdown.clone())?);
    let server = McpServer::new(bus, parse_lang());

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            shutdown.cancel();
        });
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = shutdown.cancelled() => break,
        };
        let Some(line) = line else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let request: JsonRpcRequest = match serde_json::from_str(line) {
            Ok(req) => req,
            Err(e) => {
                tracing::warn!(error = %e, "discarding malformed JSON-RPC line");
                continue;
            }
        };

        if let Some(response) = server.handle(request, &shutdown).await {
            let mut out = serde_json::to_vec(&response)?;
            out.push(b'\n');
            stdout.write_all(&out).await?;
            stdout.flush().await?;
        }
    }

    shutdown.cancel();
    Ok(())
}
