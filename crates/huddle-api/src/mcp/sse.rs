//! MCP SSE transport.
//!
//! Clients open `GET /mcp/sse` and receive an `endpoint` event naming the
//! per-session POST URL; JSON-RPC requests are POSTed there and responses
//! flow back down the SSE stream as `message` events. Each session carries
//! its own language preference (`?lang=`) and a cancellation token that
//! resolves in-flight `msg_wait` calls when the client disconnects.

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use huddle_core::defaults;

use super::protocol::JsonRpcRequest;
use super::server::McpServer;
use crate::state::AppState;

struct McpSession {
    outbound: mpsc::Sender<Value>,
    lang: Option<String>,
    cancel: CancellationToken,
}

/// Live MCP-over-SSE sessions.
#[derive(Default)]
pub struct McpSessionRegistry {
    sessions: Mutex<HashMap<Uuid, Arc<McpSession>>>,
}

impl McpSessionRegistry {
    fn insert(&self, id: Uuid, session: Arc<McpSession>) {
        self.sessions
            .lock()
            .expect("session map poisoned")
            .insert(id, session);
    }

    fn get(&self, id: Uuid) -> Option<Arc<McpSession>> {
        self.sessions
            .lock()
            .expect("session map poisoned")
            .get(&id)
            .cloned()
    }

    fn remove(&self, id: Uuid) {
        if let Some(session) = self
            .sessions
            .lock()
            .expect("session map poisoned")
            .remove(&id)
        {
            session.cancel.cancel();
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().expect("session map poisoned").len()
    }
}

/// Removes the session when the SSE stream is dropped.
struct SessionGuard {
    registry: Arc<McpSessionRegistry>,
    id: Uuid,
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        tracing::debug!(session_id = %self.id, "MCP SSE session closed");
        self.registry.remove(self.id);
    }
}

#[derive(Debug, Deserialize)]
pub struct SseQuery {
    lang: Option<String>,
}

/// `GET /mcp/sse` — open an MCP session stream.
pub async fn mcp_sse(
    State(state): State<AppState>,
    Query(query): Query<SseQuery>,
) -> Sse<impl futures::Stream<Item = Result<Event, Infallible>>> {
    let session_id = Uuid::new_v4();
    let (tx, rx) = mpsc::channel::<Value>(64);
    let session = Arc::new(McpSession {
        outbound: tx,
        lang: query.lang,
        cancel: CancellationToken::new(),
    });
    state.mcp_sessions.insert(session_id, session);
    tracing::debug!(session_id = %session_id, "MCP SSE session opened");

    let guard = SessionGuard {
        registry: state.mcp_sessions.clone(),
        id: session_id,
    };

    use tokio_stream::StreamExt as _;
    let endpoint = futures::stream::once(async move {
        Ok(Event::default()
            .event("endpoint")
            .data(format!("/mcp/messages/{}", session_id)))
    });
    let messages = tokio_stream::wrappers::ReceiverStream::new(rx).map(move |value| {
        // Owned by the closure so the registry entry lives exactly as long
        // as the stream.
        let _ = &guard;
        Ok(Event::default().event("message").data(value.to_string()))
    });

    Sse::new(endpoint.chain(messages)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(defaults::SSE_KEEPALIVE_SECS))
            .text("keepalive"),
    )
}

/// `POST /mcp/messages/{session_id}` — submit a JSON-RPC message.
///
/// The transport-level response is `202 Accepted`; the JSON-RPC response is
/// delivered on the session's SSE stream. Long-running calls (`msg_wait`)
/// are dispatched off this request so the client can keep submitting.
pub async fn mcp_post(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    Json(request): Json<JsonRpcRequest>,
) -> impl IntoResponse {
    let Some(session) = state.mcp_sessions.get(session_id) else {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"error": "Unknown MCP session", "kind": "not_found"})),
        )
            .into_response();
    };

    let server = McpServer::new(state.bus.clone(), session.lang.clone());
    let registry = state.mcp_sessions.clone();
    tokio::spawn(async move {
        let cancel = session.cancel.clone();
        if let Some(response) = server.handle(request, &cancel).await {
            if session.outbound.send(response).await.is_err() {
                registry.remove(session_id);
            }
        }
    });

    StatusCode::ACCEPTED.into_response()
}
