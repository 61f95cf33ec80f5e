//! # huddle-api
//!
//! HTTP adapters for the huddle bus: the REST + SSE console surface and the
//! MCP tool/resource/prompt surface (SSE transport in-process, stdio as a
//! sibling binary). Everything routes into one `ChatBus`.

pub mod error;
pub mod handlers;
pub mod mcp;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::services::ServeDir;

pub use error::ApiError;
pub use state::AppState;

/// Build the full route table over the shared state.
///
/// Middleware (tracing, CORS, request ids, body limits) is layered on by
/// the server binary; tests drive this router directly.
pub fn router(state: AppState) -> Router {
    let upload_dir = state.bus.config().upload_dir.clone();
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Threads
        .route(
            "/api/threads",
            get(handlers::threads::list_threads).post(handlers::threads::create_thread),
        )
        .route(
            "/api/threads/:id",
            get(handlers::threads::get_thread).delete(handlers::threads::delete_thread),
        )
        .route(
            "/api/threads/:id/messages",
            get(handlers::messages::list_messages).post(handlers::messages::post_message),
        )
        .route("/api/threads/:id/state", post(handlers::threads::set_thread_state))
        .route("/api/threads/:id/close", post(handlers::threads::close_thread))
        .route("/api/threads/:id/archive", post(handlers::threads::archive_thread))
        .route(
            "/api/threads/:id/unarchive",
            post(handlers::threads::unarchive_thread),
        )
        // Agents
        .route("/api/agents", get(handlers::agents::list_agents))
        .route("/api/agents/available", get(handlers::agents::available_agents))
        .route("/api/agents/register", post(handlers::agents::register_agent))
        .route("/api/agents/heartbeat", post(handlers::agents::agent_heartbeat))
        .route("/api/agents/resume", post(handlers::agents::agent_resume))
        .route("/api/agents/unregister", post(handlers::agents::agent_unregister))
        .route("/api/agents/invite", post(handlers::agents::invite_agent))
        // Settings
        .route("/api/settings", get(handlers::get_settings))
        // Uploads
        .route("/api/upload/image", post(handlers::upload::upload_image))
        .nest_service("/uploads", ServeDir::new(upload_dir))
        // Console SSE
        .route("/events", get(handlers::events::sse_events))
        // MCP over SSE
        .route("/mcp/sse", get(mcp::sse::mcp_sse))
        .route("/mcp/messages/:session_id", post(mcp::sse::mcp_post))
        .with_state(state)
}
