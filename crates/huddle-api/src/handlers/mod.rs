//! REST handlers for the browser console and scripts.

pub mod agents;
pub mod events;
pub mod messages;
pub mod threads;
pub mod upload;

use axum::response::Json;

/// Liveness probe.
pub async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok", "service": "huddle"}))
}

/// Read-only view of the effective configuration.
pub async fn get_settings(
    axum::extract::State(state): axum::extract::State<crate::state::AppState>,
) -> Json<serde_json::Value> {
    let cfg = state.bus.config();
    Json(serde_json::json!({
        "host": cfg.host,
        "port": cfg.port,
        "heartbeat_timeout_secs": cfg.heartbeat_timeout_secs,
        "msg_wait_timeout_secs": cfg.msg_wait_timeout_secs,
        "thread_timeout_minutes": cfg.thread_timeout_minutes,
        "rate_limit_enabled": cfg.rate_limit_enabled,
        "rate_limit_per_minute": cfg.rate_limit_per_minute,
        "content_filter_enabled": cfg.content_filter_enabled,
        "preferred_language": cfg.preferred_language,
    }))
}

/// Parse a `0|1`/`true|false` query flag.
pub(crate) fn parse_flag(value: Option<&str>, default: bool) -> bool {
    match value {
        Some(v) => v == "1" || v.eq_ignore_ascii_case("true"),
        None => default,
    }
}
