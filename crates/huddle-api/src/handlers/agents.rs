//! Agent REST handlers.

use axum::extract::State;
use axum::response::Json;
use serde::Deserialize;
use uuid::Uuid;

use huddle_core::{AgentSummary, RegisterAgentRequest};

use crate::error::ApiError;
use crate::state::AppState;

pub async fn list_agents(
    State(state): State<AppState>,
) -> Result<Json<Vec<AgentSummary>>, ApiError> {
    Ok(Json(state.bus.agent_list().await?))
}

pub async fn register_agent(
    State(state): State<AppState>,
    Json(req): Json<RegisterAgentRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let agent = state.bus.agent_register(req).await?;
    Ok(Json(serde_json::json!({
        "agent_id": agent.id,
        "name": agent.name,
        "display_name": agent.display_name,
        "alias_source": agent.alias_source,
        "token": agent.token,
    })))
}

#[derive(Debug, Deserialize)]
pub struct AgentToken {
    agent_id: Uuid,
    token: String,
}

pub async fn agent_heartbeat(
    State(state): State<AppState>,
    Json(body): Json<AgentToken>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.bus.agent_heartbeat(body.agent_id, &body.token).await?;
    Ok(Json(serde_json::json!({"ok": true})))
}

pub async fn agent_resume(
    State(state): State<AppState>,
    Json(body): Json<AgentToken>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let agent = state.bus.agent_resume(body.agent_id, &body.token).await?;
    let timeout = state.bus.config().heartbeat_timeout_secs;
    let summary = agent.summary(timeout);
    Ok(Json(serde_json::json!({
        "ok": true,
        "agent_id": agent.id,
        "name": agent.name,
        "display_name": agent.display_name,
        "alias_source": agent.alias_source,
        "is_online": summary.is_online,
        "last_heartbeat": agent.last_heartbeat,
    })))
}

pub async fn agent_unregister(
    State(state): State<AppState>,
    Json(body): Json<AgentToken>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.bus.agent_unregister(body.agent_id, &body.token).await?;
    Ok(Json(serde_json::json!({"ok": true})))
}

#[derive(Debug, Deserialize)]
pub struct InviteBody {
    agent_name: String,
    thread_id: Uuid,
}

pub async fn invite_agent(
    State(state): State<AppState>,
    Json(body): Json<InviteBody>,
) -> Result<Json<huddle_bus::InviteOutcome>, ApiError> {
    let outcome = state
        .bus
        .agent_invite(&body.agent_name, body.thread_id)
        .await?;
    Ok(Json(outcome))
}

/// Invitable catalog entries for the console. The invoke command itself is
/// operator configuration and stays server-side.
pub async fn available_agents(State(state): State<AppState>) -> Json<serde_json::Value> {
    let entries: Vec<_> = state
        .bus
        .invitable_agents()
        .into_iter()
        .map(|e| {
            serde_json::json!({
                "name": e.name,
                "display_name": e.display_name,
                "description": e.description,
            })
        })
        .collect();
    Json(serde_json::json!({"agents": entries}))
}
