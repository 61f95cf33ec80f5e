//! Thread REST handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use uuid::Uuid;

use huddle_core::{CreateThreadRequest, Thread, ThreadStatus};

use crate::error::ApiError;
use crate::handlers::parse_flag;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListThreadsQuery {
    status: Option<String>,
    include_archived: Option<String>,
}

pub async fn list_threads(
    State(state): State<AppState>,
    Query(query): Query<ListThreadsQuery>,
) -> Result<Json<Vec<Thread>>, ApiError> {
    let status = query
        .status
        .as_deref()
        .map(ThreadStatus::parse)
        .transpose()?;
    let include_archived = parse_flag(query.include_archived.as_deref(), false);
    let threads = state.bus.thread_list(status, include_archived).await?;
    Ok(Json(threads))
}

pub async fn create_thread(
    State(state): State<AppState>,
    Json(req): Json<CreateThreadRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let thread = state.bus.thread_create(req).await?;
    Ok((StatusCode::CREATED, Json(thread)))
}

pub async fn get_thread(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Thread>, ApiError> {
    Ok(Json(state.bus.thread_get(id).await?))
}

#[derive(Debug, Deserialize)]
pub struct StateChange {
    state: String,
}

pub async fn set_thread_state(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<StateChange>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let status = ThreadStatus::parse(&body.state)?;
    state.bus.thread_set_state(id, status).await?;
    Ok(Json(serde_json::json!({"ok": true})))
}

#[derive(Debug, Default, Deserialize)]
pub struct CloseBody {
    #[serde(default)]
    summary: Option<String>,
}

pub async fn close_thread(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: Option<Json<CloseBody>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let summary = body.and_then(|Json(b)| b.summary);
    state.bus.thread_close(id, summary.as_deref()).await?;
    Ok(Json(serde_json::json!({"ok": true})))
}

pub async fn archive_thread(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.bus.thread_archive(id).await?;
    Ok(Json(serde_json::json!({"ok": true})))
}

pub async fn unarchive_thread(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let restored = state.bus.thread_unarchive(id).await?;
    Ok(Json(serde_json::json!({"ok": true, "status": restored})))
}

pub async fn delete_thread(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.bus.thread_delete(id).await?;
    Ok(Json(serde_json::json!({"ok": true})))
}
