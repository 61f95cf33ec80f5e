//! Message REST handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use huddle_core::{defaults, ImageRef, Message, PostMessageRequest, Role};

use crate::error::ApiError;
use crate::handlers::parse_flag;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListMessagesQuery {
    #[serde(default)]
    after_seq: i64,
    limit: Option<i64>,
    include_system_prompt: Option<String>,
}

pub async fn list_messages(
    State(state): State<AppState>,
    Path(thread_id): Path<Uuid>,
    Query(query): Query<ListMessagesQuery>,
) -> Result<Json<Vec<Message>>, ApiError> {
    let msgs = state
        .bus
        .msg_list(
            thread_id,
            query.after_seq,
            query.limit.unwrap_or(defaults::MSG_LIST_LIMIT),
            parse_flag(query.include_system_prompt.as_deref(), false),
        )
        .await?;
    Ok(Json(msgs))
}

fn default_author() -> String {
    "human".to_string()
}

#[derive(Debug, Deserialize)]
pub struct MessageCreate {
    #[serde(default = "default_author")]
    author: String,
    #[serde(default)]
    role: Option<Role>,
    content: String,
    #[serde(default)]
    mentions: Vec<String>,
    #[serde(default)]
    metadata: Option<JsonValue>,
    #[serde(default)]
    images: Vec<ImageRef>,
}

pub async fn post_message(
    State(state): State<AppState>,
    Path(thread_id): Path<Uuid>,
    Json(body): Json<MessageCreate>,
) -> Result<impl IntoResponse, ApiError> {
    // Image attachments ride in metadata as {url, name} records.
    let metadata = if body.images.is_empty() {
        body.metadata
    } else {
        let mut meta = match body.metadata {
            Some(JsonValue::Object(map)) => map,
            Some(other) => {
                let mut map = serde_json::Map::new();
                map.insert("metadata".to_string(), other);
                map
            }
            None => serde_json::Map::new(),
        };
        meta.insert("images".to_string(), serde_json::to_value(&body.images)?);
        Some(JsonValue::Object(meta))
    };

    let msg = state
        .bus
        .msg_post(PostMessageRequest {
            thread_id,
            author: body.author,
            role: body.role.unwrap_or(Role::User),
            content: body.content,
            mentions: body.mentions,
            metadata,
        })
        .await?;
    Ok((StatusCode::CREATED, Json(msg)))
}
