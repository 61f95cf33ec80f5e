//! Image upload handler.
//!
//! Uploads are stored as opaque files under the configured directory and
//! served back via `/uploads/...`. There is no automatic cleanup; retention
//! is the operator's call.

use axum::extract::{Multipart, State};
use axum::response::Json;
use uuid::Uuid;

use huddle_core::Error;

use crate::error::ApiError;
use crate::state::AppState;

pub async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    let cfg = state.bus.config();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::InvalidInput(format!("Malformed multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field
            .file_name()
            .map(String::from)
            .ok_or_else(|| Error::InvalidInput("No file provided".into()))?;
        let content_type = field.content_type().unwrap_or_default().to_string();
        if !content_type.starts_with("image/") {
            return Err(Error::InvalidInput("File must be an image".into()).into());
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| Error::InvalidInput(format!("Upload read failed: {}", e)))?;
        if data.is_empty() {
            return Err(Error::InvalidInput("Empty upload".into()).into());
        }
        if data.len() > cfg.upload_max_bytes {
            return Err(Error::InvalidInput(format!(
                "Upload exceeds {} bytes",
                cfg.upload_max_bytes
            ))
            .into());
        }

        let ext = std::path::Path::new(&filename)
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("png");
        let unique = format!("{}.{}", Uuid::new_v4(), ext);

        tokio::fs::create_dir_all(&cfg.upload_dir).await.map_err(Error::Io)?;
        let path = cfg.upload_dir.join(&unique);
        tokio::fs::write(&path, &data).await.map_err(Error::Io)?;

        tracing::info!(file = %path.display(), bytes = data.len(), "image uploaded");
        return Ok(Json(serde_json::json!({
            "url": format!("/uploads/{}", unique),
            "name": filename,
        })));
    }

    Err(Error::InvalidInput("No file provided".into()).into())
}
