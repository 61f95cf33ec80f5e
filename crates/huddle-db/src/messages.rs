//! Message repository and the bus-wide sequencer.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

use huddle_core::{Error, Message, MessageRepository, PostMessageRequest, Result, Role};

use crate::parse_ts;

/// SQLite implementation of [`MessageRepository`].
///
/// Sequence assignment and the row insert run under one transaction:
/// `seq_counter` is bumped with `UPDATE … RETURNING`, so a value is never
/// handed out without the row that consumed it being persisted.
pub struct SqliteMessageRepository {
    pool: SqlitePool,
}

impl SqliteMessageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn row_to_message(row: &SqliteRow) -> Result<Message> {
    let id: String = row.try_get("id")?;
    let thread_id: String = row.try_get("thread_id")?;
    let role: String = row.try_get("role")?;
    let mentions: Option<String> = row.try_get("mentions")?;
    let metadata: Option<String> = row.try_get("metadata")?;
    Ok(Message {
        id: Uuid::parse_str(&id).map_err(|e| Error::Internal(format!("bad message id: {}", e)))?,
        thread_id: Uuid::parse_str(&thread_id)
            .map_err(|e| Error::Internal(format!("bad thread id: {}", e)))?,
        seq: row.try_get("seq")?,
        author_id: row.try_get("author_id")?,
        author_name: row.try_get("author_name")?,
        role: Role::parse(&role)?,
        content: row.try_get("content")?,
        mentions: mentions
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| Error::Serialization(e.to_string()))?
            .unwrap_or_default(),
        metadata: metadata
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| Error::Serialization(e.to_string()))?,
        created_at: parse_ts(row.try_get("created_at")?)?,
    })
}

#[async_trait]
impl MessageRepository for SqliteMessageRepository {
    async fn insert(&self, req: PostMessageRequest) -> Result<Message> {
        let mut tx = self.pool.begin().await?;

        let thread_exists: Option<String> =
            sqlx::query_scalar("SELECT id FROM threads WHERE id = ?")
                .bind(req.thread_id.to_string())
                .fetch_optional(&mut *tx)
                .await?;
        if thread_exists.is_none() {
            return Err(Error::ThreadNotFound(req.thread_id));
        }

        // Resolve the author: an agent id becomes (id, display name); any
        // other handle ("human", "system", a free label) is stored verbatim.
        let (author_id, author_name) = match Uuid::parse_str(&req.author) {
            Ok(agent_id) => {
                let name: Option<String> =
                    sqlx::query_scalar("SELECT display_name FROM agents WHERE id = ?")
                        .bind(agent_id.to_string())
                        .fetch_optional(&mut *tx)
                        .await?;
                match name {
                    Some(name) => (Some(agent_id.to_string()), name),
                    None => (Some(req.author.clone()), req.author.clone()),
                }
            }
            Err(_) => (Some(req.author.clone()), req.author.clone()),
        };

        let seq: i64 =
            sqlx::query_scalar("UPDATE seq_counter SET val = val + 1 WHERE id = 1 RETURNING val")
                .fetch_one(&mut *tx)
                .await?;

        let id = Uuid::now_v7();
        let now = Utc::now();
        let mentions = if req.mentions.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&req.mentions)?)
        };
        let metadata = req
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            "INSERT INTO messages
                 (id, thread_id, seq, author_id, author_name, role, content, mentions, metadata, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(req.thread_id.to_string())
        .bind(seq)
        .bind(&author_id)
        .bind(&author_name)
        .bind(req.role.as_str())
        .bind(&req.content)
        .bind(&mentions)
        .bind(&metadata)
        .bind(now.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        tracing::debug!(seq, author = %author_name, thread_id = %req.thread_id, "Message posted");
        Ok(Message {
            id,
            thread_id: req.thread_id,
            seq,
            author_id,
            author_name,
            role: req.role,
            content: req.content,
            mentions: req.mentions,
            metadata: req.metadata,
            created_at: now,
        })
    }

    async fn list(
        &self,
        thread_id: Uuid,
        after_seq: i64,
        limit: i64,
        include_system_prompt: bool,
    ) -> Result<Vec<Message>> {
        let rows = if include_system_prompt {
            sqlx::query(
                "SELECT * FROM messages WHERE thread_id = ? AND seq > ?
                 ORDER BY seq ASC LIMIT ?",
            )
            .bind(thread_id.to_string())
            .bind(after_seq)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(
                "SELECT * FROM messages WHERE thread_id = ? AND seq > ? AND role != 'system'
                 ORDER BY seq ASC LIMIT ?",
            )
            .bind(thread_id.to_string())
            .bind(after_seq)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
        };
        rows.iter().map(row_to_message).collect()
    }

    async fn current_seq(&self) -> Result<i64> {
        let seq: i64 = sqlx::query_scalar("SELECT val FROM seq_counter WHERE id = 1")
            .fetch_one(&self.pool)
            .await?;
        Ok(seq)
    }
}
