//! Thread repository implementation.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

use huddle_core::{
    CreateThreadRequest, Error, Result, Thread, ThreadRepository, ThreadStatus,
};

use crate::{parse_ts, parse_ts_opt};

/// SQLite implementation of [`ThreadRepository`].
pub struct SqliteThreadRepository {
    pool: SqlitePool,
}

impl SqliteThreadRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

pub(crate) fn row_to_thread(row: &SqliteRow) -> Result<Thread> {
    let id: String = row.try_get("id")?;
    let status: String = row.try_get("status")?;
    let prior_status: Option<String> = row.try_get("prior_status")?;
    let metadata: Option<String> = row.try_get("metadata")?;
    Ok(Thread {
        id: Uuid::parse_str(&id).map_err(|e| Error::Internal(format!("bad thread id: {}", e)))?,
        topic: row.try_get("topic")?,
        status: ThreadStatus::parse(&status)?,
        prior_status: prior_status.as_deref().map(ThreadStatus::parse).transpose()?,
        system_prompt: row.try_get("system_prompt")?,
        summary: row.try_get("summary")?,
        created_at: parse_ts(row.try_get("created_at")?)?,
        closed_at: parse_ts_opt(row.try_get("closed_at")?)?,
        metadata: metadata
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| Error::Serialization(e.to_string()))?,
    })
}

#[async_trait]
impl ThreadRepository for SqliteThreadRepository {
    async fn insert(&self, req: CreateThreadRequest) -> Result<Thread> {
        if req.topic.trim().is_empty() {
            return Err(Error::InvalidInput("Thread topic must not be empty".into()));
        }
        let id = Uuid::now_v7();
        let now = Utc::now();
        let metadata = req
            .metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        sqlx::query(
            "INSERT INTO threads (id, topic, status, system_prompt, created_at, metadata)
             VALUES (?, ?, 'discuss', ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(&req.topic)
        .bind(&req.system_prompt)
        .bind(now.to_rfc3339())
        .bind(&metadata)
        .execute(&self.pool)
        .await?;

        tracing::info!(thread_id = %id, topic = %req.topic, "Thread created");
        Ok(Thread {
            id,
            topic: req.topic,
            status: ThreadStatus::Discuss,
            prior_status: None,
            system_prompt: req.system_prompt,
            summary: None,
            created_at: now,
            closed_at: None,
            metadata: req.metadata,
        })
    }

    async fn fetch(&self, id: Uuid) -> Result<Thread> {
        let row = sqlx::query("SELECT * FROM threads WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(Error::ThreadNotFound(id))?;
        row_to_thread(&row)
    }

    async fn list(
        &self,
        status: Option<ThreadStatus>,
        include_archived: bool,
    ) -> Result<Vec<Thread>> {
        let rows = match status {
            Some(status) => {
                sqlx::query("SELECT * FROM threads WHERE status = ? ORDER BY created_at DESC")
                    .bind(status.as_str())
                    .fetch_all(&self.pool)
                    .await?
            }
            None if include_archived => {
                sqlx::query("SELECT * FROM threads ORDER BY created_at DESC")
                    .fetch_all(&self.pool)
                    .await?
            }
            None => {
                sqlx::query(
                    "SELECT * FROM threads WHERE status != 'archived' ORDER BY created_at DESC",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.iter().map(row_to_thread).collect()
    }

    async fn set_status(&self, id: Uuid, status: ThreadStatus) -> Result<()> {
        if status == ThreadStatus::Archived {
            return Err(Error::InvalidInput(
                "Use archive/unarchive to change the archived flag".into(),
            ));
        }
        let current = self.fetch(id).await?;
        if current.status.is_terminal() {
            return Err(Error::Conflict(format!(
                "Thread is {}; its status cannot be changed via set-state",
                current.status
            )));
        }
        sqlx::query("UPDATE threads SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn close(&self, id: Uuid, summary: Option<&str>) -> Result<()> {
        let result = sqlx::query(
            "UPDATE threads
             SET status = 'closed', prior_status = NULL, closed_at = ?, summary = ?
             WHERE id = ?",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(summary)
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(Error::ThreadNotFound(id));
        }
        Ok(())
    }

    async fn archive(&self, id: Uuid) -> Result<()> {
        // No-op when already archived; prior status must survive.
        let result = sqlx::query(
            "UPDATE threads SET prior_status = status, status = 'archived'
             WHERE id = ? AND status != 'archived'",
        )
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            // Distinguish missing from already-archived
            self.fetch(id).await?;
        }
        Ok(())
    }

    async fn unarchive(&self, id: Uuid) -> Result<ThreadStatus> {
        let current = self.fetch(id).await?;
        if current.status != ThreadStatus::Archived {
            return Err(Error::Conflict("Thread is not archived".into()));
        }
        let restored = current.prior_status.unwrap_or(ThreadStatus::Discuss);
        sqlx::query("UPDATE threads SET status = ?, prior_status = NULL WHERE id = ?")
            .bind(restored.as_str())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(restored)
    }

    async fn delete(&self, id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM messages WHERE thread_id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM threads WHERE id = ?")
            .bind(id.to_string())
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::ThreadNotFound(id));
        }
        tx.commit().await?;
        tracing::info!(thread_id = %id, "Thread deleted");
        Ok(())
    }

    async fn timeout_sweep(&self, timeout_minutes: u32) -> Result<Vec<Uuid>> {
        if timeout_minutes == 0 {
            return Ok(vec![]);
        }
        let cutoff = Utc::now() - Duration::minutes(timeout_minutes as i64);
        let rows = sqlx::query(
            "SELECT t.id, t.created_at,
                    (SELECT MAX(m.created_at) FROM messages m WHERE m.thread_id = t.id) AS last_msg
             FROM threads t
             WHERE t.status NOT IN ('closed', 'archived')",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut closed = Vec::new();
        let now = Utc::now().to_rfc3339();
        for row in &rows {
            let id: String = row.try_get("id")?;
            let created_at = parse_ts(row.try_get("created_at")?)?;
            let last_msg = parse_ts_opt(row.try_get("last_msg")?)?;
            let last_active = last_msg.unwrap_or(created_at);
            if last_active < cutoff {
                sqlx::query("UPDATE threads SET status = 'closed', closed_at = ? WHERE id = ?")
                    .bind(&now)
                    .bind(&id)
                    .execute(&self.pool)
                    .await?;
                let id = Uuid::parse_str(&id)
                    .map_err(|e| Error::Internal(format!("bad thread id: {}", e)))?;
                tracing::info!(thread_id = %id, timeout_minutes, "Thread auto-closed");
                closed.push(id);
            }
        }
        Ok(closed)
    }
}
