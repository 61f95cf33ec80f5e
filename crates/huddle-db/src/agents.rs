//! Agent registry repository implementation.

use async_trait::async_trait;
use chrono::Utc;
use rand::Rng;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::Row;
use uuid::Uuid;

use huddle_core::{
    ActivityKind, Agent, AgentRepository, AliasSource, Error, RegisterAgentRequest, Result,
};

use crate::{parse_ts, parse_ts_opt};

/// Length of generated agent tokens.
const TOKEN_LENGTH: usize = 64;

/// SQLite implementation of [`AgentRepository`].
pub struct SqliteAgentRepository {
    pool: SqlitePool,
}

impl SqliteAgentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Generate a cryptographically secure random token.
    fn generate_token() -> String {
        const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
        let mut rng = rand::thread_rng();
        (0..TOKEN_LENGTH)
            .map(|_| {
                let idx = rng.gen_range(0..CHARSET.len());
                CHARSET[idx] as char
            })
            .collect()
    }
}

fn row_to_agent(row: &SqliteRow) -> Result<Agent> {
    let id: String = row.try_get("id")?;
    let alias_source: String = row.try_get("alias_source")?;
    let capabilities: Option<String> = row.try_get("capabilities")?;
    let last_activity: Option<String> = row.try_get("last_activity")?;
    Ok(Agent {
        id: Uuid::parse_str(&id).map_err(|e| Error::Internal(format!("bad agent id: {}", e)))?,
        name: row.try_get("name")?,
        display_name: row.try_get("display_name")?,
        alias_source: if alias_source == "user" {
            AliasSource::User
        } else {
            AliasSource::Auto
        },
        ide: row.try_get("ide")?,
        model: row.try_get("model")?,
        description: row.try_get("description")?,
        capabilities: capabilities
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|e| Error::Serialization(e.to_string()))?
            .unwrap_or_default(),
        token: row.try_get("token")?,
        registered_at: parse_ts(row.try_get("registered_at")?)?,
        last_heartbeat: parse_ts(row.try_get("last_heartbeat")?)?,
        last_activity: last_activity.as_deref().and_then(ActivityKind::parse),
        last_activity_time: parse_ts_opt(row.try_get("last_activity_time")?)?,
    })
}

#[async_trait]
impl AgentRepository for SqliteAgentRepository {
    async fn register(&self, req: RegisterAgentRequest) -> Result<Agent> {
        let ide = {
            let t = req.ide.trim();
            if t.is_empty() { "Unknown IDE" } else { t }.to_string()
        };
        let model = {
            let t = req.model.trim();
            if t.is_empty() { "Unknown Model" } else { t }.to_string()
        };
        let base_name = format!("{} ({})", ide, model);

        // Identical IDE+model pairs co-exist under numeric suffixes:
        // "Cursor (GPT-4)", "Cursor (GPT-4) 2", ...
        let existing: Vec<String> =
            sqlx::query_scalar("SELECT name FROM agents WHERE name = ? OR name LIKE ?")
                .bind(&base_name)
                .bind(format!("{} %", base_name))
                .fetch_all(&self.pool)
                .await?;
        let name = if !existing.iter().any(|n| n == &base_name) {
            base_name
        } else {
            let mut n = 2;
            loop {
                let candidate = format!("{} {}", base_name, n);
                if !existing.iter().any(|e| e == &candidate) {
                    break candidate;
                }
                n += 1;
            }
        };

        let (display_name, alias_source) = match &req.display_name {
            Some(alias) if !alias.trim().is_empty() => {
                (alias.trim().to_string(), AliasSource::User)
            }
            _ => (name.clone(), AliasSource::Auto),
        };

        let id = Uuid::new_v4();
        let token = Self::generate_token();
        let now = Utc::now();
        let capabilities = if req.capabilities.is_empty() {
            None
        } else {
            Some(serde_json::to_string(&req.capabilities)?)
        };

        sqlx::query(
            "INSERT INTO agents
                 (id, name, display_name, alias_source, ide, model, description, capabilities,
                  token, registered_at, last_heartbeat, last_activity, last_activity_time)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(id.to_string())
        .bind(&name)
        .bind(&display_name)
        .bind(alias_source.as_str())
        .bind(&ide)
        .bind(&model)
        .bind(&req.description)
        .bind(&capabilities)
        .bind(&token)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .bind(ActivityKind::Register.as_str())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        tracing::info!(agent_id = %id, name = %name, "Agent registered");
        Ok(Agent {
            id,
            name,
            display_name,
            alias_source,
            ide,
            model,
            description: req.description,
            capabilities: req.capabilities,
            token,
            registered_at: now,
            last_heartbeat: now,
            last_activity: Some(ActivityKind::Register),
            last_activity_time: Some(now),
        })
    }

    async fn fetch(&self, id: Uuid) -> Result<Agent> {
        let row = sqlx::query("SELECT * FROM agents WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .ok_or(Error::AgentNotFound(id))?;
        row_to_agent(&row)
    }

    async fn verify(&self, id: Uuid, token: &str) -> Result<Agent> {
        let agent = sqlx::query("SELECT * FROM agents WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?
            .map(|row| row_to_agent(&row))
            .transpose()?;
        match agent {
            Some(agent) if agent.token == token => Ok(agent),
            // A wrong token and an unknown agent are indistinguishable to the
            // caller; neither leaks registry contents.
            _ => Err(Error::Unauthorized("Invalid agent_id/token".into())),
        }
    }

    async fn heartbeat(&self, id: Uuid, token: &str) -> Result<()> {
        self.verify(id, token).await?;
        sqlx::query("UPDATE agents SET last_heartbeat = ? WHERE id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn resume(&self, id: Uuid, token: &str) -> Result<Agent> {
        self.verify(id, token).await?;
        let now = Utc::now();
        sqlx::query(
            "UPDATE agents
             SET last_heartbeat = ?, last_activity = ?, last_activity_time = ?
             WHERE id = ?",
        )
        .bind(now.to_rfc3339())
        .bind(ActivityKind::Resume.as_str())
        .bind(now.to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        self.fetch(id).await
    }

    async fn unregister(&self, id: Uuid, token: &str) -> Result<()> {
        self.verify(id, token).await?;
        sqlx::query("DELETE FROM agents WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        tracing::info!(agent_id = %id, "Agent unregistered");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Agent>> {
        let rows = sqlx::query("SELECT * FROM agents ORDER BY registered_at")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_agent).collect()
    }

    async fn touch_activity(&self, id: Uuid, kind: ActivityKind) -> Result<()> {
        let result = sqlx::query(
            "UPDATE agents SET last_activity = ?, last_activity_time = ? WHERE id = ?",
        )
        .bind(kind.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(id.to_string())
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(Error::AgentNotFound(id));
        }
        Ok(())
    }
}
