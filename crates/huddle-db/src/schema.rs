//! Schema initialization and forward migrations.
//!
//! `init_schema` is idempotent: tables and indexes are created only when
//! absent, and column additions for databases created by older builds are
//! applied as `ALTER TABLE` statements whose duplicate-column failures are
//! ignored.

use sqlx::sqlite::SqlitePool;
use tracing::{debug, info};

use huddle_core::Result;

const SCHEMA: &str = r#"
-- ----------------------------------------------------------------
-- Thread: a conversation or task context
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS threads (
    id            TEXT PRIMARY KEY,
    topic         TEXT NOT NULL,
    status        TEXT NOT NULL DEFAULT 'discuss',
    prior_status  TEXT,
    system_prompt TEXT,
    summary       TEXT,
    created_at    TEXT NOT NULL,
    closed_at     TEXT,
    metadata      TEXT
);

-- ----------------------------------------------------------------
-- Message: a single turn within a thread.
-- The bus-wide `seq` is a globally monotonic integer; the unique
-- indexes enforce both per-thread ordering and global monotonicity.
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    id          TEXT PRIMARY KEY,
    thread_id   TEXT NOT NULL REFERENCES threads(id) ON DELETE CASCADE,
    seq         INTEGER NOT NULL,
    author_id   TEXT,
    author_name TEXT NOT NULL,
    role        TEXT NOT NULL DEFAULT 'user',
    content     TEXT NOT NULL,
    mentions    TEXT,
    metadata    TEXT,
    created_at  TEXT NOT NULL
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_messages_thread_seq ON messages(thread_id, seq);
CREATE UNIQUE INDEX IF NOT EXISTS idx_messages_seq ON messages(seq);

-- ----------------------------------------------------------------
-- Sequence counter: single-row table bumped under the write
-- transaction so seq assignment and row insert commit together.
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS seq_counter (
    id  INTEGER PRIMARY KEY CHECK (id = 1),
    val INTEGER NOT NULL DEFAULT 0
);
INSERT OR IGNORE INTO seq_counter (id, val) VALUES (1, 0);

-- ----------------------------------------------------------------
-- Agent registry: connected agents and their heartbeats
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS agents (
    id                 TEXT PRIMARY KEY,
    name               TEXT NOT NULL,
    display_name       TEXT NOT NULL DEFAULT '',
    alias_source       TEXT NOT NULL DEFAULT 'auto',
    ide                TEXT NOT NULL DEFAULT '',
    model              TEXT NOT NULL DEFAULT '',
    description        TEXT NOT NULL DEFAULT '',
    capabilities       TEXT,
    token              TEXT NOT NULL,
    registered_at      TEXT NOT NULL,
    last_heartbeat     TEXT NOT NULL,
    last_activity      TEXT,
    last_activity_time TEXT
);
"#;

/// Columns added after the first release; applied to pre-existing databases.
const THREAD_MIGRATIONS: &[(&str, &str)] = &[
    ("prior_status", "TEXT"),
    ("system_prompt", "TEXT"),
    ("metadata", "TEXT"),
];

const AGENT_MIGRATIONS: &[(&str, &str)] = &[
    ("display_name", "TEXT NOT NULL DEFAULT ''"),
    ("alias_source", "TEXT NOT NULL DEFAULT 'auto'"),
    ("ide", "TEXT NOT NULL DEFAULT ''"),
    ("model", "TEXT NOT NULL DEFAULT ''"),
    ("last_activity", "TEXT"),
    ("last_activity_time", "TEXT"),
];

/// Create all tables if absent and bring older databases up to date.
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::raw_sql(SCHEMA).execute(pool).await?;

    for (col, typedef) in THREAD_MIGRATIONS {
        add_column(pool, "threads", col, typedef).await;
    }
    for (col, typedef) in AGENT_MIGRATIONS {
        add_column(pool, "agents", col, typedef).await;
    }

    reconcile_archived_flag(pool).await?;
    recover_seq_counter(pool).await?;

    info!("Schema initialized");
    Ok(())
}

async fn add_column(pool: &SqlitePool, table: &str, col: &str, typedef: &str) {
    let stmt = format!("ALTER TABLE {} ADD COLUMN {} {}", table, col, typedef);
    match sqlx::query(&stmt).execute(pool).await {
        Ok(_) => info!(table, col, "Migration: added column"),
        // Duplicate column: already migrated
        Err(_) => debug!(table, col, "column present"),
    }
}

/// Databases that predate `archived` as a status value carry an
/// `is_archived` column instead. Fold the flag into the status union once,
/// preserving the visible status as the prior status.
async fn reconcile_archived_flag(pool: &SqlitePool) -> Result<()> {
    let has_flag = sqlx::query("SELECT is_archived FROM threads LIMIT 1")
        .fetch_optional(pool)
        .await
        .is_ok();
    if !has_flag {
        return Ok(());
    }
    let reconciled = sqlx::query(
        "UPDATE threads
         SET prior_status = status, status = 'archived', is_archived = 0
         WHERE is_archived = 1 AND status != 'archived'",
    )
    .execute(pool)
    .await?
    .rows_affected();
    if reconciled > 0 {
        info!(reconciled, "Migration: folded is_archived into status");
    }
    Ok(())
}

/// The sequence counter must never trail the log (e.g. after a counter-less
/// restore); seq values are handed out only after the row persists.
async fn recover_seq_counter(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "UPDATE seq_counter
         SET val = MAX(val, (SELECT COALESCE(MAX(seq), 0) FROM messages))
         WHERE id = 1",
    )
    .execute(pool)
    .await?;
    Ok(())
}
