//! # huddle-db
//!
//! SQLite database layer for the huddle bus.
//!
//! This crate provides:
//! - Connection pool management (WAL mode, single-writer discipline)
//! - Repository implementations for threads, messages, and agents
//! - The bus-wide message sequencer, run under the write transaction
//! - Idempotent schema initialization and forward migrations
//!
//! ## Example
//!
//! ```rust,ignore
//! use huddle_db::Database;
//! use huddle_core::{CreateThreadRequest, ThreadRepository};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::connect("data/huddle.db").await?;
//!     let thread = db.threads.insert(CreateThreadRequest {
//!         topic: "Design review".to_string(),
//!         ..Default::default()
//!     }).await?;
//!     println!("Created thread: {}", thread.id);
//!     Ok(())
//! }
//! ```

pub mod agents;
pub mod messages;
pub mod pool;
pub mod schema;
pub mod threads;

use chrono::{DateTime, Utc};

// Re-export core types
pub use huddle_core::{Error, Result};

pub use agents::SqliteAgentRepository;
pub use messages::SqliteMessageRepository;
pub use pool::{create_pool, create_pool_with_config, PoolConfig};
pub use schema::init_schema;
pub use threads::SqliteThreadRepository;

/// Parse an RFC 3339 timestamp column.
pub(crate) fn parse_ts(s: String) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("bad timestamp '{}': {}", s, e)))
}

/// Parse an optional RFC 3339 timestamp column.
pub(crate) fn parse_ts_opt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
    s.map(parse_ts).transpose()
}

/// Combined database context with all repositories.
pub struct Database {
    /// The underlying connection pool.
    pub pool: sqlx::SqlitePool,
    /// Thread repository.
    pub threads: SqliteThreadRepository,
    /// Message repository and sequencer.
    pub messages: SqliteMessageRepository,
    /// Agent registry repository.
    pub agents: SqliteAgentRepository,
}

impl Database {
    /// Create a new Database instance from a connection pool.
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self {
            threads: SqliteThreadRepository::new(pool.clone()),
            messages: SqliteMessageRepository::new(pool.clone()),
            agents: SqliteAgentRepository::new(pool.clone()),
            pool,
        }
    }

    /// Connect to the given SQLite file (or `sqlite:` URL) and initialize
    /// the schema.
    pub async fn connect(url: &str) -> Result<Self> {
        let pool = create_pool(url).await?;
        init_schema(&pool).await?;
        Ok(Self::new(pool))
    }

    /// Connect with custom pool configuration.
    pub async fn connect_with_config(url: &str, config: PoolConfig) -> Result<Self> {
        let pool = create_pool_with_config(url, config).await?;
        init_schema(&pool).await?;
        Ok(Self::new(pool))
    }

    /// In-memory database for tests.
    pub async fn connect_memory() -> Result<Self> {
        Self::connect("sqlite::memory:").await
    }

    /// Get the underlying connection pool.
    pub fn pool(&self) -> &sqlx::SqlitePool {
        &self.pool
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self::new(self.pool.clone())
    }
}
