//! Database connection pool management.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use huddle_core::{Error, Result};

/// Default maximum number of connections in the pool. Reads are concurrent;
/// writes serialize on SQLite's single-writer lock.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 8;

/// Default busy timeout in seconds.
pub const DEFAULT_BUSY_TIMEOUT_SECS: u64 = 5;

/// Pool configuration options.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Maximum number of connections in the pool.
    pub max_connections: u32,
    /// How long a writer waits on the database lock before failing.
    pub busy_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: DEFAULT_MAX_CONNECTIONS,
            busy_timeout: Duration::from_secs(DEFAULT_BUSY_TIMEOUT_SECS),
        }
    }
}

impl PoolConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_connections(mut self, n: u32) -> Self {
        self.max_connections = n;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }
}

/// Create a connection pool for the given SQLite URL or file path.
///
/// WAL journal mode allows concurrent reads while a write is in flight.
/// In-memory databases are pinned to a single connection so every handle
/// sees the same data.
pub async fn create_pool(url: &str) -> Result<SqlitePool> {
    create_pool_with_config(url, PoolConfig::default()).await
}

/// Create a pool with custom configuration.
pub async fn create_pool_with_config(url: &str, config: PoolConfig) -> Result<SqlitePool> {
    let options = if url.starts_with("sqlite:") {
        SqliteConnectOptions::from_str(url).map_err(Error::Database)?
    } else {
        if let Some(parent) = Path::new(url).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        SqliteConnectOptions::new().filename(url)
    };
    let options = options
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(config.busy_timeout);

    let in_memory = url.contains(":memory:");
    let max_connections = if in_memory {
        1
    } else {
        config.max_connections
    };

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await?;

    debug!(max_connections, in_memory, "SQLite pool created");
    info!(url, "Database pool ready");
    Ok(pool)
}
