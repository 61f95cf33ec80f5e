//! Error types for the huddle bus.

use thiserror::Error;

/// Result type alias using huddle's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for bus operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Thread not found
    #[error("Thread not found: {0}")]
    ThreadNotFound(uuid::Uuid),

    /// Agent not found
    #[error("Agent not found: {0}")]
    AgentNotFound(uuid::Uuid),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Token mismatch on an agent-attributed operation
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Illegal state transition or conflicting write
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Message rate limit exceeded for an author
    #[error("Rate limit exceeded: {limit} messages per {window_secs}s")]
    RateLimited {
        /// Messages allowed per window.
        limit: u32,
        /// Window length in seconds.
        window_secs: u64,
    },

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    /// File I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Machine-readable kind tag included in adapter error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Database(_) => "internal",
            Error::NotFound(_) | Error::ThreadNotFound(_) | Error::AgentNotFound(_) => "not_found",
            Error::InvalidInput(_) => "invalid_input",
            Error::Unauthorized(_) => "unauthorized",
            Error::Conflict(_) => "conflict",
            Error::RateLimited { .. } => "rate_limited",
            Error::Serialization(_) => "invalid_input",
            Error::Config(_) => "internal",
            Error::Internal(_) => "internal",
            Error::Io(_) => "internal",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
