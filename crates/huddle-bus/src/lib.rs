//! # huddle-bus
//!
//! The core of the huddle agent bus: the `ChatBus` façade over the store,
//! the long-poll wait coordinator, the presence sweeper, and the invitation
//! executor.
//!
//! Adapters (REST, MCP over SSE, MCP over stdio) receive an `Arc<ChatBus>`
//! and nothing else.
//!
//! ## Example
//!
//! ```ignore
//! use huddle_bus::{BusConfig, ChatBus, PresenceSweeper};
//! use huddle_db::Database;
//! use tokio_util::sync::CancellationToken;
//!
//! let config = BusConfig::from_env();
//! let db = Database::connect(&config.db_path).await?;
//! let shutdown = CancellationToken::new();
//! let bus = ChatBus::new(db.clone(), config, shutdown.clone())?;
//!
//! let sweeper = PresenceSweeper::new(
//!     db,
//!     bus.events(),
//!     bus.config().heartbeat_timeout_secs,
//!     bus.config().thread_timeout_minutes,
//!     shutdown.clone(),
//! );
//! let handle = sweeper.spawn();
//!
//! // ... serve adapters ...
//! shutdown.cancel();
//! handle.await?;
//! ```

pub mod bus;
pub mod config;
pub mod invite;
pub mod presence;
pub mod wait;

pub use bus::ChatBus;
pub use config::BusConfig;
pub use invite::{InviteExecutor, InviteOutcome};
pub use presence::PresenceSweeper;
pub use wait::WaitCoordinator;
