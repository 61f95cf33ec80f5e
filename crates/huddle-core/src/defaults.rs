//! Centralized default constants for the huddle bus.
//!
//! **This module is the single source of truth** for shared default values.
//! All crates and binaries reference these constants instead of defining
//! their own magic numbers.

// =============================================================================
// HTTP SERVER
// =============================================================================

/// Default bind host.
pub const HOST: &str = "127.0.0.1";

/// Default listen port.
pub const PORT: u16 = 39765;

// =============================================================================
// PRESENCE
// =============================================================================

/// Seconds without a heartbeat before an agent is derived offline.
pub const HEARTBEAT_TIMEOUT_SECS: u64 = 30;

/// Sweeper tick interval in seconds. Offline transitions are detected within
/// one tick of the heartbeat window elapsing.
pub const SWEEP_INTERVAL_SECS: u64 = 1;

/// Window within which any recorded activity renders an agent `Active`.
pub const ACTIVE_WINDOW_SECS: i64 = 30;

/// Window within which a `msg_wait` activity renders an agent `Waiting`.
pub const WAITING_WINDOW_SECS: i64 = 60;

// =============================================================================
// MESSAGING
// =============================================================================

/// Default long-poll wait timeout for `msg_wait` in seconds.
pub const MSG_WAIT_TIMEOUT_SECS: u64 = 300;

/// Safety-net re-poll interval while a waiter is parked. Wake-ups are
/// event-driven; this poll only covers missed notifications. Must never go
/// below one second.
pub const WAIT_SAFETY_POLL_SECS: u64 = 30;

/// Default page size for message listing.
pub const MSG_LIST_LIMIT: i64 = 100;

/// `msg.new` event payloads truncate content to this many characters.
pub const EVENT_CONTENT_PREVIEW_CHARS: usize = 200;

/// Default per-author message rate limit (messages per minute).
pub const RATE_LIMIT_MSG_PER_MINUTE: u32 = 30;

/// Rate limit window in seconds.
pub const RATE_LIMIT_WINDOW_SECS: u64 = 60;

// =============================================================================
// EVENT BUS
// =============================================================================

/// Broadcast capacity of the in-memory event bus. Subscribers that lag
/// behind this many events drop the oldest.
pub const EVENT_BUS_CAPACITY: usize = 256;

/// SSE keep-alive comment interval in seconds.
pub const SSE_KEEPALIVE_SECS: u64 = 15;

// =============================================================================
// INVITATIONS
// =============================================================================

/// Default hard-kill deadline for invited subprocesses in seconds.
pub const INVITE_TIMEOUT_SECS: u64 = 600;

// =============================================================================
// UPLOADS
// =============================================================================

/// Maximum accepted size for a single image upload in bytes.
pub const UPLOAD_MAX_BYTES: usize = 10 * 1024 * 1024;

// =============================================================================
// SHUTDOWN
// =============================================================================

/// Grace period for in-flight waits and background tasks after a shutdown
/// signal, in seconds.
pub const SHUTDOWN_GRACE_SECS: u64 = 2;

/// Bus software version reported by `bus_get_config`.
pub const BUS_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default preferred language advertised to agents. A soft recommendation,
/// never enforced.
pub const PREFERRED_LANGUAGE: &str = "English";
