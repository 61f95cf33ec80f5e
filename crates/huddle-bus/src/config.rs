//! Runtime configuration for the bus.
//!
//! The surrounding tooling reads environment variables once at startup; the
//! core only ever sees the constructed [`BusConfig`] value.

use std::path::PathBuf;

use huddle_core::defaults;

/// Configuration for a bus instance.
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// Bind host for the HTTP listener.
    pub host: String,
    /// Listen port.
    pub port: u16,
    /// SQLite database file path (or `sqlite:` URL).
    pub db_path: String,
    /// Seconds without a heartbeat before an agent is derived offline.
    pub heartbeat_timeout_secs: u64,
    /// Hard cap for `msg_wait` timeouts in seconds.
    pub msg_wait_timeout_secs: u64,
    /// Auto-close threads idle for this many minutes. 0 disables the sweep.
    pub thread_timeout_minutes: u32,
    /// Directory for uploaded images.
    pub upload_dir: PathBuf,
    /// Maximum accepted size of a single upload in bytes. Uploads are kept
    /// until the operator removes them; there is no automatic cleanup.
    pub upload_max_bytes: usize,
    /// JSON file describing invitable CLI agents.
    pub agents_file: PathBuf,
    /// Directory for per-invocation subprocess logs.
    pub invite_log_dir: PathBuf,
    /// Per-author message rate limiting.
    pub rate_limit_enabled: bool,
    pub rate_limit_per_minute: u32,
    /// Block messages containing known secret patterns.
    pub content_filter_enabled: bool,
    /// Soft language recommendation advertised to agents.
    pub preferred_language: String,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            host: defaults::HOST.to_string(),
            port: defaults::PORT,
            db_path: "data/huddle.db".to_string(),
            heartbeat_timeout_secs: defaults::HEARTBEAT_TIMEOUT_SECS,
            msg_wait_timeout_secs: defaults::MSG_WAIT_TIMEOUT_SECS,
            thread_timeout_minutes: 0,
            upload_dir: PathBuf::from("data/uploads"),
            upload_max_bytes: defaults::UPLOAD_MAX_BYTES,
            agents_file: PathBuf::from("data/available_agents.json"),
            invite_log_dir: PathBuf::from("data/invite-logs"),
            rate_limit_enabled: true,
            rate_limit_per_minute: defaults::RATE_LIMIT_MSG_PER_MINUTE,
            content_filter_enabled: true,
            preferred_language: defaults::PREFERRED_LANGUAGE.to_string(),
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

impl BusConfig {
    /// Build configuration from `HUDDLE_*` environment variables, falling
    /// back to defaults.
    pub fn from_env() -> Self {
        let base = Self::default();
        Self {
            host: std::env::var("HUDDLE_HOST").unwrap_or(base.host),
            port: env_or("HUDDLE_PORT", base.port),
            db_path: std::env::var("HUDDLE_DB").unwrap_or(base.db_path),
            heartbeat_timeout_secs: env_or("HUDDLE_HEARTBEAT_TIMEOUT", base.heartbeat_timeout_secs),
            msg_wait_timeout_secs: env_or("HUDDLE_WAIT_TIMEOUT", base.msg_wait_timeout_secs),
            thread_timeout_minutes: env_or(
                "HUDDLE_THREAD_TIMEOUT_MINUTES",
                base.thread_timeout_minutes,
            ),
            upload_dir: std::env::var("HUDDLE_UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or(base.upload_dir),
            upload_max_bytes: env_or("HUDDLE_UPLOAD_MAX_BYTES", base.upload_max_bytes),
            agents_file: std::env::var("HUDDLE_AGENTS_FILE")
                .map(PathBuf::from)
                .unwrap_or(base.agents_file),
            invite_log_dir: std::env::var("HUDDLE_INVITE_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or(base.invite_log_dir),
            rate_limit_enabled: env_bool("HUDDLE_RATE_LIMIT_ENABLED", base.rate_limit_enabled),
            rate_limit_per_minute: env_or(
                "HUDDLE_RATE_LIMIT_PER_MINUTE",
                base.rate_limit_per_minute,
            ),
            content_filter_enabled: env_bool(
                "HUDDLE_CONTENT_FILTER_ENABLED",
                base.content_filter_enabled,
            ),
            preferred_language: std::env::var("HUDDLE_LANGUAGE")
                .unwrap_or(base.preferred_language),
        }
    }

    /// Externally reachable address, handed to invited subprocesses.
    pub fn bus_address(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}
