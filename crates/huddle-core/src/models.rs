//! Core data models for the huddle bus.
//!
//! These types are shared across all huddle crates and represent the domain
//! entities: threads, messages, agents, and the static agent catalog.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::defaults;
use crate::error::{Error, Result};

// =============================================================================
// THREAD TYPES
// =============================================================================

/// Lifecycle status of a thread.
///
/// `Archived` is represented as a status value but behaves as a flag: the
/// pre-archive status is stored alongside and restored on unarchive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThreadStatus {
    Discuss,
    Implement,
    Review,
    Done,
    Closed,
    Archived,
}

impl ThreadStatus {
    /// Stable string form used in the database and on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreadStatus::Discuss => "discuss",
            ThreadStatus::Implement => "implement",
            ThreadStatus::Review => "review",
            ThreadStatus::Done => "done",
            ThreadStatus::Closed => "closed",
            ThreadStatus::Archived => "archived",
        }
    }

    /// Parse from the stable string form.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "discuss" => Ok(ThreadStatus::Discuss),
            "implement" => Ok(ThreadStatus::Implement),
            "review" => Ok(ThreadStatus::Review),
            "done" => Ok(ThreadStatus::Done),
            "closed" => Ok(ThreadStatus::Closed),
            "archived" => Ok(ThreadStatus::Archived),
            other => Err(Error::InvalidInput(format!(
                "Invalid thread status '{}'. Must be one of discuss, implement, review, done, closed, archived",
                other
            ))),
        }
    }

    /// Terminal statuses cannot be left via `set-state`; `archived` is only
    /// entered and left through archive/unarchive.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ThreadStatus::Closed | ThreadStatus::Archived)
    }
}

impl std::fmt::Display for ThreadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A conversation context with a topic, a state-machine status, and an
/// ordered message log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Thread {
    pub id: Uuid,
    pub topic: String,
    pub status: ThreadStatus,
    /// Status held before the thread was archived; restored on unarchive.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prior_status: Option<ThreadStatus>,
    /// Optional collaboration rules surfaced as a synthetic preamble on reads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// Final summary, writable only via close.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonValue>,
}

/// Request for creating a thread.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateThreadRequest {
    pub topic: String,
    #[serde(default)]
    pub metadata: Option<JsonValue>,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

// =============================================================================
// MESSAGE TYPES
// =============================================================================

/// Speaker role of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            other => Err(Error::InvalidInput(format!(
                "Invalid role '{}'. Must be one of user, assistant, system",
                other
            ))),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single turn within a thread.
///
/// `seq` is the bus-wide monotonic sequence number assigned at commit time;
/// it is the sole ordering key within a thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub thread_id: Uuid,
    pub seq: i64,
    /// Agent id, or the literal `human` / `system`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_id: Option<String>,
    /// Display label resolved at insert time.
    pub author_name: String,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mentions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<JsonValue>,
    pub created_at: DateTime<Utc>,
}

/// Request for posting a message.
#[derive(Debug, Clone)]
pub struct PostMessageRequest {
    pub thread_id: Uuid,
    /// Raw author handle: an agent id, `human`, or `system`.
    pub author: String,
    pub role: Role,
    pub content: String,
    pub mentions: Vec<String>,
    pub metadata: Option<JsonValue>,
}

/// Image attachment record stored in message metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRef {
    pub url: String,
    pub name: String,
}

// =============================================================================
// AGENT TYPES
// =============================================================================

/// Origin of an agent's display alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AliasSource {
    /// Supplied by the registering client.
    User,
    /// Derived from the generated `"IDE (Model)"` name.
    Auto,
}

impl AliasSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AliasSource::User => "user",
            AliasSource::Auto => "auto",
        }
    }
}

/// Kind of the most recent activity attributed to an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Register,
    Heartbeat,
    Resume,
    MsgPost,
    MsgWait,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Register => "register",
            ActivityKind::Heartbeat => "heartbeat",
            ActivityKind::Resume => "resume",
            ActivityKind::MsgPost => "msg_post",
            ActivityKind::MsgWait => "msg_wait",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "register" => Some(ActivityKind::Register),
            "heartbeat" => Some(ActivityKind::Heartbeat),
            "resume" => Some(ActivityKind::Resume),
            "msg_post" => Some(ActivityKind::MsgPost),
            "msg_wait" => Some(ActivityKind::MsgWait),
            _ => None,
        }
    }
}

/// Presentation state derived from heartbeat and activity timestamps.
/// Computed on read, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgentState {
    Active,
    Waiting,
    Idle,
    Offline,
}

/// A registered agent.
///
/// The `token` is the secret issued at registration and checked on every
/// mutating agent operation. It is never serialized; registration and resume
/// responses return it explicitly.
#[derive(Debug, Clone)]
pub struct Agent {
    pub id: Uuid,
    /// Auto-generated `"IDE (Model)"` name, suffix-deduplicated.
    pub name: String,
    /// Operator- or client-chosen alias; falls back to `name`.
    pub display_name: String,
    pub alias_source: AliasSource,
    pub ide: String,
    pub model: String,
    pub description: String,
    pub capabilities: Vec<String>,
    pub token: String,
    pub registered_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
    pub last_activity: Option<ActivityKind>,
    pub last_activity_time: Option<DateTime<Utc>>,
}

impl Agent {
    /// An agent is online iff its heartbeat is fresh.
    pub fn is_online_at(&self, now: DateTime<Utc>, heartbeat_timeout_secs: u64) -> bool {
        now - self.last_heartbeat <= Duration::seconds(heartbeat_timeout_secs as i64)
    }

    /// Derive the presentation state from heartbeat and activity recency.
    ///
    /// A recent `msg_wait` wins over `Active` so the console shows agents as
    /// listening rather than busy.
    pub fn state_at(&self, now: DateTime<Utc>, heartbeat_timeout_secs: u64) -> AgentState {
        let online = self.is_online_at(now, heartbeat_timeout_secs);
        let Some(activity_time) = self.last_activity_time else {
            return if online {
                AgentState::Waiting
            } else {
                AgentState::Offline
            };
        };
        let age = (now - activity_time).num_seconds();
        if self.last_activity == Some(ActivityKind::MsgWait)
            && age < defaults::WAITING_WINDOW_SECS
        {
            AgentState::Waiting
        } else if age < defaults::ACTIVE_WINDOW_SECS {
            AgentState::Active
        } else if online {
            AgentState::Idle
        } else {
            AgentState::Offline
        }
    }

    /// Public projection with derived fields and without the token.
    pub fn summary(&self, heartbeat_timeout_secs: u64) -> AgentSummary {
        let now = Utc::now();
        AgentSummary {
            id: self.id,
            name: self.name.clone(),
            display_name: self.display_name.clone(),
            alias_source: self.alias_source,
            ide: self.ide.clone(),
            model: self.model.clone(),
            description: self.description.clone(),
            capabilities: self.capabilities.clone(),
            registered_at: self.registered_at,
            last_heartbeat: self.last_heartbeat,
            last_activity: self.last_activity,
            last_activity_time: self.last_activity_time,
            is_online: self.is_online_at(now, heartbeat_timeout_secs),
            state: self.state_at(now, heartbeat_timeout_secs),
        }
    }
}

/// Serializable agent view with derived presence fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSummary {
    pub id: Uuid,
    pub name: String,
    pub display_name: String,
    pub alias_source: AliasSource,
    pub ide: String,
    pub model: String,
    pub description: String,
    pub capabilities: Vec<String>,
    pub registered_at: DateTime<Utc>,
    pub last_heartbeat: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_activity: Option<ActivityKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_activity_time: Option<DateTime<Utc>>,
    pub is_online: bool,
    pub state: AgentState,
}

/// Request for registering an agent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RegisterAgentRequest {
    pub ide: String,
    pub model: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}
