//! Repository traits for the huddle store.
//!
//! These traits define the store interface the core API is written against,
//! keeping the SQLite implementation swappable and the façade testable.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::*;

/// Repository for thread lifecycle operations.
#[async_trait]
pub trait ThreadRepository: Send + Sync {
    /// Insert a new thread in `discuss` status.
    async fn insert(&self, req: CreateThreadRequest) -> Result<Thread>;

    /// Fetch a thread by ID.
    async fn fetch(&self, id: Uuid) -> Result<Thread>;

    /// List threads, newest first. `status` filters exactly;
    /// `include_archived=false` hides archived threads unless the filter
    /// names them.
    async fn list(
        &self,
        status: Option<ThreadStatus>,
        include_archived: bool,
    ) -> Result<Vec<Thread>>;

    /// Change status among the non-terminal states or into `closed`.
    /// Transitions out of `closed`/`archived` are rejected with `Conflict`.
    async fn set_status(&self, id: Uuid, status: ThreadStatus) -> Result<()>;

    /// Close a thread, optionally recording a final summary.
    async fn close(&self, id: Uuid, summary: Option<&str>) -> Result<()>;

    /// Archive a thread, preserving its prior status.
    async fn archive(&self, id: Uuid) -> Result<()>;

    /// Restore an archived thread to its pre-archive status, which is
    /// returned.
    async fn unarchive(&self, id: Uuid) -> Result<ThreadStatus>;

    /// Hard-delete a thread and all of its messages.
    async fn delete(&self, id: Uuid) -> Result<()>;

    /// Auto-close threads whose latest message (or creation, when empty) is
    /// older than `timeout_minutes`. Skips closed and archived threads.
    /// Returns the ids closed; a window of 0 disables the sweep.
    async fn timeout_sweep(&self, timeout_minutes: u32) -> Result<Vec<Uuid>>;
}

/// Repository for the ordered message log.
#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Insert a message, assigning the bus-wide `seq` under the same
    /// transaction. Rejects unknown threads.
    async fn insert(&self, req: PostMessageRequest) -> Result<Message>;

    /// List up to `limit` messages with `seq > after_seq`, ascending.
    /// `include_system_prompt=false` filters synthetic system-role rows.
    async fn list(
        &self,
        thread_id: Uuid,
        after_seq: i64,
        limit: i64,
        include_system_prompt: bool,
    ) -> Result<Vec<Message>>;

    /// Current high-water mark of the bus-wide sequence.
    async fn current_seq(&self) -> Result<i64>;
}

/// Repository for the agent registry.
#[async_trait]
pub trait AgentRepository: Send + Sync {
    /// Register a new agent; generates id, display name, and secret token.
    async fn register(&self, req: RegisterAgentRequest) -> Result<Agent>;

    /// Fetch an agent by ID.
    async fn fetch(&self, id: Uuid) -> Result<Agent>;

    /// Fetch and validate the token, failing `Unauthorized` on mismatch.
    async fn verify(&self, id: Uuid, token: &str) -> Result<Agent>;

    /// Refresh `last_heartbeat`. Token-checked.
    async fn heartbeat(&self, id: Uuid, token: &str) -> Result<()>;

    /// Re-attach to an existing registration, recording `resume` activity.
    async fn resume(&self, id: Uuid, token: &str) -> Result<Agent>;

    /// Remove the registration. Token-checked.
    async fn unregister(&self, id: Uuid, token: &str) -> Result<()>;

    /// List all registered agents, oldest registration first.
    async fn list(&self) -> Result<Vec<Agent>>;

    /// Record activity attribution (`msg_post`, `msg_wait`, …).
    async fn touch_activity(&self, id: Uuid, kind: ActivityKind) -> Result<()>;
}
