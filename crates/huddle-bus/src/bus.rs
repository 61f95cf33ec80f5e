//! The core API façade.
//!
//! `ChatBus` is the single value adapters see. It owns the store, the event
//! bus, the wait coordinator, and the invitation executor; it validates
//! arguments, enforces token match on agent-attributed mutations, and
//! publishes events only after the underlying write has committed.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use governor::clock::DefaultClock;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use huddle_core::{
    content_preview, defaults, detect_secret, load_catalog, normalize_content, ActivityKind,
    Agent, AgentRepository, AgentSummary, BusEvent, CreateThreadRequest, Error, EventBus,
    Message, MessageRepository, PostMessageRequest, RegisterAgentRequest, Result, Thread,
    ThreadRepository, ThreadStatus,
};
use huddle_db::Database;

use crate::config::BusConfig;
use crate::invite::{InviteExecutor, InviteOutcome};
use crate::wait::WaitCoordinator;

type AuthorRateLimiter = RateLimiter<String, DefaultKeyedStateStore<String>, DefaultClock>;

/// The bus core. One instance per process; adapters hold an `Arc<ChatBus>`
/// and nothing else.
pub struct ChatBus {
    db: Database,
    events: Arc<EventBus>,
    waits: WaitCoordinator,
    invites: InviteExecutor,
    config: BusConfig,
    rate_limiter: Option<AuthorRateLimiter>,
    shutdown: CancellationToken,
}

impl ChatBus {
    /// Assemble the bus over an open database. `shutdown` is the root
    /// cancellation token; cancelling it wakes every parked waiter.
    pub fn new(db: Database, config: BusConfig, shutdown: CancellationToken) -> Result<Self> {
        let catalog = load_catalog(&config.agents_file)?;
        let invites = InviteExecutor::new(
            catalog,
            config.bus_address(),
            config.invite_log_dir.clone(),
        );
        let rate_limiter = if config.rate_limit_enabled {
            let per_minute = NonZeroU32::new(config.rate_limit_per_minute.max(1))
                .expect("max(1) is non-zero");
            Some(RateLimiter::keyed(Quota::per_minute(per_minute)))
        } else {
            None
        };
        Ok(Self {
            events: Arc::new(EventBus::new(defaults::EVENT_BUS_CAPACITY)),
            waits: WaitCoordinator::new(shutdown.clone()),
            invites,
            rate_limiter,
            db,
            config,
            shutdown,
        })
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn events(&self) -> Arc<EventBus> {
        self.events.clone()
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    // =========================================================================
    // THREADS
    // =========================================================================

    pub async fn thread_create(&self, req: CreateThreadRequest) -> Result<Thread> {
        let thread = self.db.threads.insert(req).await?;
        self.events.emit(BusEvent::ThreadNew {
            thread_id: thread.id,
            topic: thread.topic.clone(),
        });
        Ok(thread)
    }

    pub async fn thread_get(&self, id: Uuid) -> Result<Thread> {
        self.db.threads.fetch(id).await
    }

    pub async fn thread_list(
        &self,
        status: Option<ThreadStatus>,
        include_archived: bool,
    ) -> Result<Vec<Thread>> {
        self.db.threads.list(status, include_archived).await
    }

    pub async fn thread_set_state(&self, id: Uuid, status: ThreadStatus) -> Result<()> {
        self.db.threads.set_status(id, status).await?;
        self.events.emit(BusEvent::ThreadState {
            thread_id: id,
            state: status.as_str().to_string(),
        });
        Ok(())
    }

    pub async fn thread_close(&self, id: Uuid, summary: Option<&str>) -> Result<()> {
        self.db.threads.close(id, summary).await?;
        self.events.emit(BusEvent::ThreadClosed {
            thread_id: id,
            summary: summary.map(String::from),
        });
        Ok(())
    }

    pub async fn thread_archive(&self, id: Uuid) -> Result<()> {
        self.db.threads.archive(id).await?;
        self.events.emit(BusEvent::ThreadArchived { thread_id: id });
        Ok(())
    }

    pub async fn thread_unarchive(&self, id: Uuid) -> Result<ThreadStatus> {
        let restored = self.db.threads.unarchive(id).await?;
        self.events.emit(BusEvent::ThreadUnarchived {
            thread_id: id,
            state: restored.as_str().to_string(),
        });
        Ok(restored)
    }

    pub async fn thread_delete(&self, id: Uuid) -> Result<()> {
        self.db.threads.delete(id).await?;
        self.waits.forget(id);
        self.events.emit(BusEvent::ThreadDeleted { thread_id: id });
        Ok(())
    }

    // =========================================================================
    // MESSAGES
    // =========================================================================

    pub async fn msg_post(&self, mut req: PostMessageRequest) -> Result<Message> {
        if self.config.content_filter_enabled {
            if let Some(label) = detect_secret(&req.content) {
                tracing::warn!(thread_id = %req.thread_id, label, "message blocked by content filter");
                return Err(Error::InvalidInput(format!(
                    "Content blocked: detected {}",
                    label
                )));
            }
        }
        req.content = normalize_content(&req.content)?;

        if let Some(limiter) = &self.rate_limiter {
            if limiter.check_key(&req.author).is_err() {
                return Err(Error::RateLimited {
                    limit: self.config.rate_limit_per_minute,
                    window_secs: defaults::RATE_LIMIT_WINDOW_SECS,
                });
            }
        }

        let msg = self.db.messages.insert(req).await?;

        // Activity attribution for registered authors; best-effort.
        if let Some(agent_id) = msg.author_id.as_deref().and_then(|s| Uuid::parse_str(s).ok())
        {
            let _ = self
                .db
                .agents
                .touch_activity(agent_id, ActivityKind::MsgPost)
                .await;
        }

        self.events.emit(BusEvent::MessageNew {
            msg_id: msg.id,
            thread_id: msg.thread_id,
            author: msg.author_name.clone(),
            role: msg.role.as_str().to_string(),
            seq: msg.seq,
            content: content_preview(&msg.content),
        });
        self.waits.notify(msg.thread_id);
        Ok(msg)
    }

    pub async fn msg_list(
        &self,
        thread_id: Uuid,
        after_seq: i64,
        limit: i64,
        include_system_prompt: bool,
    ) -> Result<Vec<Message>> {
        // Distinguish an unknown thread from an empty log.
        self.db.threads.fetch(thread_id).await?;
        self.db
            .messages
            .list(thread_id, after_seq, limit, include_system_prompt)
            .await
    }

    /// Long-poll for messages after a cursor.
    ///
    /// When the call is attributed to a known agent, entry records a
    /// `msg_wait` activity — the signal behind the console's `Waiting`
    /// state. A bad credential skips attribution instead of failing the
    /// wait.
    pub async fn msg_wait(
        &self,
        thread_id: Uuid,
        after_seq: i64,
        timeout_ms: Option<u64>,
        agent: Option<(Uuid, &str)>,
        cancel: &CancellationToken,
    ) -> Result<Vec<Message>> {
        self.db.threads.fetch(thread_id).await?;

        if let Some((agent_id, token)) = agent {
            match self.db.agents.verify(agent_id, token).await {
                Ok(_) => {
                    let _ = self
                        .db
                        .agents
                        .touch_activity(agent_id, ActivityKind::MsgWait)
                        .await;
                }
                Err(e) => {
                    tracing::warn!(agent_id = %agent_id, error = %e, "msg_wait attribution skipped")
                }
            }
        }

        let cap = Duration::from_secs(self.config.msg_wait_timeout_secs);
        let timeout = timeout_ms.map(Duration::from_millis).unwrap_or(cap).min(cap);
        self.waits
            .wait_for_messages(&self.db, thread_id, after_seq, timeout, cancel)
            .await
    }

    // =========================================================================
    // AGENTS
    // =========================================================================

    pub async fn agent_register(&self, req: RegisterAgentRequest) -> Result<Agent> {
        let agent = self.db.agents.register(req).await?;
        self.events.emit(BusEvent::AgentOnline {
            agent_id: agent.id,
            name: agent.display_name.clone(),
            ide: agent.ide.clone(),
            model: agent.model.clone(),
        });
        Ok(agent)
    }

    pub async fn agent_heartbeat(&self, id: Uuid, token: &str) -> Result<()> {
        let agent = self.db.agents.verify(id, token).await?;
        let was_offline = !agent.is_online_at(Utc::now(), self.config.heartbeat_timeout_secs);
        self.db.agents.heartbeat(id, token).await?;
        if was_offline {
            self.events.emit(BusEvent::AgentOnline {
                agent_id: agent.id,
                name: agent.display_name.clone(),
                ide: agent.ide.clone(),
                model: agent.model.clone(),
            });
        }
        Ok(())
    }

    pub async fn agent_resume(&self, id: Uuid, token: &str) -> Result<Agent> {
        let before = self.db.agents.verify(id, token).await?;
        let was_offline = !before.is_online_at(Utc::now(), self.config.heartbeat_timeout_secs);
        let agent = self.db.agents.resume(id, token).await?;
        if was_offline {
            self.events.emit(BusEvent::AgentOnline {
                agent_id: agent.id,
                name: agent.display_name.clone(),
                ide: agent.ide.clone(),
                model: agent.model.clone(),
            });
        }
        Ok(agent)
    }

    pub async fn agent_unregister(&self, id: Uuid, token: &str) -> Result<()> {
        self.db.agents.unregister(id, token).await?;
        self.events.emit(BusEvent::AgentOffline { agent_id: id });
        Ok(())
    }

    pub async fn agent_list(&self) -> Result<Vec<AgentSummary>> {
        let agents = self.db.agents.list().await?;
        Ok(agents
            .iter()
            .map(|a| a.summary(self.config.heartbeat_timeout_secs))
            .collect())
    }

    /// Ephemeral typing signal. Nothing is persisted.
    pub async fn agent_set_typing(
        &self,
        thread_id: Uuid,
        agent_id: Uuid,
        is_typing: bool,
    ) -> Result<()> {
        let name = match self.db.agents.fetch(agent_id).await {
            Ok(agent) => agent.display_name,
            Err(_) => agent_id.to_string(),
        };
        self.events.emit(BusEvent::AgentTyping {
            thread_id,
            agent_id,
            name,
            is_typing,
        });
        Ok(())
    }

    /// Spawn a catalog CLI agent onto a thread.
    pub async fn agent_invite(&self, agent_name: &str, thread_id: Uuid) -> Result<InviteOutcome> {
        self.db.threads.fetch(thread_id).await?;
        self.invites.invite(agent_name, thread_id)
    }

    /// Enabled catalog entries, for discovery surfaces.
    pub fn invitable_agents(&self) -> Vec<huddle_core::CatalogEntry> {
        self.invites.available().into_iter().cloned().collect()
    }

    // =========================================================================
    // BUS CONFIG
    // =========================================================================

    /// Bus-level configuration advertised to agents. `session_lang`
    /// overrides the configured language for one connection.
    pub fn bus_config(&self, session_lang: Option<&str>) -> serde_json::Value {
        let effective = session_lang.unwrap_or(&self.config.preferred_language);
        let source = if session_lang.is_some() {
            "url_param"
        } else {
            "default"
        };
        serde_json::json!({
            "preferred_language": effective,
            "language_source": source,
            "language_note": format!(
                "Please respond in {} whenever possible. This is a soft preference — use your best judgement.",
                effective
            ),
            "bus_name": "huddle",
            "version": defaults::BUS_VERSION,
            "endpoint": self.config.bus_address(),
            "heartbeat_timeout_secs": self.config.heartbeat_timeout_secs,
            "msg_wait_timeout_secs": self.config.msg_wait_timeout_secs,
        })
    }
}
