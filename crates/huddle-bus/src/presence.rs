//! Background presence sweeper.
//!
//! A one-second timer scans the agent registry and emits `agent.offline`
//! for agents whose heartbeat window has lapsed since the previous tick.
//! Rows are never deleted here; the registry keeps the row until the agent
//! unregisters. The same task hosts the optional thread inactivity sweep.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use huddle_core::{defaults, AgentRepository, BusEvent, EventBus, ThreadRepository};
use huddle_db::Database;

/// Ticks between thread inactivity sweeps (the agent scan runs every tick).
const THREAD_SWEEP_EVERY_TICKS: u32 = 60;

pub struct PresenceSweeper {
    db: Database,
    events: Arc<EventBus>,
    heartbeat_timeout_secs: u64,
    thread_timeout_minutes: u32,
    shutdown: CancellationToken,
}

impl PresenceSweeper {
    pub fn new(
        db: Database,
        events: Arc<EventBus>,
        heartbeat_timeout_secs: u64,
        thread_timeout_minutes: u32,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            db,
            events,
            heartbeat_timeout_secs,
            thread_timeout_minutes,
            shutdown,
        }
    }

    /// Spawn the sweeper loop. It runs until the shutdown token fires.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        tracing::info!(
            heartbeat_timeout_secs = self.heartbeat_timeout_secs,
            thread_timeout_minutes = self.thread_timeout_minutes,
            "Presence sweeper started"
        );

        // Seed with currently-online agents so an offline transition is
        // emitted exactly once.
        let mut online: HashSet<Uuid> = match self.db.agents.list().await {
            Ok(agents) => {
                let now = Utc::now();
                agents
                    .iter()
                    .filter(|a| a.is_online_at(now, self.heartbeat_timeout_secs))
                    .map(|a| a.id)
                    .collect()
            }
            Err(e) => {
                tracing::warn!(error = %e, "presence seed scan failed");
                HashSet::new()
            }
        };

        let mut interval =
            tokio::time::interval(Duration::from_secs(defaults::SWEEP_INTERVAL_SECS));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut ticks: u32 = 0;

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => break,
                _ = interval.tick() => {}
            }

            self.sweep_agents(&mut online).await;

            ticks = ticks.wrapping_add(1);
            if self.thread_timeout_minutes > 0 && ticks % THREAD_SWEEP_EVERY_TICKS == 0 {
                self.sweep_threads().await;
            }
        }

        tracing::info!("Presence sweeper stopped");
    }

    async fn sweep_agents(&self, online: &mut HashSet<Uuid>) {
        let agents = match self.db.agents.list().await {
            Ok(agents) => agents,
            Err(e) => {
                tracing::warn!(error = %e, "presence scan failed");
                return;
            }
        };

        let now = Utc::now();
        let mut alive = HashSet::with_capacity(agents.len());
        for agent in &agents {
            if agent.is_online_at(now, self.heartbeat_timeout_secs) {
                alive.insert(agent.id);
                online.insert(agent.id);
            } else if online.remove(&agent.id) {
                tracing::info!(agent_id = %agent.id, name = %agent.display_name, "Agent went offline");
                self.events.emit(BusEvent::AgentOffline { agent_id: agent.id });
            }
        }
        // Unregistered rows leave the tracking set without an extra event;
        // unregister already emitted one.
        online.retain(|id| alive.contains(id));
    }

    async fn sweep_threads(&self) {
        match self.db.threads.timeout_sweep(self.thread_timeout_minutes).await {
            Ok(closed) => {
                for thread_id in closed {
                    self.events.emit(BusEvent::ThreadClosed {
                        thread_id,
                        summary: None,
                    });
                }
            }
            Err(e) => tracing::warn!(error = %e, "thread timeout sweep failed"),
        }
    }
}
