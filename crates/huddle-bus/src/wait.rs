//! Long-poll wait coordination.
//!
//! `wait_for_messages` parks callers on a per-thread condition signalled by
//! the core API after every committed message insert. Wake-ups are
//! event-driven; a coarse safety-net re-poll covers notifications that race
//! the condition registration. There is no polling tighter than one second.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use huddle_core::{defaults, Message, MessageRepository, Result};
use huddle_db::Database;

/// Parks `msg_wait` callers per thread and wakes them on new messages.
pub struct WaitCoordinator {
    conditions: Mutex<HashMap<Uuid, Arc<Notify>>>,
    shutdown: CancellationToken,
}

impl WaitCoordinator {
    /// `shutdown` wakes every parked waiter for graceful exit.
    pub fn new(shutdown: CancellationToken) -> Self {
        Self {
            conditions: Mutex::new(HashMap::new()),
            shutdown,
        }
    }

    fn condition(&self, thread_id: Uuid) -> Arc<Notify> {
        let mut map = self.conditions.lock().expect("wait map poisoned");
        map.entry(thread_id).or_default().clone()
    }

    /// Signal all waiters parked on a thread. Called by the core API after
    /// a message commit; this path never drops a wake-up.
    pub fn notify(&self, thread_id: Uuid) {
        let notify = {
            let map = self.conditions.lock().expect("wait map poisoned");
            map.get(&thread_id).cloned()
        };
        if let Some(notify) = notify {
            notify.notify_waiters();
        }
    }

    /// Drop the condition for a deleted thread. Parked waiters drain via
    /// the safety-net poll.
    pub fn forget(&self, thread_id: Uuid) {
        self.conditions
            .lock()
            .expect("wait map poisoned")
            .remove(&thread_id);
    }

    /// Number of threads with a registered condition (diagnostics).
    pub fn condition_count(&self) -> usize {
        self.conditions.lock().expect("wait map poisoned").len()
    }

    /// Suspend until the thread has messages with `seq > after_seq`, the
    /// timeout elapses, or the call is cancelled.
    ///
    /// Returns immediately when matching rows already exist. Timeout and
    /// cancellation both return an empty list, never an error. A spurious
    /// wake (racing write to a different thread) re-queries and parks again
    /// for the remaining time.
    pub async fn wait_for_messages(
        &self,
        db: &Database,
        thread_id: Uuid,
        after_seq: i64,
        timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<Vec<Message>> {
        let deadline = Instant::now() + timeout;
        let safety_poll = Duration::from_secs(defaults::WAIT_SAFETY_POLL_SECS);

        loop {
            let notify = self.condition(thread_id);
            let notified = notify.notified();
            tokio::pin!(notified);
            // Register interest before querying so a commit between the
            // query and the park cannot be missed.
            notified.as_mut().enable();

            let msgs = db
                .messages
                .list(thread_id, after_seq, defaults::MSG_LIST_LIMIT, false)
                .await?;
            if !msgs.is_empty() {
                return Ok(msgs);
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(vec![]);
            }
            let nap = (deadline - now).min(safety_poll);

            tokio::select! {
                _ = &mut notified => {}
                _ = tokio::time::sleep(nap) => {}
                _ = cancel.cancelled() => return Ok(vec![]),
                _ = self.shutdown.cancelled() => return Ok(vec![]),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use huddle_core::{CreateThreadRequest, PostMessageRequest, Role, ThreadRepository};

    async fn setup() -> (Database, WaitCoordinator, Uuid) {
        let db = Database::connect_memory().await.unwrap();
        let thread = db
            .threads
            .insert(CreateThreadRequest {
                topic: "wait-test".to_string(),
                ..Default::default()
            })
            .await
            .unwrap();
        (db, WaitCoordinator::new(CancellationToken::new()), thread.id)
    }

    fn msg(thread_id: Uuid, content: &str) -> PostMessageRequest {
        PostMessageRequest {
            thread_id,
            author: "human".to_string(),
            role: Role::User,
            content: content.to_string(),
            mentions: vec![],
            metadata: None,
        }
    }

    #[tokio::test]
    async fn test_immediate_return_when_messages_exist() {
        let (db, waits, tid) = setup().await;
        db.messages.insert(msg(tid, "already here")).await.unwrap();
        let got = waits
            .wait_for_messages(&db, tid, 0, Duration::from_secs(5), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].content, "already here");
    }

    #[tokio::test]
    async fn test_timeout_returns_empty() {
        let (db, waits, tid) = setup().await;
        let start = std::time::Instant::now();
        let got = waits
            .wait_for_messages(
                &db,
                tid,
                999,
                Duration::from_millis(300),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(got.is_empty());
        assert!(start.elapsed() >= Duration::from_millis(300));
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_cancellation_returns_promptly() {
        let (db, waits, tid) = setup().await;
        let cancel = CancellationToken::new();
        let canceller = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });
        let start = std::time::Instant::now();
        let got = waits
            .wait_for_messages(&db, tid, 0, Duration::from_secs(30), &cancel)
            .await
            .unwrap();
        assert!(got.is_empty());
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_notify_wakes_waiter() {
        let (db, waits, tid) = setup().await;
        let waits = Arc::new(waits);
        let db2 = db.clone();
        let waits2 = waits.clone();

        let waiter = tokio::spawn(async move {
            waits2
                .wait_for_messages(&db2, tid, 0, Duration::from_secs(10), &CancellationToken::new())
                .await
                .unwrap()
        });

        tokio::time::sleep(Duration::from_millis(100)).await;
        db.messages.insert(msg(tid, "wake up")).await.unwrap();
        waits.notify(tid);

        let got = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .expect("waiter did not wake")
            .unwrap();
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].content, "wake up");
    }

    #[tokio::test]
    async fn test_spurious_wake_reparks() {
        let (db, waits, tid) = setup().await;
        let waits = Arc::new(waits);
        let db2 = db.clone();
        let waits2 = waits.clone();

        let waiter = tokio::spawn(async move {
            waits2
                .wait_for_messages(
                    &db2,
                    tid,
                    0,
                    Duration::from_millis(600),
                    &CancellationToken::new(),
                )
                .await
                .unwrap()
        });

        // Wake without a matching write: the waiter re-queries, finds
        // nothing, and parks again until its timeout.
        tokio::time::sleep(Duration::from_millis(100)).await;
        waits.notify(tid);

        let got = waiter.await.unwrap();
        assert!(got.is_empty());
    }

    #[tokio::test]
    async fn test_shutdown_wakes_all_waiters() {
        let (db, _, tid) = setup().await;
        let shutdown = CancellationToken::new();
        let waits = Arc::new(WaitCoordinator::new(shutdown.clone()));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let db = db.clone();
            let waits = waits.clone();
            handles.push(tokio::spawn(async move {
                waits
                    .wait_for_messages(&db, tid, 0, Duration::from_secs(60), &CancellationToken::new())
                    .await
                    .unwrap()
            }));
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown.cancel();

        let start = std::time::Instant::now();
        for handle in handles {
            let got = tokio::time::timeout(Duration::from_secs(2), handle)
                .await
                .expect("waiter outlived shutdown")
                .unwrap();
            assert!(got.is_empty());
        }
        assert!(start.elapsed() < Duration::from_secs(2));
    }
}
