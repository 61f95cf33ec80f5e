//! Integration tests for the SQLite store: ordering invariants, thread
//! lifecycle, and the agent registry.

use huddle_core::{
    ActivityKind, AgentRepository, CreateThreadRequest, Error, MessageRepository,
    PostMessageRequest, RegisterAgentRequest, Role, ThreadRepository, ThreadStatus,
};
use huddle_db::Database;
use uuid::Uuid;

async fn test_db() -> Database {
    Database::connect_memory()
        .await
        .expect("Failed to open in-memory database")
}

fn topic(t: &str) -> CreateThreadRequest {
    CreateThreadRequest {
        topic: t.to_string(),
        ..Default::default()
    }
}

fn post(thread_id: Uuid, author: &str, content: &str) -> PostMessageRequest {
    PostMessageRequest {
        thread_id,
        author: author.to_string(),
        role: Role::User,
        content: content.to_string(),
        mentions: vec![],
        metadata: None,
    }
}

// =============================================================================
// SEQUENCER
// =============================================================================

#[tokio::test]
async fn test_seq_is_gapless_and_global() {
    let db = test_db().await;
    let t1 = db.threads.insert(topic("A")).await.unwrap();
    let t2 = db.threads.insert(topic("B")).await.unwrap();

    let m1 = db.messages.insert(post(t1.id, "human", "one")).await.unwrap();
    let m2 = db.messages.insert(post(t2.id, "human", "two")).await.unwrap();
    let m3 = db.messages.insert(post(t1.id, "human", "three")).await.unwrap();

    assert_eq!((m1.seq, m2.seq, m3.seq), (1, 2, 3));
    assert_eq!(db.messages.current_seq().await.unwrap(), 3);
}

#[tokio::test]
async fn test_thread_order_follows_seq() {
    let db = test_db().await;
    let t = db.threads.insert(topic("ordered")).await.unwrap();
    for i in 0..5 {
        db.messages
            .insert(post(t.id, "human", &format!("msg {}", i)))
            .await
            .unwrap();
    }
    let msgs = db.messages.list(t.id, 0, 100, true).await.unwrap();
    assert_eq!(msgs.len(), 5);
    for pair in msgs.windows(2) {
        assert!(pair[0].seq < pair[1].seq);
        assert!(pair[0].created_at <= pair[1].created_at);
    }
}

#[tokio::test]
async fn test_list_after_seq_cursor() {
    let db = test_db().await;
    let t = db.threads.insert(topic("cursor")).await.unwrap();
    for i in 0..4 {
        db.messages
            .insert(post(t.id, "human", &format!("m{}", i)))
            .await
            .unwrap();
    }
    let tail = db.messages.list(t.id, 2, 100, true).await.unwrap();
    assert_eq!(tail.len(), 2);
    assert_eq!(tail[0].seq, 3);

    let limited = db.messages.list(t.id, 0, 2, true).await.unwrap();
    assert_eq!(limited.len(), 2);
    assert_eq!(limited[1].seq, 2);
}

#[tokio::test]
async fn test_insert_into_unknown_thread_fails() {
    let db = test_db().await;
    let err = db
        .messages
        .insert(post(Uuid::new_v4(), "human", "orphan"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ThreadNotFound(_)));
}

#[tokio::test]
async fn test_system_rows_filtered_from_history_reads() {
    let db = test_db().await;
    let t = db.threads.insert(topic("sys")).await.unwrap();
    db.messages
        .insert(PostMessageRequest {
            role: Role::System,
            ..post(t.id, "system", "rules of engagement")
        })
        .await
        .unwrap();
    db.messages.insert(post(t.id, "human", "hi")).await.unwrap();

    let visible = db.messages.list(t.id, 0, 100, false).await.unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].content, "hi");

    let full = db.messages.list(t.id, 0, 100, true).await.unwrap();
    assert_eq!(full.len(), 2);
}

#[tokio::test]
async fn test_seq_counter_recovered_on_reopen() {
    let db = test_db().await;
    let t = db.threads.insert(topic("recover")).await.unwrap();
    db.messages.insert(post(t.id, "human", "a")).await.unwrap();

    // Force the counter behind the log, as a counter-less restore would.
    sqlx::query("UPDATE seq_counter SET val = 0 WHERE id = 1")
        .execute(db.pool())
        .await
        .unwrap();
    huddle_db::init_schema(db.pool()).await.unwrap();

    let m = db.messages.insert(post(t.id, "human", "b")).await.unwrap();
    assert_eq!(m.seq, 2);
}

// =============================================================================
// THREAD LIFECYCLE
// =============================================================================

#[tokio::test]
async fn test_thread_create_defaults_to_discuss() {
    let db = test_db().await;
    let t = db.threads.insert(topic("T1")).await.unwrap();
    assert_eq!(t.status, ThreadStatus::Discuss);
    let fetched = db.threads.fetch(t.id).await.unwrap();
    assert_eq!(fetched.topic, "T1");
    assert!(fetched.closed_at.is_none());
}

#[tokio::test]
async fn test_thread_empty_topic_rejected() {
    let db = test_db().await;
    let err = db.threads.insert(topic("   ")).await.unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[tokio::test]
async fn test_set_status_free_among_non_terminal() {
    let db = test_db().await;
    let t = db.threads.insert(topic("states")).await.unwrap();
    for s in [
        ThreadStatus::Implement,
        ThreadStatus::Review,
        ThreadStatus::Discuss,
        ThreadStatus::Done,
    ] {
        db.threads.set_status(t.id, s).await.unwrap();
        assert_eq!(db.threads.fetch(t.id).await.unwrap().status, s);
    }
}

#[tokio::test]
async fn test_set_status_rejects_leaving_closed() {
    let db = test_db().await;
    let t = db.threads.insert(topic("done")).await.unwrap();
    db.threads.close(t.id, Some("wrapped up")).await.unwrap();
    let err = db
        .threads
        .set_status(t.id, ThreadStatus::Discuss)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
}

#[tokio::test]
async fn test_set_status_rejects_archived_target() {
    let db = test_db().await;
    let t = db.threads.insert(topic("no-direct-archive")).await.unwrap();
    let err = db
        .threads
        .set_status(t.id, ThreadStatus::Archived)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidInput(_)));
}

#[tokio::test]
async fn test_close_records_summary_and_closed_at() {
    let db = test_db().await;
    let t = db.threads.insert(topic("closing")).await.unwrap();
    db.threads.close(t.id, Some("decided X")).await.unwrap();
    let fetched = db.threads.fetch(t.id).await.unwrap();
    assert_eq!(fetched.status, ThreadStatus::Closed);
    assert_eq!(fetched.summary.as_deref(), Some("decided X"));
    assert!(fetched.closed_at.is_some());
}

#[tokio::test]
async fn test_archive_round_trip_preserves_status() {
    let db = test_db().await;
    let t = db.threads.insert(topic("P5")).await.unwrap();
    db.threads
        .set_status(t.id, ThreadStatus::Review)
        .await
        .unwrap();

    db.threads.archive(t.id).await.unwrap();
    let archived = db.threads.fetch(t.id).await.unwrap();
    assert_eq!(archived.status, ThreadStatus::Archived);
    assert_eq!(archived.prior_status, Some(ThreadStatus::Review));

    let restored = db.threads.unarchive(t.id).await.unwrap();
    assert_eq!(restored, ThreadStatus::Review);
    let fetched = db.threads.fetch(t.id).await.unwrap();
    assert_eq!(fetched.status, ThreadStatus::Review);
    assert_eq!(fetched.prior_status, None);
}

#[tokio::test]
async fn test_archive_twice_keeps_prior_status() {
    let db = test_db().await;
    let t = db.threads.insert(topic("double")).await.unwrap();
    db.threads.set_status(t.id, ThreadStatus::Done).await.unwrap();
    db.threads.archive(t.id).await.unwrap();
    db.threads.archive(t.id).await.unwrap();
    assert_eq!(
        db.threads.unarchive(t.id).await.unwrap(),
        ThreadStatus::Done
    );
}

#[tokio::test]
async fn test_unarchive_non_archived_conflicts() {
    let db = test_db().await;
    let t = db.threads.insert(topic("plain")).await.unwrap();
    let err = db.threads.unarchive(t.id).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
}

#[tokio::test]
async fn test_list_hides_archived_by_default() {
    let db = test_db().await;
    let t1 = db.threads.insert(topic("visible")).await.unwrap();
    let t2 = db.threads.insert(topic("hidden")).await.unwrap();
    db.threads.archive(t2.id).await.unwrap();

    let visible = db.threads.list(None, false).await.unwrap();
    assert_eq!(visible.len(), 1);
    assert_eq!(visible[0].id, t1.id);

    let all = db.threads.list(None, true).await.unwrap();
    assert_eq!(all.len(), 2);

    let archived_only = db
        .threads
        .list(Some(ThreadStatus::Archived), false)
        .await
        .unwrap();
    assert_eq!(archived_only.len(), 1);
    assert_eq!(archived_only[0].id, t2.id);
}

#[tokio::test]
async fn test_delete_cascades_to_messages() {
    let db = test_db().await;
    let t = db.threads.insert(topic("doomed")).await.unwrap();
    db.messages.insert(post(t.id, "human", "bye")).await.unwrap();
    db.threads.delete(t.id).await.unwrap();

    assert!(matches!(
        db.threads.fetch(t.id).await.unwrap_err(),
        Error::ThreadNotFound(_)
    ));
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE thread_id = ?")
        .bind(t.id.to_string())
        .fetch_one(db.pool())
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_timeout_sweep_closes_stale_threads() {
    let db = test_db().await;
    let stale = db.threads.insert(topic("stale")).await.unwrap();
    let fresh = db.threads.insert(topic("fresh")).await.unwrap();
    db.messages
        .insert(post(fresh.id, "human", "still here"))
        .await
        .unwrap();

    let old = (chrono::Utc::now() - chrono::Duration::minutes(90)).to_rfc3339();
    sqlx::query("UPDATE threads SET created_at = ? WHERE id = ?")
        .bind(&old)
        .bind(stale.id.to_string())
        .execute(db.pool())
        .await
        .unwrap();

    let closed = db.threads.timeout_sweep(60).await.unwrap();
    assert_eq!(closed, vec![stale.id]);
    assert_eq!(
        db.threads.fetch(stale.id).await.unwrap().status,
        ThreadStatus::Closed
    );
    assert_eq!(
        db.threads.fetch(fresh.id).await.unwrap().status,
        ThreadStatus::Discuss
    );
}

#[tokio::test]
async fn test_timeout_sweep_disabled_with_zero_window() {
    let db = test_db().await;
    db.threads.insert(topic("any")).await.unwrap();
    assert!(db.threads.timeout_sweep(0).await.unwrap().is_empty());
}

// =============================================================================
// AGENT REGISTRY
// =============================================================================

fn register(ide: &str, model: &str) -> RegisterAgentRequest {
    RegisterAgentRequest {
        ide: ide.to_string(),
        model: model.to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_register_generates_suffixed_names() {
    let db = test_db().await;
    let a1 = db.agents.register(register("Cursor", "GPT-4")).await.unwrap();
    let a2 = db.agents.register(register("Cursor", "GPT-4")).await.unwrap();
    let a3 = db.agents.register(register("Cursor", "GPT-4")).await.unwrap();

    assert_eq!(a1.name, "Cursor (GPT-4)");
    assert_eq!(a2.name, "Cursor (GPT-4) 2");
    assert_eq!(a3.name, "Cursor (GPT-4) 3");
    assert_eq!(a1.last_activity, Some(ActivityKind::Register));
    assert_eq!(a1.token.len(), 64);
    assert_ne!(a1.token, a2.token);
}

#[tokio::test]
async fn test_register_blank_ide_model_defaults() {
    let db = test_db().await;
    let a = db.agents.register(register("  ", "")).await.unwrap();
    assert_eq!(a.name, "Unknown IDE (Unknown Model)");
}

#[tokio::test]
async fn test_register_with_user_alias() {
    let db = test_db().await;
    let a = db
        .agents
        .register(RegisterAgentRequest {
            display_name: Some("Alpha".to_string()),
            ..register("Cursor", "GPT-4")
        })
        .await
        .unwrap();
    assert_eq!(a.display_name, "Alpha");
    assert_eq!(a.alias_source, huddle_core::AliasSource::User);
}

#[tokio::test]
async fn test_heartbeat_requires_valid_token() {
    let db = test_db().await;
    let a = db.agents.register(register("VSCode", "GPT")).await.unwrap();

    db.agents.heartbeat(a.id, &a.token).await.unwrap();

    let err = db.agents.heartbeat(a.id, "wrong").await.unwrap_err();
    assert!(matches!(err, Error::Unauthorized(_)));

    let err = db
        .agents
        .heartbeat(Uuid::new_v4(), &a.token)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Unauthorized(_)));
}

#[tokio::test]
async fn test_unregister_removes_row() {
    let db = test_db().await;
    let a = db.agents.register(register("CLI", "local")).await.unwrap();
    db.agents.unregister(a.id, &a.token).await.unwrap();
    assert!(matches!(
        db.agents.fetch(a.id).await.unwrap_err(),
        Error::AgentNotFound(_)
    ));
}

#[tokio::test]
async fn test_resume_updates_activity() {
    let db = test_db().await;
    let a = db.agents.register(register("Zed", "claude")).await.unwrap();
    let resumed = db.agents.resume(a.id, &a.token).await.unwrap();
    assert_eq!(resumed.last_activity, Some(ActivityKind::Resume));
}

#[tokio::test]
async fn test_touch_activity_records_kind() {
    let db = test_db().await;
    let a = db.agents.register(register("Zed", "claude")).await.unwrap();
    db.agents
        .touch_activity(a.id, ActivityKind::MsgWait)
        .await
        .unwrap();
    let fetched = db.agents.fetch(a.id).await.unwrap();
    assert_eq!(fetched.last_activity, Some(ActivityKind::MsgWait));
    assert!(fetched.last_activity_time.is_some());
}

#[tokio::test]
async fn test_post_resolves_agent_author_to_display_name() {
    let db = test_db().await;
    let t = db.threads.insert(topic("authors")).await.unwrap();
    let a = db
        .agents
        .register(RegisterAgentRequest {
            display_name: Some("Reviewer".to_string()),
            ..register("Cursor", "GPT-4")
        })
        .await
        .unwrap();

    let m = db
        .messages
        .insert(post(t.id, &a.id.to_string(), "looks good"))
        .await
        .unwrap();
    assert_eq!(m.author_id.as_deref(), Some(a.id.to_string().as_str()));
    assert_eq!(m.author_name, "Reviewer");

    let m2 = db.messages.insert(post(t.id, "human", "thanks")).await.unwrap();
    assert_eq!(m2.author_name, "human");
}

// =============================================================================
// LEGACY MIGRATION
// =============================================================================

#[tokio::test]
async fn test_is_archived_flag_reconciled_into_status() {
    let pool = huddle_db::create_pool("sqlite::memory:").await.unwrap();
    // A database created before `archived` joined the status union.
    sqlx::raw_sql(
        "CREATE TABLE threads (
             id TEXT PRIMARY KEY,
             topic TEXT NOT NULL,
             status TEXT NOT NULL DEFAULT 'discuss',
             summary TEXT,
             created_at TEXT NOT NULL,
             closed_at TEXT,
             is_archived INTEGER NOT NULL DEFAULT 0
         );
         INSERT INTO threads (id, topic, status, created_at, is_archived)
         VALUES ('11111111-1111-1111-1111-111111111111', 'legacy', 'review',
                 '2025-01-01T00:00:00+00:00', 1);",
    )
    .execute(&pool)
    .await
    .unwrap();

    huddle_db::init_schema(&pool).await.unwrap();
    let db = huddle_db::Database::new(pool);

    let t = db
        .threads
        .fetch(Uuid::parse_str("11111111-1111-1111-1111-111111111111").unwrap())
        .await
        .unwrap();
    assert_eq!(t.status, ThreadStatus::Archived);
    assert_eq!(t.prior_status, Some(ThreadStatus::Review));

    let restored = db.threads.unarchive(t.id).await.unwrap();
    assert_eq!(restored, ThreadStatus::Review);
}
