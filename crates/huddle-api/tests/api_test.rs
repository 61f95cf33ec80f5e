//! HTTP surface tests: routes, status mapping, and response shapes, driven
//! through the router against an in-memory bus.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use huddle_api::AppState;
use huddle_bus::{BusConfig, ChatBus};
use huddle_db::Database;

async fn app() -> Router {
    let db = Database::connect_memory().await.unwrap();
    let config = BusConfig {
        rate_limit_enabled: false,
        ..BusConfig::default()
    };
    let bus = Arc::new(ChatBus::new(db, config, CancellationToken::new()).unwrap());
    huddle_api::router(AppState::new(bus))
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_health() {
    let response = app().await.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_create_thread_post_and_list_messages() {
    let app = app().await;

    let response = app
        .clone()
        .oneshot(post_json("/api/threads", serde_json::json!({"topic": "T1"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let thread = body_json(response).await;
    assert_eq!(thread["topic"], "T1");
    assert_eq!(thread["status"], "discuss");
    let tid = thread["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/threads/{}/messages", tid),
            serde_json::json!({"author": "human", "role": "user", "content": "hi"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let msg = body_json(response).await;
    assert_eq!(msg["seq"], 1);

    let response = app
        .clone()
        .oneshot(get(&format!(
            "/api/threads/{}/messages?after_seq=0&limit=10",
            tid
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let msgs = body_json(response).await;
    let msgs = msgs.as_array().unwrap();
    assert_eq!(msgs.len(), 1);
    assert_eq!(msgs[0]["seq"], 1);
    assert_eq!(msgs[0]["content"], "hi");
}

#[tokio::test]
async fn test_message_with_images_lands_in_metadata() {
    let app = app().await;
    let thread = body_json(
        app.clone()
            .oneshot(post_json("/api/threads", serde_json::json!({"topic": "pics"})))
            .await
            .unwrap(),
    )
    .await;
    let tid = thread["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/threads/{}/messages", tid),
            serde_json::json!({
                "author": "human",
                "content": "see attached",
                "images": [{"url": "/uploads/x.png", "name": "x.png"}]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let msg = body_json(response).await;
    assert_eq!(msg["metadata"]["images"][0]["name"], "x.png");
}

#[tokio::test]
async fn test_messages_unknown_thread_404() {
    let response = app()
        .await
        .oneshot(get(&format!(
            "/api/threads/{}/messages",
            uuid::Uuid::new_v4()
        )))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response).await;
    assert_eq!(body["kind"], "not_found");
    assert!(body["error"].as_str().unwrap().contains("Thread not found"));
}

#[tokio::test]
async fn test_thread_state_and_close_flow() {
    let app = app().await;
    let thread = body_json(
        app.clone()
            .oneshot(post_json("/api/threads", serde_json::json!({"topic": "flow"})))
            .await
            .unwrap(),
    )
    .await;
    let tid = thread["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/threads/{}/state", tid),
            serde_json::json!({"state": "implement"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/threads/{}/state", tid),
            serde_json::json!({"state": "bogus"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/threads/{}/close", tid),
            serde_json::json!({"summary": "done"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Closed is terminal for set-state.
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/threads/{}/state", tid),
            serde_json::json!({"state": "discuss"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let fetched = body_json(app.clone().oneshot(get(&format!("/api/threads/{}", tid))).await.unwrap()).await;
    assert_eq!(fetched["status"], "closed");
    assert_eq!(fetched["summary"], "done");
}

#[tokio::test]
async fn test_archive_unarchive_round_trip() {
    let app = app().await;
    let thread = body_json(
        app.clone()
            .oneshot(post_json("/api/threads", serde_json::json!({"topic": "arch"})))
            .await
            .unwrap(),
    )
    .await;
    let tid = thread["id"].as_str().unwrap().to_string();

    app.clone()
        .oneshot(post_json(
            &format!("/api/threads/{}/state", tid),
            serde_json::json!({"state": "review"}),
        ))
        .await
        .unwrap();
    app.clone()
        .oneshot(post_json(&format!("/api/threads/{}/archive", tid), serde_json::json!({})))
        .await
        .unwrap();

    let fetched = body_json(app.clone().oneshot(get(&format!("/api/threads/{}", tid))).await.unwrap()).await;
    assert_eq!(fetched["status"], "archived");
    assert_eq!(fetched["prior_status"], "review");

    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/threads/{}/unarchive", tid),
            serde_json::json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let fetched = body_json(app.clone().oneshot(get(&format!("/api/threads/{}", tid))).await.unwrap()).await;
    assert_eq!(fetched["status"], "review");
}

#[tokio::test]
async fn test_thread_delete_then_404() {
    let app = app().await;
    let thread = body_json(
        app.clone()
            .oneshot(post_json("/api/threads", serde_json::json!({"topic": "gone"})))
            .await
            .unwrap(),
    )
    .await;
    let tid = thread["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(delete(&format!("/api/threads/{}", tid)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(get(&format!("/api/threads/{}", tid)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_agent_register_heartbeat_and_token_enforcement() {
    let app = app().await;

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/agents/register",
            serde_json::json!({"ide": "Cursor", "model": "GPT-4"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let registered = body_json(response).await;
    let agent_id = registered["agent_id"].as_str().unwrap().to_string();
    let token = registered["token"].as_str().unwrap().to_string();
    assert_eq!(registered["name"], "Cursor (GPT-4)");

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/agents/heartbeat",
            serde_json::json!({"agent_id": agent_id, "token": token}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/agents/heartbeat",
            serde_json::json!({"agent_id": agent_id, "token": "wrong"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(response).await;
    assert_eq!(body["kind"], "unauthorized");

    // The roster never exposes tokens.
    let agents = body_json(app.clone().oneshot(get("/api/agents")).await.unwrap()).await;
    let agent = &agents.as_array().unwrap()[0];
    assert_eq!(agent["is_online"], true);
    assert!(agent.get("token").is_none());
}

#[tokio::test]
async fn test_list_threads_status_filter() {
    let app = app().await;
    for topic in ["a", "b"] {
        app.clone()
            .oneshot(post_json("/api/threads", serde_json::json!({"topic": topic})))
            .await
            .unwrap();
    }
    let threads = body_json(
        app.clone()
            .oneshot(get("/api/threads?status=discuss"))
            .await
            .unwrap(),
    )
    .await;
    assert_eq!(threads.as_array().unwrap().len(), 2);

    let threads = body_json(
        app.clone()
            .oneshot(get("/api/threads?status=closed"))
            .await
            .unwrap(),
    )
    .await;
    assert!(threads.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_invite_unknown_agent_400() {
    let app = app().await;
    let thread = body_json(
        app.clone()
            .oneshot(post_json("/api/threads", serde_json::json!({"topic": "inv"})))
            .await
            .unwrap(),
    )
    .await;
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/agents/invite",
            serde_json::json!({"agent_name": "ghost", "thread_id": thread["id"]}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_settings_exposes_no_secrets() {
    let response = app().await.oneshot(get("/api/settings")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["port"], 39765);
    assert_eq!(body["heartbeat_timeout_secs"], 30);
    assert!(body.get("token").is_none());
}
