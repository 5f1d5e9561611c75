//! HTTP surface tests
//!
//! Requests are driven through the full router with `tower::ServiceExt`,
//! over the in-memory store. Channels are mostly Slack, which needs no network.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower::ServiceExt;

use synapse_notification_service::auth::Claims;
use synapse_notification_service::config::{
    DatabaseConfig, DeliveryConfig, JwtConfig, ServerConfig, Settings,
};
use synapse_notification_service::domain::MessageStatus;
use synapse_notification_service::repository::{MemoryStore, Store};
use synapse_notification_service::server::{create_app, AppState};
use synapse_notification_service::transport::TransportRegistry;

const SECRET: &str = "integration-test-secret";

fn test_settings() -> Settings {
    Settings {
        server: ServerConfig::default(),
        database: DatabaseConfig::default(),
        jwt: JwtConfig {
            secret: SECRET.to_string(),
            issuer: None,
            audience: None,
        },
        delivery: DeliveryConfig {
            attempt_timeout_seconds: 2,
            workers: 2,
            queue_capacity: 16,
            ..DeliveryConfig::default()
        },
    }
}

fn create_test_app() -> (Router, Arc<dyn Store>) {
    let settings = test_settings();
    let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
    let transports = TransportRegistry::with_defaults(&settings.delivery).unwrap();

    let state = AppState::new(settings, store.clone(), transports, None);
    (create_app(state), store)
}

fn token_for(user_id: i64) -> String {
    let now = chrono::Utc::now().timestamp();
    let claims = Claims {
        sub: user_id.to_string(),
        exp: now + 3600,
        iat: now,
        extra: Default::default(),
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

async fn call(
    app: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

/// Topic with one Slack route, returns (topic id, webhook key)
async fn topic_with_route(app: &Router, token: &str, mode: &str) -> (i64, String) {
    let (status, topic) = call(
        app,
        "POST",
        "/api/topics",
        Some(token),
        Some(json!({"name": "alerts", "executionMode": mode})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, channel) = call(
        app,
        "POST",
        "/api/channels",
        Some(token),
        Some(json!({"name": "team", "type": "slack", "credentials": {}})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = call(
        app,
        "POST",
        "/api/routings",
        Some(token),
        Some(json!({
            "topicId": topic["id"],
            "channelId": channel["id"],
            "priority": 1,
            "messageTemplate": "{{.msg}}"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    (
        topic["id"].as_i64().unwrap(),
        topic["webhookKey"].as_str().unwrap().to_string(),
    )
}

#[tokio::test]
async fn test_management_requires_token() {
    let (app, _) = create_test_app();

    let (status, body) = call(&app, "GET", "/api/topics", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let (status, _) = call(&app, "GET", "/api/topics", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_sync_webhook_returns_terminal_status() {
    let (app, _) = create_test_app();
    let token = token_for(1);
    let (topic_id, key) = topic_with_route(&app, &token, "sync").await;

    let (status, ack) = call(
        &app,
        "POST",
        &format!("/webhook/{}", key),
        None,
        Some(json!({"msg": "hello"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["status"], "completed");
    assert_eq!(ack["topic"], "alerts");
    let message_id = ack["message_id"].as_i64().unwrap();

    let (status, page) = call(
        &app,
        "GET",
        &format!("/api/topics/{}/messages", topic_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["total"], 1);
    assert_eq!(page["messages"][0]["content"]["msg"], "hello");

    let (status, detail) = call(
        &app,
        "GET",
        &format!("/api/messages/{}", message_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["message"]["status"], "completed");
    assert_eq!(detail["deliveryLogs"].as_array().unwrap().len(), 1);
    assert_eq!(detail["deliveryLogs"][0]["status"], "success");
}

#[tokio::test]
async fn test_async_webhook_is_processed_in_background() {
    let (app, store) = create_test_app();
    let token = token_for(1);
    let (_, key) = topic_with_route(&app, &token, "async").await;

    let (status, ack) = call(
        &app,
        "POST",
        &format!("/webhook/{}", key),
        None,
        Some(json!({"msg": "later"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ack["status"], "received");
    let message_id = ack["message_id"].as_i64().unwrap();

    let mut status = MessageStatus::Pending;
    for _ in 0..200 {
        status = store.find_message(message_id).await.unwrap().status;
        if status.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(status, MessageStatus::Completed);
}

/// Endpoint that answers each delivery after a delay, returns its base URL
async fn start_slow_endpoint(delay: Duration) -> String {
    let app = Router::new().fallback(move || async move {
        tokio::time::sleep(delay).await;
        StatusCode::OK
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

#[tokio::test]
async fn test_sync_webhook_finishes_after_client_disconnects() {
    let (app, store) = create_test_app();
    let token = token_for(1);
    let base_url = start_slow_endpoint(Duration::from_millis(400)).await;

    let (_, topic) = call(
        &app,
        "POST",
        "/api/topics",
        Some(&token),
        Some(json!({"name": "deploys", "sendingStrategy": "all", "executionMode": "sync"})),
    )
    .await;
    let topic_id = topic["id"].as_i64().unwrap();

    for name in ["first", "second"] {
        let (status, channel) = call(
            &app,
            "POST",
            "/api/channels",
            Some(&token),
            Some(json!({
                "name": name,
                "type": "webhook",
                "credentials": {"url": format!("{}/{}", base_url, name)}
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _) = call(
            &app,
            "POST",
            "/api/routings",
            Some(&token),
            Some(json!({"topicId": topic_id, "channelId": channel["id"], "priority": 0})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    // The caller gives up while the first delivery is still in flight
    let request = Request::builder()
        .method("POST")
        .uri(format!("/webhook/{}", topic["webhookKey"].as_str().unwrap()))
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(json!({"event": "deploy"}).to_string()))
        .unwrap();
    let dropped = tokio::time::timeout(Duration::from_millis(150), app.clone().oneshot(request)).await;
    assert!(dropped.is_err());

    let mut message = None;
    for _ in 0..250 {
        let messages = store.list_messages_by_topic(topic_id, 10, 0).await.unwrap();
        if let Some(m) = messages.into_iter().next() {
            if m.status.is_terminal() {
                message = Some(m);
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    let message = message.expect("message never reached a terminal status");
    assert_eq!(message.status, MessageStatus::Completed);
    let logs = store.list_delivery_logs_by_message(message.id).await.unwrap();
    assert_eq!(logs.len(), 2);
}

#[tokio::test]
async fn test_webhook_rejects_unknown_key_and_bad_body() {
    let (app, _) = create_test_app();
    let token = token_for(1);
    let (_, key) = topic_with_route(&app, &token, "sync").await;

    let (status, _) = call(&app, "POST", "/webhook/nope", None, Some(json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = call(
        &app,
        "POST",
        &format!("/webhook/{}", key),
        None,
        Some(json!([1, 2, 3])),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_regenerated_key_replaces_old_one() {
    let (app, _) = create_test_app();
    let token = token_for(1);
    let (topic_id, old_key) = topic_with_route(&app, &token, "sync").await;

    let (status, topic) = call(
        &app,
        "POST",
        &format!("/api/topics/{}/regenerate-key", topic_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let new_key = topic["webhookKey"].as_str().unwrap().to_string();
    assert_ne!(new_key, old_key);

    let (status, _) = call(&app, "GET", &format!("/webhook/{}/info", old_key), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, info) =
        call(&app, "GET", &format!("/webhook/{}/info", new_key), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(info["id"], topic_id);
}

#[tokio::test]
async fn test_channel_validation_and_listing() {
    let (app, _) = create_test_app();
    let token = token_for(1);

    let (status, body) = call(
        &app,
        "POST",
        "/api/channels",
        Some(&token),
        Some(json!({"name": "bot", "type": "telegram", "credentials": {"botToken": "t"}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"]["message"].as_str().unwrap().contains("chatId"));

    let (status, _) = call(
        &app,
        "POST",
        "/api/channels",
        Some(&token),
        Some(json!({"name": "bot", "type": "telegram", "credentials": {"botToken": "t", "chatId": "1"}})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, list) = call(&app, "GET", "/api/channels", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["type"], "telegram");
    assert!(list[0].get("credentials").is_none());
}

#[tokio::test]
async fn test_other_users_cannot_touch_topic() {
    let (app, _) = create_test_app();
    let (topic_id, _) = topic_with_route(&app, &token_for(1), "sync").await;

    let intruder = token_for(2);
    let (status, _) = call(
        &app,
        "GET",
        &format!("/api/topics/{}", topic_id),
        Some(&intruder),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = call(
        &app,
        "DELETE",
        &format!("/api/topics/{}", topic_id),
        Some(&intruder),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_health_and_metrics() {
    let (app, _) = create_test_app();
    let token = token_for(1);
    let (_, key) = topic_with_route(&app, &token, "async").await;
    call(&app, "POST", &format!("/webhook/{}", key), None, Some(json!({}))).await;

    let (status, health) = call(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["store"]["backend"], "memory");
    assert_eq!(health["delivery"]["transports"].as_array().unwrap().len(), 4);

    let response = app
        .clone()
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("synapse_webhooks_received_total"));
}
