//! End-to-end delivery tests
//!
//! Messages go through the real `MessageProcessor` and the built-in HTTP
//! transports, which talk to a local capture server bound to 127.0.0.1:0.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri},
    Router,
};
use serde_json::{json, Map, Value};
use tokio::net::TcpListener;

use synapse_notification_service::config::DeliveryConfig;
use synapse_notification_service::delivery::{MessageProcessor, SUCCESS_RESPONSE};
use synapse_notification_service::domain::{
    ChannelKind, DeliveryStatus, ExecutionMode, MessageStatus, NewChannel, NewMessage, NewRouting, NewTopic,
    SendingStrategy,
};
use synapse_notification_service::repository::{
    ChannelRepository, DeliveryLogRepository, MemoryStore, MessageRepository, RoutingRepository,
    TopicRepository,
};
use synapse_notification_service::transport::TransportRegistry;

/// One request seen by the capture server
#[derive(Debug, Clone)]
struct Captured {
    method: Method,
    path: String,
    headers: HeaderMap,
    body: Value,
}

#[derive(Clone, Default)]
struct Sink {
    captured: Arc<Mutex<Vec<Captured>>>,
}

impl Sink {
    fn requests(&self) -> Vec<Captured> {
        self.captured.lock().unwrap().clone()
    }

    fn paths(&self) -> Vec<String> {
        self.requests().into_iter().map(|c| c.path).collect()
    }
}

/// Paths under `/fail` answer 500, everything else 200
async fn capture(
    State(sink): State<Sink>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let body = serde_json::from_slice(&body).unwrap_or(Value::Null);
    let path = uri.path().to_string();
    let failing = path.starts_with("/fail");

    sink.captured.lock().unwrap().push(Captured {
        method,
        path,
        headers,
        body,
    });

    if failing {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    }
}

async fn start_sink() -> (String, Sink) {
    let sink = Sink::default();
    let app = Router::new().fallback(capture).with_state(sink.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}", addr), sink)
}

struct TestEnvironment {
    store: Arc<MemoryStore>,
    processor: MessageProcessor,
    sink: Sink,
    base_url: String,
    topic_id: i64,
}

async fn create_test_environment(strategy: SendingStrategy) -> TestEnvironment {
    let (base_url, sink) = start_sink().await;

    let config = DeliveryConfig {
        attempt_timeout_seconds: 5,
        telegram_api_base: base_url.clone(),
        ..DeliveryConfig::default()
    };
    let registry = TransportRegistry::with_defaults(&config).unwrap();

    let store = Arc::new(MemoryStore::new());
    let topic = store
        .create_topic(NewTopic {
            user_id: 1,
            name: "alerts".to_string(),
            description: String::new(),
            webhook_key: "integration-key".to_string(),
            sending_strategy: strategy,
            execution_mode: ExecutionMode::Sync,
        })
        .await
        .unwrap();

    let processor = MessageProcessor::new(
        store.clone(),
        Arc::new(registry),
        config.attempt_timeout(),
    );

    TestEnvironment {
        store,
        processor,
        sink,
        base_url,
        topic_id: topic.id,
    }
}

impl TestEnvironment {
    async fn route(
        &self,
        kind: ChannelKind,
        credentials: Value,
        priority: i32,
        mappings: Value,
        template: &str,
    ) -> i64 {
        let channel = self
            .store
            .create_channel(NewChannel {
                user_id: 1,
                name: format!("{}-{}", kind, priority),
                kind,
                credentials,
            })
            .await
            .unwrap();

        let variable_mappings: Map<String, Value> = match mappings {
            Value::Object(map) => map,
            _ => Map::new(),
        };

        self.store
            .create_routing(NewRouting {
                topic_id: self.topic_id,
                channel_id: channel.id,
                priority,
                variable_mappings,
                message_template: template.to_string(),
            })
            .await
            .unwrap();

        channel.id
    }

    async fn webhook_route(&self, path: &str, priority: i32) -> i64 {
        self.route(
            ChannelKind::Webhook,
            json!({ "url": format!("{}{}", self.base_url, path) }),
            priority,
            json!({}),
            "",
        )
        .await
    }

    async fn message(&self, content: Value) -> i64 {
        self.store
            .create_message(NewMessage {
                topic_id: self.topic_id,
                content,
            })
            .await
            .unwrap()
            .id
    }
}

#[tokio::test]
async fn test_broadcast_two_of_three_is_partial() {
    let env = create_test_environment(SendingStrategy::All).await;
    env.webhook_route("/ok/a", 0).await;
    env.webhook_route("/fail/b", 0).await;
    env.webhook_route("/ok/c", 0).await;

    let message_id = env.message(json!({"event": "deploy"})).await;
    let outcome = env.processor.process(message_id).await.unwrap();

    assert_eq!(outcome.status, MessageStatus::Partial);
    assert_eq!(outcome.attempts, 3);
    assert_eq!(outcome.succeeded, 2);

    let logs = env
        .store
        .list_delivery_logs_by_message(message_id)
        .await
        .unwrap();
    let statuses: Vec<DeliveryStatus> = logs.iter().map(|l| l.status).collect();
    assert_eq!(
        statuses,
        vec![
            DeliveryStatus::Success,
            DeliveryStatus::Failed,
            DeliveryStatus::Success
        ]
    );
    assert_eq!(logs[0].response, SUCCESS_RESPONSE);
    assert!(logs[1].response.contains("500"));

    assert_eq!(env.sink.paths(), vec!["/ok/a", "/fail/b", "/ok/c"]);
    assert_eq!(
        env.store.find_message(message_id).await.unwrap().status,
        MessageStatus::Partial
    );
}

#[tokio::test]
async fn test_broadcast_with_every_route_failing_is_failed() {
    let env = create_test_environment(SendingStrategy::All).await;
    env.webhook_route("/fail/a", 0).await;
    env.webhook_route("/fail/b", 0).await;
    env.webhook_route("/fail/c", 0).await;

    let message_id = env.message(json!({"event": "outage"})).await;
    let outcome = env.processor.process(message_id).await.unwrap();

    assert_eq!(outcome.status, MessageStatus::Failed);
    assert_eq!(outcome.attempts, 3);
    assert_eq!(outcome.succeeded, 0);

    let logs = env
        .store
        .list_delivery_logs_by_message(message_id)
        .await
        .unwrap();
    assert_eq!(logs.len(), 3);
    assert!(logs.iter().all(|l| l.status == DeliveryStatus::Failed));

    assert_eq!(env.sink.paths(), vec!["/fail/a", "/fail/b", "/fail/c"]);
    assert_eq!(
        env.store.find_message(message_id).await.unwrap().status,
        MessageStatus::Failed
    );
}

#[tokio::test]
async fn test_failover_moves_to_next_priority() {
    let env = create_test_environment(SendingStrategy::Failover).await;
    let b = env.webhook_route("/ok/b", 5).await;
    let a = env.webhook_route("/fail/a", 10).await;

    let message_id = env.message(json!({"n": 1})).await;
    let outcome = env.processor.process(message_id).await.unwrap();

    assert_eq!(outcome.status, MessageStatus::Completed);
    assert_eq!(env.sink.paths(), vec!["/fail/a", "/ok/b"]);

    let logs = env
        .store
        .list_delivery_logs_by_message(message_id)
        .await
        .unwrap();
    let rows: Vec<(i64, DeliveryStatus)> = logs.iter().map(|l| (l.channel_id, l.status)).collect();
    assert_eq!(
        rows,
        vec![(a, DeliveryStatus::Failed), (b, DeliveryStatus::Success)]
    );
}

#[tokio::test]
async fn test_zero_routes_completes_without_logs() {
    let env = create_test_environment(SendingStrategy::All).await;

    let message_id = env.message(json!({})).await;
    let outcome = env.processor.process(message_id).await.unwrap();

    assert_eq!(outcome.status, MessageStatus::Completed);
    assert!(env
        .store
        .list_delivery_logs_by_message(message_id)
        .await
        .unwrap()
        .is_empty());
    assert!(env.sink.requests().is_empty());
}

#[tokio::test]
async fn test_email_without_password_fails_before_sending() {
    let env = create_test_environment(SendingStrategy::All).await;
    env.route(
        ChannelKind::Email,
        json!({
            "smtpHost": "127.0.0.1",
            "smtpPort": 1,
            "smtpUsername": "bot",
            "smtpPassword": "",
            "sender": "bot@example.com",
            "to": "ops@example.com"
        }),
        0,
        json!({}),
        "",
    )
    .await;

    let message_id = env.message(json!({"alert": "disk"})).await;
    let outcome = tokio_test::assert_ok!(env.processor.process(message_id).await);

    assert_eq!(outcome.status, MessageStatus::Failed);
    let logs = env
        .store
        .list_delivery_logs_by_message(message_id)
        .await
        .unwrap();
    assert_eq!(logs.len(), 1);
    assert_eq!(logs[0].status, DeliveryStatus::Failed);
    assert!(logs[0].response.contains("smtpPassword"));
}

#[tokio::test]
async fn test_telegram_receives_rendered_template() {
    let env = create_test_environment(SendingStrategy::All).await;
    env.route(
        ChannelKind::Telegram,
        json!({"botToken": "123:abc", "chatId": "-100", "parseMode": "HTML"}),
        0,
        json!({"host": "$.server.host", "missing": "$.nope"}),
        "Host {{.host}} is down{{.missing}}",
    )
    .await;

    let message_id = env
        .message(json!({"server": {"host": "db-1"}}))
        .await;
    let outcome = env.processor.process(message_id).await.unwrap();
    assert_eq!(outcome.status, MessageStatus::Completed);

    let requests = env.sink.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, Method::POST);
    assert_eq!(requests[0].path, "/bot123:abc/sendMessage");
    assert_eq!(
        requests[0].body,
        json!({"chat_id": "-100", "text": "Host db-1 is down", "parse_mode": "HTML"})
    );
}

#[tokio::test]
async fn test_webhook_forwards_raw_content() {
    let env = create_test_environment(SendingStrategy::All).await;
    env.route(
        ChannelKind::Webhook,
        json!({
            "url": format!("{}/ok/hook", env.base_url),
            "method": "put",
            "headers": {"X-Token": "secret"}
        }),
        0,
        json!({}),
        "ignored by webhooks {{.x}}",
    )
    .await;

    let content = json!({"event": "build", "ok": true});
    let message_id = env.message(content.clone()).await;
    env.processor.process(message_id).await.unwrap();

    let requests = env.sink.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, Method::PUT);
    assert_eq!(requests[0].body, content);
    assert_eq!(requests[0].headers["x-token"], "secret");
    assert_eq!(requests[0].headers["content-type"], "application/json");
}

#[tokio::test]
async fn test_unreachable_endpoint_is_logged_as_failure() {
    let env = create_test_environment(SendingStrategy::All).await;

    // Bind then drop to get a port nothing listens on
    let closed = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = closed.local_addr().unwrap();
    drop(closed);

    env.route(
        ChannelKind::Webhook,
        json!({ "url": format!("http://{}/hook", addr) }),
        0,
        json!({}),
        "",
    )
    .await;

    let message_id = env.message(json!({})).await;
    let outcome = tokio::time::timeout(
        Duration::from_secs(10),
        env.processor.process(message_id),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(outcome.status, MessageStatus::Failed);
    let logs = env
        .store
        .list_delivery_logs_by_message(message_id)
        .await
        .unwrap();
    assert_eq!(logs.len(), 1);
    assert_ne!(logs[0].response, SUCCESS_RESPONSE);
}
