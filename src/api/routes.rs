use axum::{
    routing::{get, post, put},
    Router,
};

use crate::server::AppState;

use super::channels::{
    channel_routings, create_channel, delete_channel, get_channel, list_channels, update_channel,
};
use super::health::health;
use super::messages::{get_message, topic_messages};
use super::metrics::prometheus_metrics;
use super::routings::{create_routing, delete_routing, update_routing};
use super::topics::{
    create_topic, delete_topic, get_topic, list_topics, regenerate_key, topic_routings,
    update_topic,
};
use super::webhook::{receive_webhook, webhook_info};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health & metrics
        .route("/health", get(health))
        .route("/metrics", get(prometheus_metrics))
        // Inbound webhooks, authenticated by the key itself
        .route("/webhook/{key}", post(receive_webhook))
        .route("/webhook/{key}/info", get(webhook_info))
        // Management API (bearer token)
        .nest(
            "/api",
            Router::new()
                .route("/topics", post(create_topic).get(list_topics))
                .route(
                    "/topics/{id}",
                    get(get_topic).put(update_topic).delete(delete_topic),
                )
                .route("/topics/{id}/regenerate-key", post(regenerate_key))
                .route("/topics/{id}/routings", get(topic_routings))
                .route("/topics/{id}/messages", get(topic_messages))
                .route("/channels", post(create_channel).get(list_channels))
                .route(
                    "/channels/{id}",
                    get(get_channel).put(update_channel).delete(delete_channel),
                )
                .route("/channels/{id}/routings", get(channel_routings))
                .route("/routings", post(create_routing))
                .route(
                    "/routings/{topic_id}/{channel_id}",
                    put(update_routing).delete(delete_routing),
                )
                .route("/messages/{id}", get(get_message)),
        )
}
