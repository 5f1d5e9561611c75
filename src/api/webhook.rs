//! Inbound webhook endpoints.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use serde::Serialize;
use serde_json::Value;

use crate::domain::{ExecutionMode, NewMessage, Topic};
use crate::error::{AppError, Result};
use crate::metrics::WebhookMetrics;
use crate::server::AppState;

/// Response to an accepted webhook call
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub message_id: i64,
    /// `received` for async topics, the terminal message status for sync ones
    pub status: String,
    pub topic: String,
}

/// POST /webhook/{key} - Accept a JSON payload for a topic
#[tracing::instrument(name = "http.receive_webhook", skip(state, payload))]
pub async fn receive_webhook(
    State(state): State<AppState>,
    Path(key): Path<String>,
    payload: std::result::Result<Json<Value>, JsonRejection>,
) -> Result<Json<WebhookAck>> {
    let topic = state.topics.find_by_webhook_key(&key).await?;

    let Json(content) =
        payload.map_err(|e| AppError::Validation(format!("Invalid JSON body: {}", e)))?;
    if !content.is_object() {
        return Err(AppError::Validation(
            "Webhook body must be a JSON object".to_string(),
        ));
    }

    let mode = topic
        .mode()
        .map_err(|e| AppError::Internal(format!("Topic {}: {}", topic.id, e)))?;

    let message = state
        .store
        .create_message(NewMessage {
            topic_id: topic.id,
            content,
        })
        .await?;

    WebhookMetrics::record_received(mode);
    tracing::info!(
        topic_id = topic.id,
        message_id = message.id,
        mode = %mode,
        "Webhook message received"
    );

    let status = match mode {
        ExecutionMode::Sync => {
            // Detached so a dropped connection cannot stop processing midway
            let processor = state.processor.clone();
            let message_id = message.id;
            let outcome = tokio::spawn(async move { processor.process(message_id).await })
                .await
                .map_err(|e| AppError::Internal(format!("Processing task failed: {}", e)))??;
            outcome.status.as_str().to_string()
        }
        ExecutionMode::Async => {
            // On a full queue the message stays pending
            state.worker_pool.submit(message.id).await?;
            "received".to_string()
        }
    };

    Ok(Json(WebhookAck {
        message_id: message.id,
        status,
        topic: topic.name,
    }))
}

/// GET /webhook/{key}/info - Topic behind a webhook key
#[tracing::instrument(name = "http.webhook_info", skip(state))]
pub async fn webhook_info(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<Topic>> {
    Ok(Json(state.topics.find_by_webhook_key(&key).await?))
}
