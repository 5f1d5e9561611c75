//! Message processing: load routes, apply the topic's strategy, deliver, record.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use thiserror::Error;

use crate::credentials::{decode_credentials, ChannelConfig, CredentialError};
use crate::domain::{ChannelKind, DomainError, Message, MessageStatus, Routing};
use crate::metrics::DeliveryMetrics;
use crate::repository::{Store, StoreError};
use crate::template::{extract_variables, render_template, TemplateError};
use crate::transport::{ChannelTransport, DeliveryPayload, TransportError, TransportRegistry};

use super::log_writer::DeliveryLogWriter;
use super::strategy::{final_status, plan_attempts, should_continue};

/// Errors that end a processing run before or instead of any delivery.
#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Message not found: {0}")]
    MessageNotFound(i64),

    #[error("Topic {topic_id} unavailable: {source}")]
    TopicUnavailable {
        topic_id: i64,
        #[source]
        source: StoreError,
    },

    #[error("Routes for topic {topic_id} unavailable: {source}")]
    RoutesUnavailable {
        topic_id: i64,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    UnsupportedStrategy(#[from] DomainError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Why a single route failed. The text ends up in the delivery log.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("Channel {channel_id} unavailable: {source}")]
    ChannelUnavailable {
        channel_id: i64,
        #[source]
        source: StoreError,
    },

    #[error(transparent)]
    UnsupportedChannel(#[from] DomainError),

    #[error(transparent)]
    Credentials(#[from] CredentialError),

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("No transport registered for {0}")]
    NoTransport(ChannelKind),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Result of one processing run
#[derive(Debug, Clone, Serialize)]
pub struct ProcessOutcome {
    pub message_id: i64,
    pub status: MessageStatus,
    /// Routes actually attempted
    pub attempts: usize,
    pub succeeded: usize,
}

/// Everything a route needs before its transport is called
struct PreparedDelivery {
    kind: ChannelKind,
    config: ChannelConfig,
    transport: Arc<dyn ChannelTransport>,
    /// Empty when the transport never sends the template
    rendered: String,
}

/// Runs the delivery state machine for one message at a time.
pub struct MessageProcessor {
    store: Arc<dyn Store>,
    transports: Arc<TransportRegistry>,
    log_writer: DeliveryLogWriter,
    attempt_timeout: Duration,
}

impl MessageProcessor {
    pub fn new(
        store: Arc<dyn Store>,
        transports: Arc<TransportRegistry>,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            log_writer: DeliveryLogWriter::new(store.clone()),
            store,
            transports,
            attempt_timeout,
        }
    }

    /// Channel kinds this processor can deliver to
    pub fn transport_kinds(&self) -> Vec<ChannelKind> {
        self.transports.kinds()
    }

    /// Process a message: `pending -> processing -> completed | partial | failed`.
    ///
    /// May be called again for the same message; each run appends its own
    /// delivery log rows.
    #[tracing::instrument(skip(self))]
    pub async fn process(&self, message_id: i64) -> Result<ProcessOutcome, ProcessError> {
        let message = self.store.find_message(message_id).await.map_err(|e| {
            if e.is_not_found() {
                ProcessError::MessageNotFound(message_id)
            } else {
                ProcessError::Store(e)
            }
        })?;

        self.store
            .update_message_status(message_id, MessageStatus::Processing)
            .await?;

        let topic = match self.store.find_topic(message.topic_id).await {
            Ok(topic) => topic,
            Err(source) => {
                self.mark_failed(message_id).await;
                return Err(ProcessError::TopicUnavailable {
                    topic_id: message.topic_id,
                    source,
                });
            }
        };

        let routings = match self.store.list_routings_by_topic(topic.id).await {
            Ok(routings) => routings,
            Err(source) => {
                self.mark_failed(message_id).await;
                return Err(ProcessError::RoutesUnavailable {
                    topic_id: topic.id,
                    source,
                });
            }
        };

        if routings.is_empty() {
            tracing::debug!(topic_id = topic.id, "Topic has no routes");
            self.finish(message_id, MessageStatus::Completed).await?;
            return Ok(ProcessOutcome {
                message_id,
                status: MessageStatus::Completed,
                attempts: 0,
                succeeded: 0,
            });
        }

        let strategy = match topic.strategy() {
            Ok(strategy) => strategy,
            Err(e) => {
                tracing::warn!(topic_id = topic.id, error = %e, "Cannot deliver message");
                self.mark_failed(message_id).await;
                return Err(ProcessError::UnsupportedStrategy(e));
            }
        };

        let plan = plan_attempts(strategy, routings);
        let total = plan.len();
        let mut attempts = 0;
        let mut succeeded = 0;

        for routing in &plan {
            attempts += 1;
            let delivered = self.attempt(&message, routing).await;
            if delivered {
                succeeded += 1;
            }
            if !should_continue(strategy, delivered) {
                break;
            }
        }

        let status = final_status(strategy, total, succeeded);
        self.finish(message_id, status).await?;

        tracing::info!(
            topic_id = topic.id,
            strategy = %strategy,
            attempts,
            succeeded,
            status = %status,
            "Message processed"
        );

        Ok(ProcessOutcome {
            message_id,
            status,
            attempts,
            succeeded,
        })
    }

    /// One route: prepare, send, record. Returns whether it succeeded.
    async fn attempt(&self, message: &Message, routing: &Routing) -> bool {
        let started = Instant::now();

        let (label, result) = match self.prepare(message, routing).await {
            Ok(prepared) => (
                prepared.kind.as_str(),
                self.dispatch(&prepared, &message.content).await,
            ),
            Err(e) => ("unknown", Err(e)),
        };

        DeliveryMetrics::record_attempt(label, result.is_ok(), started.elapsed());

        match result {
            Ok(()) => {
                self.log_writer
                    .record_success(message.id, routing.channel_id)
                    .await;
                true
            }
            Err(e) => {
                tracing::warn!(
                    message_id = message.id,
                    channel_id = routing.channel_id,
                    error = %e,
                    "Delivery attempt failed"
                );
                self.log_writer
                    .record_failure(message.id, routing.channel_id, &e.to_string())
                    .await;
                false
            }
        }
    }

    async fn prepare(
        &self,
        message: &Message,
        routing: &Routing,
    ) -> Result<PreparedDelivery, AttemptError> {
        let channel = self
            .store
            .find_channel(routing.channel_id)
            .await
            .map_err(|source| AttemptError::ChannelUnavailable {
                channel_id: routing.channel_id,
                source,
            })?;

        let kind: ChannelKind = channel.channel_type.parse()?;
        let config = decode_credentials(kind, &channel.credentials)?;

        let transport = self
            .transports
            .get(kind)
            .ok_or(AttemptError::NoTransport(kind))?;

        let rendered = if transport.renders_template() {
            let variables = extract_variables(&message.content, &routing.variable_mappings);
            render_template(&routing.message_template, &variables)?
        } else {
            String::new()
        };

        Ok(PreparedDelivery {
            kind,
            config,
            transport,
            rendered,
        })
    }

    async fn dispatch(
        &self,
        prepared: &PreparedDelivery,
        content: &serde_json::Value,
    ) -> Result<(), AttemptError> {
        let payload = DeliveryPayload {
            rendered: &prepared.rendered,
            content,
        };

        match tokio::time::timeout(
            self.attempt_timeout,
            prepared.transport.send(&prepared.config, &payload),
        )
        .await
        {
            Ok(result) => Ok(result?),
            Err(_) => Err(TransportError::Timeout(self.attempt_timeout).into()),
        }
    }

    async fn finish(&self, message_id: i64, status: MessageStatus) -> Result<(), StoreError> {
        self.store.update_message_status(message_id, status).await?;
        DeliveryMetrics::record_processed(status);
        Ok(())
    }

    /// Best effort: the run is already failing for another reason
    async fn mark_failed(&self, message_id: i64) {
        if let Err(e) = self.finish(message_id, MessageStatus::Failed).await {
            tracing::error!(message_id, error = %e, "Failed to mark message as failed");
        }
    }
}
