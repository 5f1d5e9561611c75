//! Storage traits for topics, channels, routings, messages and delivery logs.
//!
//! The delivery engine and the management services only talk to these traits,
//! so the in-memory and PostgreSQL backends are interchangeable.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{
    Channel, DeliveryLog, DomainError, Message, MessageStatus, NewChannel, NewDeliveryLog,
    NewMessage, NewRouting, NewTopic, Routing, Topic,
};

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested record does not exist (or was soft-deleted)
    #[error("{entity} not found: {key}")]
    NotFound { entity: &'static str, key: String },

    /// A uniqueness constraint was violated
    #[error("{entity} already exists: {key}")]
    Conflict { entity: &'static str, key: String },

    /// PostgreSQL operation failed
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A stored value could not be interpreted
    #[error("Corrupt record: {0}")]
    Corrupt(#[from] DomainError),
}

impl StoreError {
    pub fn not_found(entity: &'static str, key: impl ToString) -> Self {
        StoreError::NotFound {
            entity,
            key: key.to_string(),
        }
    }

    pub fn conflict(entity: &'static str, key: impl ToString) -> Self {
        StoreError::Conflict {
            entity,
            key: key.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait TopicRepository: Send + Sync {
    /// Insert a topic. Fails with `Conflict` if the webhook key is taken.
    async fn create_topic(&self, topic: NewTopic) -> StoreResult<Topic>;

    async fn find_topic(&self, id: i64) -> StoreResult<Topic>;

    async fn find_topic_by_webhook_key(&self, webhook_key: &str) -> StoreResult<Topic>;

    async fn list_topics_by_user(&self, user_id: i64) -> StoreResult<Vec<Topic>>;

    /// Update name, description, strategy and mode. The webhook key is left untouched.
    async fn update_topic(&self, topic: &Topic) -> StoreResult<Topic>;

    async fn soft_delete_topic(&self, id: i64) -> StoreResult<()>;

    /// Whether any topic, deleted or not, holds this key
    async fn webhook_key_exists(&self, webhook_key: &str) -> StoreResult<bool>;

    /// Atomically swap a topic's webhook key
    async fn replace_webhook_key(&self, id: i64, webhook_key: &str) -> StoreResult<Topic>;
}

#[async_trait]
pub trait ChannelRepository: Send + Sync {
    async fn create_channel(&self, channel: NewChannel) -> StoreResult<Channel>;

    async fn find_channel(&self, id: i64) -> StoreResult<Channel>;

    async fn list_channels_by_user(&self, user_id: i64) -> StoreResult<Vec<Channel>>;

    /// Update name, type and credentials
    async fn update_channel(&self, channel: &Channel) -> StoreResult<Channel>;

    async fn soft_delete_channel(&self, id: i64) -> StoreResult<()>;
}

#[async_trait]
pub trait RoutingRepository: Send + Sync {
    /// Insert a routing. Fails with `Conflict` if the pair already exists.
    async fn create_routing(&self, routing: NewRouting) -> StoreResult<Routing>;

    async fn find_routing(&self, topic_id: i64, channel_id: i64) -> StoreResult<Routing>;

    /// Routings of a topic in insertion order
    async fn list_routings_by_topic(&self, topic_id: i64) -> StoreResult<Vec<Routing>>;

    async fn list_routings_by_channel(&self, channel_id: i64) -> StoreResult<Vec<Routing>>;

    /// Update priority, variable mappings and template
    async fn update_routing(&self, routing: &Routing) -> StoreResult<Routing>;

    async fn delete_routing(&self, topic_id: i64, channel_id: i64) -> StoreResult<()>;
}

#[async_trait]
pub trait MessageRepository: Send + Sync {
    /// Insert a message with status `pending`
    async fn create_message(&self, message: NewMessage) -> StoreResult<Message>;

    async fn find_message(&self, id: i64) -> StoreResult<Message>;

    async fn update_message_status(&self, id: i64, status: MessageStatus) -> StoreResult<()>;

    /// Newest first
    async fn list_messages_by_topic(
        &self,
        topic_id: i64,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<Message>>;

    async fn count_messages_by_topic(&self, topic_id: i64) -> StoreResult<i64>;
}

#[async_trait]
pub trait DeliveryLogRepository: Send + Sync {
    async fn append_delivery_log(&self, log: NewDeliveryLog) -> StoreResult<DeliveryLog>;

    /// Attempt order (oldest first)
    async fn list_delivery_logs_by_message(&self, message_id: i64)
        -> StoreResult<Vec<DeliveryLog>>;
}

/// Everything the service needs from persistence.
pub trait Store:
    TopicRepository + ChannelRepository + RoutingRepository + MessageRepository + DeliveryLogRepository
{
    /// Backend type identifier
    fn backend_type(&self) -> &'static str;
}
