//! In-memory store backend using DashMap.
//!
//! Data is lost on restart. Used as the default backend and as the store in tests.

use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use crate::domain::{
    Channel, DeliveryLog, Message, MessageStatus, NewChannel, NewDeliveryLog, NewMessage,
    NewRouting, NewTopic, Routing, Topic,
};

use super::backend::{
    ChannelRepository, DeliveryLogRepository, MessageRepository, RoutingRepository, Store,
    StoreError, StoreResult, TopicRepository,
};

/// A stored record plus its soft-delete flag
#[derive(Debug, Clone)]
struct Row<T> {
    record: T,
    deleted: bool,
}

impl<T> Row<T> {
    fn live(record: T) -> Self {
        Self {
            record,
            deleted: false,
        }
    }
}

/// A routing plus its insertion sequence number
#[derive(Debug, Clone)]
struct RoutingRow {
    sequence: i64,
    routing: Routing,
}

/// In-memory store backend.
pub struct MemoryStore {
    topics: DashMap<i64, Row<Topic>>,
    /// webhook key -> topic id, including soft-deleted topics
    webhook_keys: DashMap<String, i64>,
    channels: DashMap<i64, Row<Channel>>,
    routings: DashMap<(i64, i64), RoutingRow>,
    messages: DashMap<i64, Message>,
    delivery_logs: DashMap<i64, DeliveryLog>,
    next_id: AtomicI64,
    next_routing_sequence: AtomicI64,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            topics: DashMap::new(),
            webhook_keys: DashMap::new(),
            channels: DashMap::new(),
            routings: DashMap::new(),
            messages: DashMap::new(),
            delivery_logs: DashMap::new(),
            next_id: AtomicI64::new(1),
            next_routing_sequence: AtomicI64::new(1),
        }
    }

    fn allocate_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

#[async_trait]
impl TopicRepository for MemoryStore {
    async fn create_topic(&self, topic: NewTopic) -> StoreResult<Topic> {
        let id = self.allocate_id();

        match self.webhook_keys.entry(topic.webhook_key.clone()) {
            Entry::Occupied(_) => return Err(StoreError::conflict("webhook key", &topic.webhook_key)),
            Entry::Vacant(slot) => {
                slot.insert(id);
            }
        }

        let now = Utc::now();
        let record = Topic {
            id,
            user_id: topic.user_id,
            name: topic.name,
            description: topic.description,
            webhook_key: topic.webhook_key,
            sending_strategy: topic.sending_strategy.as_str().to_string(),
            execution_mode: topic.execution_mode.as_str().to_string(),
            created_at: now,
            updated_at: now,
        };

        self.topics.insert(id, Row::live(record.clone()));
        Ok(record)
    }

    async fn find_topic(&self, id: i64) -> StoreResult<Topic> {
        self.topics
            .get(&id)
            .filter(|row| !row.deleted)
            .map(|row| row.record.clone())
            .ok_or_else(|| StoreError::not_found("topic", id))
    }

    async fn find_topic_by_webhook_key(&self, webhook_key: &str) -> StoreResult<Topic> {
        let id = self
            .webhook_keys
            .get(webhook_key)
            .map(|entry| *entry.value())
            .ok_or_else(|| StoreError::not_found("topic", webhook_key))?;

        self.find_topic(id)
            .await
            .map_err(|_| StoreError::not_found("topic", webhook_key))
    }

    async fn list_topics_by_user(&self, user_id: i64) -> StoreResult<Vec<Topic>> {
        let mut topics: Vec<Topic> = self
            .topics
            .iter()
            .filter(|row| !row.deleted && row.record.user_id == user_id)
            .map(|row| row.record.clone())
            .collect();
        topics.sort_by_key(|t| t.id);
        Ok(topics)
    }

    async fn update_topic(&self, topic: &Topic) -> StoreResult<Topic> {
        let mut row = self
            .topics
            .get_mut(&topic.id)
            .filter(|row| !row.deleted)
            .ok_or_else(|| StoreError::not_found("topic", topic.id))?;

        let stored = &mut row.record;
        stored.name = topic.name.clone();
        stored.description = topic.description.clone();
        stored.sending_strategy = topic.sending_strategy.clone();
        stored.execution_mode = topic.execution_mode.clone();
        stored.updated_at = Utc::now();

        Ok(stored.clone())
    }

    async fn soft_delete_topic(&self, id: i64) -> StoreResult<()> {
        let mut row = self
            .topics
            .get_mut(&id)
            .filter(|row| !row.deleted)
            .ok_or_else(|| StoreError::not_found("topic", id))?;
        row.deleted = true;
        Ok(())
    }

    async fn webhook_key_exists(&self, webhook_key: &str) -> StoreResult<bool> {
        Ok(self.webhook_keys.contains_key(webhook_key))
    }

    async fn replace_webhook_key(&self, id: i64, webhook_key: &str) -> StoreResult<Topic> {
        if !self.topics.get(&id).is_some_and(|row| !row.deleted) {
            return Err(StoreError::not_found("topic", id));
        }

        match self.webhook_keys.entry(webhook_key.to_string()) {
            Entry::Occupied(_) => return Err(StoreError::conflict("webhook key", webhook_key)),
            Entry::Vacant(slot) => {
                slot.insert(id);
            }
        }

        let (old_key, updated) = {
            let Some(mut row) = self.topics.get_mut(&id) else {
                self.webhook_keys.remove(webhook_key);
                return Err(StoreError::not_found("topic", id));
            };
            let old_key = std::mem::replace(&mut row.record.webhook_key, webhook_key.to_string());
            row.record.updated_at = Utc::now();
            (old_key, row.record.clone())
        };

        self.webhook_keys.remove(&old_key);
        Ok(updated)
    }
}

#[async_trait]
impl ChannelRepository for MemoryStore {
    async fn create_channel(&self, channel: NewChannel) -> StoreResult<Channel> {
        let now = Utc::now();
        let record = Channel {
            id: self.allocate_id(),
            user_id: channel.user_id,
            name: channel.name,
            channel_type: channel.kind.as_str().to_string(),
            credentials: channel.credentials,
            created_at: now,
            updated_at: now,
        };

        self.channels.insert(record.id, Row::live(record.clone()));
        Ok(record)
    }

    async fn find_channel(&self, id: i64) -> StoreResult<Channel> {
        self.channels
            .get(&id)
            .filter(|row| !row.deleted)
            .map(|row| row.record.clone())
            .ok_or_else(|| StoreError::not_found("channel", id))
    }

    async fn list_channels_by_user(&self, user_id: i64) -> StoreResult<Vec<Channel>> {
        let mut channels: Vec<Channel> = self
            .channels
            .iter()
            .filter(|row| !row.deleted && row.record.user_id == user_id)
            .map(|row| row.record.clone())
            .collect();
        channels.sort_by_key(|c| c.id);
        Ok(channels)
    }

    async fn update_channel(&self, channel: &Channel) -> StoreResult<Channel> {
        let mut row = self
            .channels
            .get_mut(&channel.id)
            .filter(|row| !row.deleted)
            .ok_or_else(|| StoreError::not_found("channel", channel.id))?;

        let stored = &mut row.record;
        stored.name = channel.name.clone();
        stored.channel_type = channel.channel_type.clone();
        stored.credentials = channel.credentials.clone();
        stored.updated_at = Utc::now();

        Ok(stored.clone())
    }

    async fn soft_delete_channel(&self, id: i64) -> StoreResult<()> {
        let mut row = self
            .channels
            .get_mut(&id)
            .filter(|row| !row.deleted)
            .ok_or_else(|| StoreError::not_found("channel", id))?;
        row.deleted = true;
        Ok(())
    }
}

#[async_trait]
impl RoutingRepository for MemoryStore {
    async fn create_routing(&self, routing: NewRouting) -> StoreResult<Routing> {
        let key = (routing.topic_id, routing.channel_id);

        match self.routings.entry(key) {
            Entry::Occupied(_) => Err(StoreError::conflict(
                "routing",
                format!("{}/{}", routing.topic_id, routing.channel_id),
            )),
            Entry::Vacant(slot) => {
                let now = Utc::now();
                let record = Routing {
                    topic_id: routing.topic_id,
                    channel_id: routing.channel_id,
                    priority: routing.priority,
                    variable_mappings: routing.variable_mappings,
                    message_template: routing.message_template,
                    created_at: now,
                    updated_at: now,
                };
                slot.insert(RoutingRow {
                    sequence: self.next_routing_sequence.fetch_add(1, Ordering::Relaxed),
                    routing: record.clone(),
                });
                Ok(record)
            }
        }
    }

    async fn find_routing(&self, topic_id: i64, channel_id: i64) -> StoreResult<Routing> {
        self.routings
            .get(&(topic_id, channel_id))
            .map(|row| row.routing.clone())
            .ok_or_else(|| StoreError::not_found("routing", format!("{topic_id}/{channel_id}")))
    }

    async fn list_routings_by_topic(&self, topic_id: i64) -> StoreResult<Vec<Routing>> {
        let mut rows: Vec<RoutingRow> = self
            .routings
            .iter()
            .filter(|row| row.routing.topic_id == topic_id)
            .map(|row| row.value().clone())
            .collect();
        rows.sort_by_key(|row| row.sequence);
        Ok(rows.into_iter().map(|row| row.routing).collect())
    }

    async fn list_routings_by_channel(&self, channel_id: i64) -> StoreResult<Vec<Routing>> {
        let mut rows: Vec<RoutingRow> = self
            .routings
            .iter()
            .filter(|row| row.routing.channel_id == channel_id)
            .map(|row| row.value().clone())
            .collect();
        rows.sort_by_key(|row| row.sequence);
        Ok(rows.into_iter().map(|row| row.routing).collect())
    }

    async fn update_routing(&self, routing: &Routing) -> StoreResult<Routing> {
        let mut row = self
            .routings
            .get_mut(&(routing.topic_id, routing.channel_id))
            .ok_or_else(|| {
                StoreError::not_found(
                    "routing",
                    format!("{}/{}", routing.topic_id, routing.channel_id),
                )
            })?;

        let stored = &mut row.routing;
        stored.priority = routing.priority;
        stored.variable_mappings = routing.variable_mappings.clone();
        stored.message_template = routing.message_template.clone();
        stored.updated_at = Utc::now();

        Ok(stored.clone())
    }

    async fn delete_routing(&self, topic_id: i64, channel_id: i64) -> StoreResult<()> {
        self.routings
            .remove(&(topic_id, channel_id))
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found("routing", format!("{topic_id}/{channel_id}")))
    }
}

#[async_trait]
impl MessageRepository for MemoryStore {
    async fn create_message(&self, message: NewMessage) -> StoreResult<Message> {
        let now = Utc::now();
        let record = Message {
            id: self.allocate_id(),
            topic_id: message.topic_id,
            content: message.content,
            status: MessageStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        self.messages.insert(record.id, record.clone());
        Ok(record)
    }

    async fn find_message(&self, id: i64) -> StoreResult<Message> {
        self.messages
            .get(&id)
            .map(|m| m.clone())
            .ok_or_else(|| StoreError::not_found("message", id))
    }

    async fn update_message_status(&self, id: i64, status: MessageStatus) -> StoreResult<()> {
        let mut message = self
            .messages
            .get_mut(&id)
            .ok_or_else(|| StoreError::not_found("message", id))?;
        message.status = status;
        message.updated_at = Utc::now();
        Ok(())
    }

    async fn list_messages_by_topic(
        &self,
        topic_id: i64,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<Message>> {
        let mut messages: Vec<Message> = self
            .messages
            .iter()
            .filter(|m| m.topic_id == topic_id)
            .map(|m| m.clone())
            .collect();
        messages.sort_by(|a, b| b.id.cmp(&a.id));

        Ok(messages
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn count_messages_by_topic(&self, topic_id: i64) -> StoreResult<i64> {
        Ok(self.messages.iter().filter(|m| m.topic_id == topic_id).count() as i64)
    }
}

#[async_trait]
impl DeliveryLogRepository for MemoryStore {
    async fn append_delivery_log(&self, log: NewDeliveryLog) -> StoreResult<DeliveryLog> {
        let record = DeliveryLog {
            id: self.allocate_id(),
            message_id: log.message_id,
            channel_id: log.channel_id,
            status: log.status,
            response: log.response,
            created_at: Utc::now(),
        };

        self.delivery_logs.insert(record.id, record.clone());
        Ok(record)
    }

    async fn list_delivery_logs_by_message(
        &self,
        message_id: i64,
    ) -> StoreResult<Vec<DeliveryLog>> {
        let mut logs: Vec<DeliveryLog> = self
            .delivery_logs
            .iter()
            .filter(|log| log.message_id == message_id)
            .map(|log| log.clone())
            .collect();
        logs.sort_by_key(|log| log.id);
        Ok(logs)
    }
}

impl Store for MemoryStore {
    fn backend_type(&self) -> &'static str {
        "memory"
    }
}
