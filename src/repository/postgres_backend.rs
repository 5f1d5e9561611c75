//! PostgreSQL store backend.
//!
//! Table layout lives in `migrations/0001_init.sql`. Topics and channels are
//! soft-deleted through a `deleted_at` column; routings are hard-deleted and
//! keep an identity `sequence` column that preserves insertion order.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;

use crate::domain::{
    Channel, DeliveryLog, Message, MessageStatus, NewChannel, NewDeliveryLog, NewMessage,
    NewRouting, NewTopic, Routing, Topic,
};

use super::backend::{
    ChannelRepository, DeliveryLogRepository, MessageRepository, RoutingRepository, Store,
    StoreError, StoreResult, TopicRepository,
};

const UNIQUE_VIOLATION: &str = "23505";

type TopicRow = (
    i64,
    i64,
    String,
    String,
    String,
    String,
    String,
    DateTime<Utc>,
    DateTime<Utc>,
);

type ChannelRow = (i64, i64, String, String, Value, DateTime<Utc>, DateTime<Utc>);

type RoutingRow = (i64, i64, i32, Value, String, DateTime<Utc>, DateTime<Utc>);

type MessageRow = (i64, i64, Value, String, DateTime<Utc>, DateTime<Utc>);

type DeliveryLogRow = (i64, i64, i64, String, String, DateTime<Utc>);

const TOPIC_COLUMNS: &str = "id, user_id, name, description, webhook_key, sending_strategy, \
                             execution_mode, created_at, updated_at";

const CHANNEL_COLUMNS: &str = "id, user_id, name, type, credentials, created_at, updated_at";

const ROUTING_COLUMNS: &str = "topic_id, channel_id, priority, variable_mappings, \
                               message_template, created_at, updated_at";

const MESSAGE_COLUMNS: &str = "id, topic_id, content, status, created_at, updated_at";

/// PostgreSQL store backend.
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Map unique-constraint violations to `StoreError::Conflict`
fn conflict_or(err: sqlx::Error, entity: &'static str, key: impl ToString) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
            return StoreError::conflict(entity, key);
        }
    }
    StoreError::Postgres(err)
}

fn topic_from_row(row: TopicRow) -> Topic {
    let (
        id,
        user_id,
        name,
        description,
        webhook_key,
        sending_strategy,
        execution_mode,
        created_at,
        updated_at,
    ) = row;
    Topic {
        id,
        user_id,
        name,
        description,
        webhook_key,
        sending_strategy,
        execution_mode,
        created_at,
        updated_at,
    }
}

fn channel_from_row(row: ChannelRow) -> Channel {
    let (id, user_id, name, channel_type, credentials, created_at, updated_at) = row;
    Channel {
        id,
        user_id,
        name,
        channel_type,
        credentials,
        created_at,
        updated_at,
    }
}

fn routing_from_row(row: RoutingRow) -> Routing {
    let (topic_id, channel_id, priority, mappings, message_template, created_at, updated_at) = row;
    let variable_mappings = match mappings {
        Value::Object(map) => map,
        other => {
            tracing::warn!(
                topic_id,
                channel_id,
                value = %other,
                "Stored variable mappings are not an object, ignoring"
            );
            serde_json::Map::new()
        }
    };
    Routing {
        topic_id,
        channel_id,
        priority,
        variable_mappings,
        message_template,
        created_at,
        updated_at,
    }
}

fn message_from_row(row: MessageRow) -> StoreResult<Message> {
    let (id, topic_id, content, status, created_at, updated_at) = row;
    Ok(Message {
        id,
        topic_id,
        content,
        status: status.parse::<MessageStatus>()?,
        created_at,
        updated_at,
    })
}

fn delivery_log_from_row(row: DeliveryLogRow) -> StoreResult<DeliveryLog> {
    let (id, message_id, channel_id, status, response, created_at) = row;
    Ok(DeliveryLog {
        id,
        message_id,
        channel_id,
        status: status.parse()?,
        response,
        created_at,
    })
}

#[async_trait]
impl TopicRepository for PostgresStore {
    async fn create_topic(&self, topic: NewTopic) -> StoreResult<Topic> {
        let row: TopicRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO topics (user_id, name, description, webhook_key, sending_strategy, execution_mode)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {TOPIC_COLUMNS}
            "#
        ))
        .bind(topic.user_id)
        .bind(&topic.name)
        .bind(&topic.description)
        .bind(&topic.webhook_key)
        .bind(topic.sending_strategy.as_str())
        .bind(topic.execution_mode.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_or(e, "webhook key", &topic.webhook_key))?;

        Ok(topic_from_row(row))
    }

    async fn find_topic(&self, id: i64) -> StoreResult<Topic> {
        let row: Option<TopicRow> = sqlx::query_as(&format!(
            "SELECT {TOPIC_COLUMNS} FROM topics WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(topic_from_row)
            .ok_or_else(|| StoreError::not_found("topic", id))
    }

    async fn find_topic_by_webhook_key(&self, webhook_key: &str) -> StoreResult<Topic> {
        let row: Option<TopicRow> = sqlx::query_as(&format!(
            "SELECT {TOPIC_COLUMNS} FROM topics WHERE webhook_key = $1 AND deleted_at IS NULL"
        ))
        .bind(webhook_key)
        .fetch_optional(&self.pool)
        .await?;

        row.map(topic_from_row)
            .ok_or_else(|| StoreError::not_found("topic", webhook_key))
    }

    async fn list_topics_by_user(&self, user_id: i64) -> StoreResult<Vec<Topic>> {
        let rows: Vec<TopicRow> = sqlx::query_as(&format!(
            "SELECT {TOPIC_COLUMNS} FROM topics \
             WHERE user_id = $1 AND deleted_at IS NULL ORDER BY id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(topic_from_row).collect())
    }

    async fn update_topic(&self, topic: &Topic) -> StoreResult<Topic> {
        let row: Option<TopicRow> = sqlx::query_as(&format!(
            r#"
            UPDATE topics
            SET name = $2, description = $3, sending_strategy = $4, execution_mode = $5,
                updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {TOPIC_COLUMNS}
            "#
        ))
        .bind(topic.id)
        .bind(&topic.name)
        .bind(&topic.description)
        .bind(&topic.sending_strategy)
        .bind(&topic.execution_mode)
        .fetch_optional(&self.pool)
        .await?;

        row.map(topic_from_row)
            .ok_or_else(|| StoreError::not_found("topic", topic.id))
    }

    async fn soft_delete_topic(&self, id: i64) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE topics SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("topic", id));
        }
        Ok(())
    }

    async fn webhook_key_exists(&self, webhook_key: &str) -> StoreResult<bool> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM topics WHERE webhook_key = $1)")
                .bind(webhook_key)
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }

    async fn replace_webhook_key(&self, id: i64, webhook_key: &str) -> StoreResult<Topic> {
        let row: Option<TopicRow> = sqlx::query_as(&format!(
            r#"
            UPDATE topics SET webhook_key = $2, updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {TOPIC_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(webhook_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| conflict_or(e, "webhook key", webhook_key))?;

        row.map(topic_from_row)
            .ok_or_else(|| StoreError::not_found("topic", id))
    }
}

#[async_trait]
impl ChannelRepository for PostgresStore {
    async fn create_channel(&self, channel: NewChannel) -> StoreResult<Channel> {
        let row: ChannelRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO channels (user_id, name, type, credentials)
            VALUES ($1, $2, $3, $4)
            RETURNING {CHANNEL_COLUMNS}
            "#
        ))
        .bind(channel.user_id)
        .bind(&channel.name)
        .bind(channel.kind.as_str())
        .bind(&channel.credentials)
        .fetch_one(&self.pool)
        .await?;

        Ok(channel_from_row(row))
    }

    async fn find_channel(&self, id: i64) -> StoreResult<Channel> {
        let row: Option<ChannelRow> = sqlx::query_as(&format!(
            "SELECT {CHANNEL_COLUMNS} FROM channels WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(channel_from_row)
            .ok_or_else(|| StoreError::not_found("channel", id))
    }

    async fn list_channels_by_user(&self, user_id: i64) -> StoreResult<Vec<Channel>> {
        let rows: Vec<ChannelRow> = sqlx::query_as(&format!(
            "SELECT {CHANNEL_COLUMNS} FROM channels \
             WHERE user_id = $1 AND deleted_at IS NULL ORDER BY id"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(channel_from_row).collect())
    }

    async fn update_channel(&self, channel: &Channel) -> StoreResult<Channel> {
        let row: Option<ChannelRow> = sqlx::query_as(&format!(
            r#"
            UPDATE channels SET name = $2, type = $3, credentials = $4, updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            RETURNING {CHANNEL_COLUMNS}
            "#
        ))
        .bind(channel.id)
        .bind(&channel.name)
        .bind(&channel.channel_type)
        .bind(&channel.credentials)
        .fetch_optional(&self.pool)
        .await?;

        row.map(channel_from_row)
            .ok_or_else(|| StoreError::not_found("channel", channel.id))
    }

    async fn soft_delete_channel(&self, id: i64) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE channels SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("channel", id));
        }
        Ok(())
    }
}

#[async_trait]
impl RoutingRepository for PostgresStore {
    async fn create_routing(&self, routing: NewRouting) -> StoreResult<Routing> {
        let pair = format!("{}/{}", routing.topic_id, routing.channel_id);
        let row: RoutingRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO routings (topic_id, channel_id, priority, variable_mappings, message_template)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {ROUTING_COLUMNS}
            "#
        ))
        .bind(routing.topic_id)
        .bind(routing.channel_id)
        .bind(routing.priority)
        .bind(Value::Object(routing.variable_mappings))
        .bind(&routing.message_template)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| conflict_or(e, "routing", &pair))?;

        Ok(routing_from_row(row))
    }

    async fn find_routing(&self, topic_id: i64, channel_id: i64) -> StoreResult<Routing> {
        let row: Option<RoutingRow> = sqlx::query_as(&format!(
            "SELECT {ROUTING_COLUMNS} FROM routings WHERE topic_id = $1 AND channel_id = $2"
        ))
        .bind(topic_id)
        .bind(channel_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(routing_from_row)
            .ok_or_else(|| StoreError::not_found("routing", format!("{topic_id}/{channel_id}")))
    }

    async fn list_routings_by_topic(&self, topic_id: i64) -> StoreResult<Vec<Routing>> {
        let rows: Vec<RoutingRow> = sqlx::query_as(&format!(
            "SELECT {ROUTING_COLUMNS} FROM routings WHERE topic_id = $1 ORDER BY sequence"
        ))
        .bind(topic_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(routing_from_row).collect())
    }

    async fn list_routings_by_channel(&self, channel_id: i64) -> StoreResult<Vec<Routing>> {
        let rows: Vec<RoutingRow> = sqlx::query_as(&format!(
            "SELECT {ROUTING_COLUMNS} FROM routings WHERE channel_id = $1 ORDER BY sequence"
        ))
        .bind(channel_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(routing_from_row).collect())
    }

    async fn update_routing(&self, routing: &Routing) -> StoreResult<Routing> {
        let row: Option<RoutingRow> = sqlx::query_as(&format!(
            r#"
            UPDATE routings
            SET priority = $3, variable_mappings = $4, message_template = $5, updated_at = NOW()
            WHERE topic_id = $1 AND channel_id = $2
            RETURNING {ROUTING_COLUMNS}
            "#
        ))
        .bind(routing.topic_id)
        .bind(routing.channel_id)
        .bind(routing.priority)
        .bind(Value::Object(routing.variable_mappings.clone()))
        .bind(&routing.message_template)
        .fetch_optional(&self.pool)
        .await?;

        row.map(routing_from_row).ok_or_else(|| {
            StoreError::not_found(
                "routing",
                format!("{}/{}", routing.topic_id, routing.channel_id),
            )
        })
    }

    async fn delete_routing(&self, topic_id: i64, channel_id: i64) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM routings WHERE topic_id = $1 AND channel_id = $2")
            .bind(topic_id)
            .bind(channel_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(
                "routing",
                format!("{topic_id}/{channel_id}"),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl MessageRepository for PostgresStore {
    async fn create_message(&self, message: NewMessage) -> StoreResult<Message> {
        let row: MessageRow = sqlx::query_as(&format!(
            "INSERT INTO messages (topic_id, content, status) VALUES ($1, $2, $3) \
             RETURNING {MESSAGE_COLUMNS}"
        ))
        .bind(message.topic_id)
        .bind(&message.content)
        .bind(MessageStatus::Pending.as_str())
        .fetch_one(&self.pool)
        .await?;

        message_from_row(row)
    }

    async fn find_message(&self, id: i64) -> StoreResult<Message> {
        let row: Option<MessageRow> = sqlx::query_as(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => message_from_row(row),
            None => Err(StoreError::not_found("message", id)),
        }
    }

    async fn update_message_status(&self, id: i64, status: MessageStatus) -> StoreResult<()> {
        let result =
            sqlx::query("UPDATE messages SET status = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(status.as_str())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found("message", id));
        }
        Ok(())
    }

    async fn list_messages_by_topic(
        &self,
        topic_id: i64,
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<Message>> {
        let rows: Vec<MessageRow> = sqlx::query_as(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE topic_id = $1 \
             ORDER BY id DESC LIMIT $2 OFFSET $3"
        ))
        .bind(topic_id)
        .bind(limit.max(0))
        .bind(offset.max(0))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(message_from_row).collect()
    }

    async fn count_messages_by_topic(&self, topic_id: i64) -> StoreResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages WHERE topic_id = $1")
            .bind(topic_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[async_trait]
impl DeliveryLogRepository for PostgresStore {
    async fn append_delivery_log(&self, log: NewDeliveryLog) -> StoreResult<DeliveryLog> {
        let row: DeliveryLogRow = sqlx::query_as(
            r#"
            INSERT INTO delivery_logs (message_id, channel_id, status, response)
            VALUES ($1, $2, $3, $4)
            RETURNING id, message_id, channel_id, status, response, created_at
            "#,
        )
        .bind(log.message_id)
        .bind(log.channel_id)
        .bind(log.status.as_str())
        .bind(&log.response)
        .fetch_one(&self.pool)
        .await?;

        delivery_log_from_row(row)
    }

    async fn list_delivery_logs_by_message(
        &self,
        message_id: i64,
    ) -> StoreResult<Vec<DeliveryLog>> {
        let rows: Vec<DeliveryLogRow> = sqlx::query_as(
            "SELECT id, message_id, channel_id, status, response, created_at \
             FROM delivery_logs WHERE message_id = $1 ORDER BY id",
        )
        .bind(message_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(delivery_log_from_row).collect()
    }
}

impl Store for PostgresStore {
    fn backend_type(&self) -> &'static str {
        "postgres"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_routing_row_with_non_object_mappings() {
        let now = Utc::now();
        let routing = routing_from_row((1, 2, 5, json!(["x"]), "t".to_string(), now, now));
        assert!(routing.variable_mappings.is_empty());
        assert_eq!(routing.priority, 5);
    }

    #[test]
    fn test_message_row_with_unknown_status_is_corrupt() {
        let now = Utc::now();
        let result = message_from_row((1, 2, json!({}), "queued".to_string(), now, now));
        assert!(matches!(result, Err(StoreError::Corrupt(_))));
    }
}
