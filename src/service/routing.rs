//! Routing management. Both ends of a routing must belong to the caller.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::domain::{NewRouting, Routing};
use crate::repository::Store;
use crate::template::Template;

use super::{ensure_owner, ServiceError, ServiceResult};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingInput {
    pub topic_id: i64,
    pub channel_id: i64,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub variable_mappings: Map<String, Value>,
    #[serde(default)]
    pub message_template: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingChanges {
    pub priority: Option<i32>,
    pub variable_mappings: Option<Map<String, Value>>,
    pub message_template: Option<String>,
}

pub struct RoutingService {
    store: Arc<dyn Store>,
}

impl RoutingService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    async fn ensure_topic_owner(&self, user_id: i64, topic_id: i64) -> ServiceResult<()> {
        let topic = self
            .store
            .find_topic(topic_id)
            .await
            .map_err(|_| ServiceError::NotFound(format!("Topic {} does not exist", topic_id)))?;
        ensure_owner(topic.user_id, user_id, "topic")
    }

    async fn ensure_channel_owner(&self, user_id: i64, channel_id: i64) -> ServiceResult<()> {
        let channel = self.store.find_channel(channel_id).await.map_err(|_| {
            ServiceError::NotFound(format!("Channel {} does not exist", channel_id))
        })?;
        ensure_owner(channel.user_id, user_id, "channel")
    }

    async fn ensure_pair_owner(&self, user_id: i64, topic_id: i64, channel_id: i64) -> ServiceResult<()> {
        self.ensure_topic_owner(user_id, topic_id).await?;
        self.ensure_channel_owner(user_id, channel_id).await
    }

    pub async fn create(&self, user_id: i64, input: RoutingInput) -> ServiceResult<Routing> {
        self.ensure_pair_owner(user_id, input.topic_id, input.channel_id)
            .await?;
        check_template(&input.message_template)?;

        let routing = self
            .store
            .create_routing(NewRouting {
                topic_id: input.topic_id,
                channel_id: input.channel_id,
                priority: input.priority,
                variable_mappings: input.variable_mappings,
                message_template: input.message_template,
            })
            .await?;

        tracing::info!(
            topic_id = routing.topic_id,
            channel_id = routing.channel_id,
            priority = routing.priority,
            "Routing created"
        );
        Ok(routing)
    }

    pub async fn list_by_topic(&self, user_id: i64, topic_id: i64) -> ServiceResult<Vec<Routing>> {
        self.ensure_topic_owner(user_id, topic_id).await?;
        Ok(self.store.list_routings_by_topic(topic_id).await?)
    }

    pub async fn list_by_channel(&self, user_id: i64, channel_id: i64) -> ServiceResult<Vec<Routing>> {
        self.ensure_channel_owner(user_id, channel_id).await?;
        Ok(self.store.list_routings_by_channel(channel_id).await?)
    }

    pub async fn update(
        &self,
        user_id: i64,
        topic_id: i64,
        channel_id: i64,
        changes: RoutingChanges,
    ) -> ServiceResult<Routing> {
        self.ensure_pair_owner(user_id, topic_id, channel_id).await?;
        let mut routing = self.store.find_routing(topic_id, channel_id).await?;

        if let Some(priority) = changes.priority {
            routing.priority = priority;
        }
        if let Some(mappings) = changes.variable_mappings {
            routing.variable_mappings = mappings;
        }
        if let Some(template) = changes.message_template {
            check_template(&template)?;
            routing.message_template = template;
        }

        Ok(self.store.update_routing(&routing).await?)
    }

    pub async fn delete(&self, user_id: i64, topic_id: i64, channel_id: i64) -> ServiceResult<()> {
        self.ensure_pair_owner(user_id, topic_id, channel_id).await?;
        self.store.delete_routing(topic_id, channel_id).await?;
        tracing::info!(topic_id, channel_id, "Routing deleted");
        Ok(())
    }
}

/// Reject templates that could never render
fn check_template(template: &str) -> ServiceResult<()> {
    Template::parse(template)
        .map(|_| ())
        .map_err(|e| ServiceError::Validation(e.to_string()))
}
