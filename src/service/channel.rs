//! Channel management. Credentials are checked before anything is stored.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;

use crate::credentials::validate_credentials;
use crate::domain::{Channel, NewChannel};
use crate::repository::Store;

use super::{ensure_owner, require_name, ServiceResult};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelInput {
    pub name: String,
    #[serde(rename = "type")]
    pub channel_type: String,
    #[serde(default)]
    pub credentials: Value,
}

pub struct ChannelService {
    store: Arc<dyn Store>,
}

impl ChannelService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn create(&self, user_id: i64, input: ChannelInput) -> ServiceResult<Channel> {
        let name = require_name(&input.name)?;
        let config = validate_credentials(&input.channel_type, &input.credentials)?;

        let channel = self
            .store
            .create_channel(NewChannel {
                user_id,
                name,
                kind: config.kind(),
                credentials: input.credentials,
            })
            .await?;

        tracing::info!(channel_id = channel.id, user_id, kind = %config.kind(), "Channel created");
        Ok(channel)
    }

    pub async fn get(&self, user_id: i64, id: i64) -> ServiceResult<Channel> {
        let channel = self.store.find_channel(id).await?;
        ensure_owner(channel.user_id, user_id, "channel")?;
        Ok(channel)
    }

    pub async fn list(&self, user_id: i64) -> ServiceResult<Vec<Channel>> {
        Ok(self.store.list_channels_by_user(user_id).await?)
    }

    /// Replace name, type and credentials
    pub async fn update(&self, user_id: i64, id: i64, input: ChannelInput) -> ServiceResult<Channel> {
        let mut channel = self.get(user_id, id).await?;

        let name = require_name(&input.name)?;
        let config = validate_credentials(&input.channel_type, &input.credentials)?;

        channel.name = name;
        channel.channel_type = config.kind().as_str().to_string();
        channel.credentials = input.credentials;

        Ok(self.store.update_channel(&channel).await?)
    }

    /// Soft delete. Routings and delivery logs referencing it are kept.
    pub async fn delete(&self, user_id: i64, id: i64) -> ServiceResult<()> {
        self.get(user_id, id).await?;
        self.store.soft_delete_channel(id).await?;
        tracing::info!(channel_id = id, user_id, "Channel deleted");
        Ok(())
    }
}
