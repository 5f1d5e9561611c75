//! Topic management and webhook key generation.

use std::sync::Arc;

use serde::Deserialize;

use crate::domain::{ExecutionMode, NewTopic, SendingStrategy, Topic};
use crate::repository::{Store, StoreError, TopicRepository};

use super::{ensure_owner, require_name, ServiceError, ServiceResult};

/// Random draws before key generation gives up
const MAX_KEY_ATTEMPTS: usize = 16;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicInput {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Defaults to "all"
    pub sending_strategy: Option<String>,
    /// Defaults to "async"
    pub execution_mode: Option<String>,
}

/// Partial update. The webhook key cannot be changed here.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicChanges {
    pub name: Option<String>,
    pub description: Option<String>,
    pub sending_strategy: Option<String>,
    pub execution_mode: Option<String>,
}

/// 16 random bytes, hex encoded
pub fn random_webhook_key() -> String {
    let bytes: [u8; 16] = rand::random();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Draw keys until one is not held by any topic.
pub async fn generate_unique_key<R, F>(repo: &R, mut generate: F) -> ServiceResult<String>
where
    R: TopicRepository + ?Sized,
    F: FnMut() -> String,
{
    for _ in 0..MAX_KEY_ATTEMPTS {
        let key = generate();
        if !repo.webhook_key_exists(&key).await? {
            return Ok(key);
        }
        tracing::debug!("Webhook key collision, drawing again");
    }

    Err(ServiceError::Conflict(
        "Could not generate a unique webhook key".to_string(),
    ))
}

pub struct TopicService {
    store: Arc<dyn Store>,
}

impl TopicService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn create(&self, user_id: i64, input: TopicInput) -> ServiceResult<Topic> {
        let name = require_name(&input.name)?;
        let sending_strategy: SendingStrategy = input
            .sending_strategy
            .as_deref()
            .unwrap_or(SendingStrategy::All.as_str())
            .parse()?;
        let execution_mode: ExecutionMode = input
            .execution_mode
            .as_deref()
            .unwrap_or(ExecutionMode::Async.as_str())
            .parse()?;

        for _ in 0..MAX_KEY_ATTEMPTS {
            let webhook_key = generate_unique_key(self.store.as_ref(), random_webhook_key).await?;
            let new_topic = NewTopic {
                user_id,
                name: name.clone(),
                description: input.description.clone(),
                webhook_key,
                sending_strategy,
                execution_mode,
            };

            match self.store.create_topic(new_topic).await {
                Ok(topic) => {
                    tracing::info!(topic_id = topic.id, user_id, "Topic created");
                    return Ok(topic);
                }
                // Lost a race for the key, draw again
                Err(StoreError::Conflict { .. }) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(ServiceError::Conflict(
            "Could not generate a unique webhook key".to_string(),
        ))
    }

    pub async fn get(&self, user_id: i64, id: i64) -> ServiceResult<Topic> {
        let topic = self.store.find_topic(id).await?;
        ensure_owner(topic.user_id, user_id, "topic")?;
        Ok(topic)
    }

    pub async fn list(&self, user_id: i64) -> ServiceResult<Vec<Topic>> {
        Ok(self.store.list_topics_by_user(user_id).await?)
    }

    /// Resolve an inbound webhook address
    pub async fn find_by_webhook_key(&self, webhook_key: &str) -> ServiceResult<Topic> {
        Ok(self.store.find_topic_by_webhook_key(webhook_key).await?)
    }

    pub async fn update(&self, user_id: i64, id: i64, changes: TopicChanges) -> ServiceResult<Topic> {
        let mut topic = self.get(user_id, id).await?;

        if let Some(name) = changes.name {
            topic.name = require_name(&name)?;
        }
        if let Some(description) = changes.description {
            topic.description = description;
        }
        if let Some(strategy) = changes.sending_strategy {
            topic.sending_strategy = strategy.parse::<SendingStrategy>()?.as_str().to_string();
        }
        if let Some(mode) = changes.execution_mode {
            topic.execution_mode = mode.parse::<ExecutionMode>()?.as_str().to_string();
        }

        Ok(self.store.update_topic(&topic).await?)
    }

    pub async fn delete(&self, user_id: i64, id: i64) -> ServiceResult<()> {
        self.get(user_id, id).await?;
        self.store.soft_delete_topic(id).await?;
        tracing::info!(topic_id = id, user_id, "Topic deleted");
        Ok(())
    }

    /// Replace the webhook key. The old key stops resolving immediately.
    pub async fn regenerate_key(&self, user_id: i64, id: i64) -> ServiceResult<Topic> {
        self.get(user_id, id).await?;

        for _ in 0..MAX_KEY_ATTEMPTS {
            let key = generate_unique_key(self.store.as_ref(), random_webhook_key).await?;
            match self.store.replace_webhook_key(id, &key).await {
                Ok(topic) => {
                    tracing::info!(topic_id = id, user_id, "Webhook key regenerated");
                    return Ok(topic);
                }
                Err(StoreError::Conflict { .. }) => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(ServiceError::Conflict(
            "Could not generate a unique webhook key".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MemoryStore;

    fn service() -> (Arc<MemoryStore>, TopicService) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), TopicService::new(store))
    }

    fn input(name: &str) -> TopicInput {
        TopicInput {
            name: name.to_string(),
            ..TopicInput::default()
        }
    }

    #[test]
    fn test_random_key_format() {
        let key = random_webhook_key();
        assert_eq!(key.len(), 32);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(key, random_webhook_key());
    }

    #[tokio::test]
    async fn test_generate_unique_key_retries_on_collision() {
        let (store, service) = service();
        let existing = service.create(1, input("a")).await.unwrap();

        let mut draws = vec!["fresh".to_string(), existing.webhook_key.clone()];
        let key = generate_unique_key(store.as_ref(), || draws.pop().unwrap())
            .await
            .unwrap();
        assert_eq!(key, "fresh");
        assert!(draws.is_empty());
    }

    #[tokio::test]
    async fn test_generate_unique_key_gives_up() {
        let (store, service) = service();
        let existing = service.create(1, input("a")).await.unwrap();

        let result = generate_unique_key(store.as_ref(), || existing.webhook_key.clone()).await;
        assert!(matches!(result, Err(ServiceError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_create_defaults() {
        let (_, service) = service();
        let topic = service.create(1, input("alerts")).await.unwrap();
        assert_eq!(topic.sending_strategy, "all");
        assert_eq!(topic.execution_mode, "async");
        assert_eq!(topic.webhook_key.len(), 32);
    }

    #[tokio::test]
    async fn test_create_rejects_unknown_strategy() {
        let (_, service) = service();
        let result = service
            .create(
                1,
                TopicInput {
                    name: "x".to_string(),
                    sending_strategy: Some("random".to_string()),
                    ..TopicInput::default()
                },
            )
            .await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));

        let result = service.create(1, input("  ")).await;
        assert!(matches!(result, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn test_update_keeps_webhook_key() {
        let (_, service) = service();
        let topic = service.create(1, input("alerts")).await.unwrap();

        let updated = service
            .update(
                1,
                topic.id,
                TopicChanges {
                    sending_strategy: Some("failover".to_string()),
                    ..TopicChanges::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.sending_strategy, "failover");
        assert_eq!(updated.webhook_key, topic.webhook_key);
    }

    #[tokio::test]
    async fn test_other_users_are_forbidden() {
        let (_, service) = service();
        let topic = service.create(1, input("alerts")).await.unwrap();

        assert!(matches!(
            service.get(2, topic.id).await,
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            service.delete(2, topic.id).await,
            Err(ServiceError::Forbidden(_))
        ));
        assert!(matches!(
            service.regenerate_key(2, topic.id).await,
            Err(ServiceError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_regenerate_key() {
        let (_, service) = service();
        let topic = service.create(1, input("alerts")).await.unwrap();

        let updated = service.regenerate_key(1, topic.id).await.unwrap();
        assert_ne!(updated.webhook_key, topic.webhook_key);
        assert!(service.find_by_webhook_key(&topic.webhook_key).await.is_err());
        assert_eq!(
            service
                .find_by_webhook_key(&updated.webhook_key)
                .await
                .unwrap()
                .id,
            topic.id
        );
    }

    #[tokio::test]
    async fn test_deleted_topic_not_found() {
        let (_, service) = service();
        let topic = service.create(1, input("alerts")).await.unwrap();
        service.delete(1, topic.id).await.unwrap();

        assert!(matches!(
            service.get(1, topic.id).await,
            Err(ServiceError::NotFound(_))
        ));
        assert!(service.list(1).await.unwrap().is_empty());
    }
}
