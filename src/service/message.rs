//! Read-only views over received messages and their delivery history.

use std::sync::Arc;

use serde::Serialize;

use crate::domain::{DeliveryLog, Message};
use crate::repository::Store;

use super::{ensure_owner, ServiceError, ServiceResult};

const DEFAULT_PAGE_SIZE: i64 = 20;
const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePage {
    pub messages: Vec<Message>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageDetail {
    pub message: Message,
    pub delivery_logs: Vec<DeliveryLog>,
}

pub struct MessageService {
    store: Arc<dyn Store>,
}

impl MessageService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Messages of a topic, newest first. `page` starts at 1.
    pub async fn list_by_topic(
        &self,
        user_id: i64,
        topic_id: i64,
        page: Option<i64>,
        page_size: Option<i64>,
    ) -> ServiceResult<MessagePage> {
        let topic = self.store.find_topic(topic_id).await?;
        ensure_owner(topic.user_id, user_id, "topic")?;

        let page = page.unwrap_or(1).max(1);
        let page_size = page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);

        let messages = self
            .store
            .list_messages_by_topic(topic_id, page_size, (page - 1) * page_size)
            .await?;
        let total = self.store.count_messages_by_topic(topic_id).await?;

        Ok(MessagePage {
            messages,
            total,
            page,
            page_size,
        })
    }

    /// A message with every delivery attempt made for it
    pub async fn get(&self, user_id: i64, message_id: i64) -> ServiceResult<MessageDetail> {
        let message = self.store.find_message(message_id).await?;

        // Messages of a deleted topic are hidden along with it
        let topic = self.store.find_topic(message.topic_id).await.map_err(|e| {
            if e.is_not_found() {
                ServiceError::NotFound(format!("message not found: {}", message_id))
            } else {
                e.into()
            }
        })?;
        ensure_owner(topic.user_id, user_id, "message")?;

        let delivery_logs = self.store.list_delivery_logs_by_message(message_id).await?;

        Ok(MessageDetail {
            message,
            delivery_logs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        DeliveryStatus, ExecutionMode, NewDeliveryLog, NewMessage, NewTopic, SendingStrategy,
    };
    use crate::repository::{
        DeliveryLogRepository, MemoryStore, MessageRepository, TopicRepository,
    };
    use serde_json::json;

    async fn seeded() -> (Arc<MemoryStore>, i64) {
        let store = Arc::new(MemoryStore::new());
        let topic = store
            .create_topic(NewTopic {
                user_id: 1,
                name: "alerts".to_string(),
                description: String::new(),
                webhook_key: "k1".to_string(),
                sending_strategy: SendingStrategy::All,
                execution_mode: ExecutionMode::Async,
            })
            .await
            .unwrap();

        for n in 0..5 {
            store
                .create_message(NewMessage {
                    topic_id: topic.id,
                    content: json!({ "n": n }),
                })
                .await
                .unwrap();
        }
        (store, topic.id)
    }

    #[tokio::test]
    async fn test_list_pages_newest_first() {
        let (store, topic_id) = seeded().await;
        let service = MessageService::new(store);

        let first = service
            .list_by_topic(1, topic_id, Some(1), Some(2))
            .await
            .unwrap();
        assert_eq!(first.total, 5);
        assert_eq!(first.messages.len(), 2);
        assert_eq!(first.messages[0].content["n"], 4);

        let last = service
            .list_by_topic(1, topic_id, Some(3), Some(2))
            .await
            .unwrap();
        assert_eq!(last.messages.len(), 1);
        assert_eq!(last.messages[0].content["n"], 0);
    }

    #[tokio::test]
    async fn test_list_clamps_paging() {
        let (store, topic_id) = seeded().await;
        let service = MessageService::new(store);

        let page = service
            .list_by_topic(1, topic_id, Some(0), Some(1000))
            .await
            .unwrap();
        assert_eq!(page.page, 1);
        assert_eq!(page.page_size, MAX_PAGE_SIZE);
    }

    #[tokio::test]
    async fn test_list_other_user_forbidden() {
        let (store, topic_id) = seeded().await;
        let service = MessageService::new(store);

        assert!(matches!(
            service.list_by_topic(2, topic_id, None, None).await,
            Err(ServiceError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_get_includes_delivery_logs() {
        let (store, topic_id) = seeded().await;
        let message = store
            .create_message(NewMessage {
                topic_id,
                content: json!({}),
            })
            .await
            .unwrap();
        store
            .append_delivery_log(NewDeliveryLog {
                message_id: message.id,
                channel_id: 7,
                status: DeliveryStatus::Failed,
                response: "boom".to_string(),
            })
            .await
            .unwrap();

        let service = MessageService::new(store);
        let detail = service.get(1, message.id).await.unwrap();
        assert_eq!(detail.delivery_logs.len(), 1);
        assert_eq!(detail.delivery_logs[0].response, "boom");

        assert!(matches!(
            service.get(2, message.id).await,
            Err(ServiceError::Forbidden(_))
        ));
    }
}
