use std::sync::Arc;
use std::time::Instant;

use crate::auth::JwtValidator;
use crate::config::Settings;
use crate::delivery::{DeliveryWorkerPool, MessageProcessor};
use crate::postgres::PostgresPool;
use crate::repository::Store;
use crate::service::{ChannelService, MessageService, RoutingService, TopicService};
use crate::transport::TransportRegistry;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub jwt_validator: Arc<JwtValidator>,
    pub store: Arc<dyn Store>,
    pub topics: Arc<TopicService>,
    pub channels: Arc<ChannelService>,
    pub routings: Arc<RoutingService>,
    pub messages: Arc<MessageService>,
    pub processor: Arc<MessageProcessor>,
    pub worker_pool: Arc<DeliveryWorkerPool>,
    pub postgres_pool: Option<Arc<PostgresPool>>,
    pub start_time: Instant,
}

impl AppState {
    /// Wire services and start the delivery workers. Must run inside a Tokio runtime.
    pub fn new(
        settings: Settings,
        store: Arc<dyn Store>,
        transports: TransportRegistry,
        postgres_pool: Option<Arc<PostgresPool>>,
    ) -> Self {
        let jwt_validator = Arc::new(JwtValidator::new(&settings.jwt));

        let processor = Arc::new(MessageProcessor::new(
            store.clone(),
            Arc::new(transports),
            settings.delivery.attempt_timeout(),
        ));
        let worker_pool = Arc::new(DeliveryWorkerPool::start(
            processor.clone(),
            settings.delivery.workers,
            settings.delivery.queue_capacity,
        ));

        Self {
            jwt_validator,
            topics: Arc::new(TopicService::new(store.clone())),
            channels: Arc::new(ChannelService::new(store.clone())),
            routings: Arc::new(RoutingService::new(store.clone())),
            messages: Arc::new(MessageService::new(store.clone())),
            store,
            processor,
            worker_pool,
            postgres_pool,
            settings: Arc::new(settings),
            start_time: Instant::now(),
        }
    }
}
