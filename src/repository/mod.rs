//! Persistence for topics, channels, routings, messages and delivery logs.
//!
//! Supports multiple backends:
//! - Memory: DashMap-backed, data lost on restart (default)
//! - PostgreSQL: durable storage with soft deletes

pub mod backend;
pub mod factory;
pub mod memory_backend;
pub mod postgres_backend;

pub use backend::{
    ChannelRepository, DeliveryLogRepository, MessageRepository, RoutingRepository, Store,
    StoreError, StoreResult, TopicRepository,
};
pub use factory::{create_store, StoreFactoryError};
pub use memory_backend::MemoryStore;
pub use postgres_backend::PostgresStore;
