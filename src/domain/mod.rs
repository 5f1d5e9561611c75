//! Domain records shared by the store, the delivery engine and the HTTP API.
//!
//! - `Topic`: inbound address, owns the sending strategy and execution mode
//! - `Channel`: outbound target with kind-specific credentials
//! - `Routing`: binds a topic to a channel (priority, variable mappings, template)
//! - `Message`: one inbound webhook payload and its processing status
//! - `DeliveryLog`: append-only record of one delivery attempt

mod types;

pub use types::{
    Channel, ChannelKind, DeliveryLog, DeliveryStatus, DomainError, ExecutionMode, Message,
    MessageStatus, NewChannel, NewDeliveryLog, NewMessage, NewRouting, NewTopic, Routing,
    SendingStrategy, Topic,
};
