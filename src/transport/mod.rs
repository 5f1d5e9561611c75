//! Outbound channel transports.
//!
//! One `ChannelTransport` per channel kind, looked up through a
//! `TransportRegistry`. Adding a kind means registering another transport;
//! the orchestrator only sees the trait.

pub mod email;
pub mod http_client;
pub mod slack;
pub mod telegram;
pub mod webhook;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::config::DeliveryConfig;
use crate::credentials::ChannelConfig;
use crate::domain::ChannelKind;

pub use email::EmailTransport;
pub use slack::SlackTransport;
pub use telegram::TelegramTransport;
pub use webhook::WebhookTransport;

#[derive(Debug, Error)]
pub enum TransportError {
    /// The decoded config belongs to another channel kind
    #[error("Expected {expected} configuration, got {actual}")]
    ConfigMismatch {
        expected: ChannelKind,
        actual: ChannelKind,
    },

    #[error("Invalid proxy: {0}")]
    InvalidProxy(String),

    /// The request could not be built from the channel configuration
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote service answered outside the 2xx range
    #[error("{service} returned HTTP {status}: {body}")]
    Status {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("SMTP error: {0}")]
    Smtp(String),

    #[error("Delivery timed out after {0:?}")]
    Timeout(Duration),
}

/// What a route hands to a transport
#[derive(Debug, Clone, Copy)]
pub struct DeliveryPayload<'a> {
    /// The route's rendered message template
    pub rendered: &'a str,
    /// The inbound message content, untouched
    pub content: &'a Value,
}

#[async_trait]
pub trait ChannelTransport: Send + Sync {
    fn kind(&self) -> ChannelKind;

    /// Whether `DeliveryPayload::rendered` is sent. Routes skip rendering otherwise.
    fn renders_template(&self) -> bool {
        true
    }

    /// Make a single delivery attempt. No retries.
    async fn send(
        &self,
        config: &ChannelConfig,
        payload: &DeliveryPayload<'_>,
    ) -> Result<(), TransportError>;
}

/// Transports keyed by channel kind
#[derive(Clone, Default)]
pub struct TransportRegistry {
    transports: HashMap<ChannelKind, Arc<dyn ChannelTransport>>,
}

impl TransportRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in transport for every channel kind.
    pub fn with_defaults(config: &DeliveryConfig) -> Result<Self, TransportError> {
        let timeout = config.attempt_timeout();
        let mut registry = Self::new();

        registry.register(Arc::new(TelegramTransport::new(
            config.telegram_api_base.clone(),
            timeout,
        )?));
        registry.register(Arc::new(EmailTransport::new(
            config.email_body,
            config.email_subject.clone(),
            timeout,
        )));
        registry.register(Arc::new(WebhookTransport::new(timeout)?));
        registry.register(Arc::new(SlackTransport));

        Ok(registry)
    }

    /// Add or replace the transport for its kind
    pub fn register(&mut self, transport: Arc<dyn ChannelTransport>) {
        self.transports.insert(transport.kind(), transport);
    }

    pub fn get(&self, kind: ChannelKind) -> Option<Arc<dyn ChannelTransport>> {
        self.transports.get(&kind).cloned()
    }

    pub fn kinds(&self) -> Vec<ChannelKind> {
        self.transports.keys().copied().collect()
    }
}
