use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation failures for enumerated configuration values.
///
/// The same parsers are used when a topic or channel is written and again
/// when a message is delivered, so the allowed-value lists exist once.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("Unsupported sending strategy: {0}")]
    UnsupportedStrategy(String),

    #[error("Unsupported execution mode: {0}")]
    UnsupportedExecutionMode(String),

    #[error("Unsupported channel type: {0}")]
    UnsupportedChannelType(String),

    #[error("Unknown status value: {0}")]
    UnknownStatus(String),
}

/// How a topic fans a message out across its routes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SendingStrategy {
    /// Attempt every route, tolerate partial failure
    All,
    /// Attempt routes by descending priority, stop at the first success
    Failover,
}

impl SendingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SendingStrategy::All => "all",
            SendingStrategy::Failover => "failover",
        }
    }
}

impl FromStr for SendingStrategy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(SendingStrategy::All),
            "failover" => Ok(SendingStrategy::Failover),
            other => Err(DomainError::UnsupportedStrategy(other.to_string())),
        }
    }
}

impl fmt::Display for SendingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the inbound webhook call waits for delivery to finish
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    Sync,
    Async,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Sync => "sync",
            ExecutionMode::Async => "async",
        }
    }
}

impl FromStr for ExecutionMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sync" => Ok(ExecutionMode::Sync),
            "async" => Ok(ExecutionMode::Async),
            other => Err(DomainError::UnsupportedExecutionMode(other.to_string())),
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Supported outbound channel kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Telegram,
    Email,
    Webhook,
    /// Declared but not implemented: sends always succeed without network I/O
    Slack,
}

impl ChannelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Telegram => "telegram",
            ChannelKind::Email => "email",
            ChannelKind::Webhook => "webhook",
            ChannelKind::Slack => "slack",
        }
    }
}

impl FromStr for ChannelKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "telegram" => Ok(ChannelKind::Telegram),
            "email" => Ok(ChannelKind::Email),
            "webhook" => Ok(ChannelKind::Webhook),
            "slack" => Ok(ChannelKind::Slack),
            other => Err(DomainError::UnsupportedChannelType(other.to_string())),
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Processing status of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MessageStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Partial,
    Failed,
}

impl MessageStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageStatus::Pending => "pending",
            MessageStatus::Processing => "processing",
            MessageStatus::Completed => "completed",
            MessageStatus::Partial => "partial",
            MessageStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MessageStatus::Completed | MessageStatus::Partial | MessageStatus::Failed
        )
    }
}

impl FromStr for MessageStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(MessageStatus::Pending),
            "processing" => Ok(MessageStatus::Processing),
            "completed" => Ok(MessageStatus::Completed),
            "partial" => Ok(MessageStatus::Partial),
            "failed" => Ok(MessageStatus::Failed),
            other => Err(DomainError::UnknownStatus(other.to_string())),
        }
    }
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of a single delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Success,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryStatus::Success => "success",
            DeliveryStatus::Failed => "failed",
        }
    }
}

impl FromStr for DeliveryStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "success" => Ok(DeliveryStatus::Success),
            "failed" => Ok(DeliveryStatus::Failed),
            other => Err(DomainError::UnknownStatus(other.to_string())),
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user-defined inbound address
///
/// Strategy and mode are kept as stored text and parsed on use, so a row
/// written by an older or foreign writer is still handled at delivery time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub webhook_key: String,
    pub sending_strategy: String,
    pub execution_mode: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Topic {
    pub fn strategy(&self) -> Result<SendingStrategy, DomainError> {
        self.sending_strategy.parse()
    }

    pub fn mode(&self) -> Result<ExecutionMode, DomainError> {
        self.execution_mode.parse()
    }
}

#[derive(Debug, Clone)]
pub struct NewTopic {
    pub user_id: i64,
    pub name: String,
    pub description: String,
    pub webhook_key: String,
    pub sending_strategy: SendingStrategy,
    pub execution_mode: ExecutionMode,
}

/// A configured outbound notification target
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub channel_type: String,
    /// Opaque, kind-dependent key/value map
    pub credentials: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewChannel {
    pub user_id: i64,
    pub name: String,
    pub kind: ChannelKind,
    pub credentials: serde_json::Value,
}

/// Binds a topic to a channel. Identified by `(topic_id, channel_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Routing {
    pub topic_id: i64,
    pub channel_id: i64,
    /// Higher is tried first under failover
    #[serde(default)]
    pub priority: i32,
    /// Variable name -> extraction path. Non-string values are ignored.
    #[serde(default)]
    pub variable_mappings: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub message_template: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewRouting {
    pub topic_id: i64,
    pub channel_id: i64,
    pub priority: i32,
    pub variable_mappings: serde_json::Map<String, serde_json::Value>,
    pub message_template: String,
}

/// One inbound webhook payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: i64,
    pub topic_id: i64,
    pub content: serde_json::Value,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub topic_id: i64,
    pub content: serde_json::Value,
}

/// Append-only record of one delivery attempt
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryLog {
    pub id: i64,
    pub message_id: i64,
    pub channel_id: i64,
    pub status: DeliveryStatus,
    pub response: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewDeliveryLog {
    pub message_id: i64,
    pub channel_id: i64,
    pub status: DeliveryStatus,
    pub response: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("all".parse::<SendingStrategy>(), Ok(SendingStrategy::All));
        assert_eq!(
            "failover".parse::<SendingStrategy>(),
            Ok(SendingStrategy::Failover)
        );
        assert_eq!(
            "round-robin".parse::<SendingStrategy>(),
            Err(DomainError::UnsupportedStrategy("round-robin".to_string()))
        );
        // Case sensitive, as stored
        assert!("ALL".parse::<SendingStrategy>().is_err());
    }

    #[test]
    fn test_channel_kind_parsing() {
        for kind in [
            ChannelKind::Telegram,
            ChannelKind::Email,
            ChannelKind::Webhook,
            ChannelKind::Slack,
        ] {
            assert_eq!(kind.as_str().parse::<ChannelKind>(), Ok(kind));
        }

        assert!(matches!(
            "discord".parse::<ChannelKind>(),
            Err(DomainError::UnsupportedChannelType(_))
        ));
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!MessageStatus::Pending.is_terminal());
        assert!(!MessageStatus::Processing.is_terminal());
        assert!(MessageStatus::Completed.is_terminal());
        assert!(MessageStatus::Partial.is_terminal());
        assert!(MessageStatus::Failed.is_terminal());
    }

    #[test]
    fn test_topic_serializes_camel_case() {
        let now = Utc::now();
        let topic = Topic {
            id: 1,
            user_id: 7,
            name: "alerts".to_string(),
            description: String::new(),
            webhook_key: "abc".to_string(),
            sending_strategy: "failover".to_string(),
            execution_mode: "sync".to_string(),
            created_at: now,
            updated_at: now,
        };

        let value = serde_json::to_value(&topic).unwrap();
        assert_eq!(value["webhookKey"], "abc");
        assert_eq!(value["sendingStrategy"], "failover");
        assert_eq!(topic.strategy(), Ok(SendingStrategy::Failover));
        assert_eq!(topic.mode(), Ok(ExecutionMode::Sync));
    }
}
