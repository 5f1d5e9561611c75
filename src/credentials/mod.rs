//! Typed channel configuration decoded from a channel's stored credentials.
//!
//! The same decoder runs when a channel is written (reject early) and right
//! before every send (the stored blob may have been edited out of band).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::domain::{ChannelKind, DomainError};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CredentialError {
    /// The credentials map could not be read as the channel kind's config
    #[error("Invalid {kind} configuration: {reason}")]
    Decode { kind: ChannelKind, reason: String },

    /// Required fields are missing or empty
    #[error("Incomplete {kind} configuration, missing: {}", fields.join(", "))]
    Incomplete {
        kind: ChannelKind,
        fields: Vec<&'static str>,
    },

    #[error(transparent)]
    UnsupportedChannelType(#[from] DomainError),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: String,
    pub parse_mode: Option<String>,
    pub proxy: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EmailConfig {
    pub smtp_host: String,
    /// Zero means "not set"
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub sender: String,
    pub to: String,
    /// Accepted for compatibility; SMTP submission does not go through it
    pub proxy: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WebhookConfig {
    pub url: String,
    /// Defaults to POST when empty
    pub method: Option<String>,
    pub headers: HashMap<String, String>,
    pub proxy: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SlackConfig {
    pub webhook_url: Option<String>,
}

/// Channel configuration for every supported kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelConfig {
    Telegram(TelegramConfig),
    Email(EmailConfig),
    Webhook(WebhookConfig),
    Slack(SlackConfig),
}

impl ChannelConfig {
    pub fn kind(&self) -> ChannelKind {
        match self {
            ChannelConfig::Telegram(_) => ChannelKind::Telegram,
            ChannelConfig::Email(_) => ChannelKind::Email,
            ChannelConfig::Webhook(_) => ChannelKind::Webhook,
            ChannelConfig::Slack(_) => ChannelKind::Slack,
        }
    }

    /// Names of required fields that are empty
    fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        match self {
            ChannelConfig::Telegram(cfg) => {
                require(&mut missing, "botToken", &cfg.bot_token);
                require(&mut missing, "chatId", &cfg.chat_id);
            }
            ChannelConfig::Email(cfg) => {
                require(&mut missing, "smtpHost", &cfg.smtp_host);
                if cfg.smtp_port == 0 {
                    missing.push("smtpPort");
                }
                require(&mut missing, "smtpUsername", &cfg.smtp_username);
                require(&mut missing, "smtpPassword", &cfg.smtp_password);
                require(&mut missing, "sender", &cfg.sender);
                require(&mut missing, "to", &cfg.to);
            }
            ChannelConfig::Webhook(cfg) => {
                require(&mut missing, "url", &cfg.url);
            }
            ChannelConfig::Slack(_) => {}
        }
        missing
    }
}

fn require(missing: &mut Vec<&'static str>, name: &'static str, value: &str) {
    if value.trim().is_empty() {
        missing.push(name);
    }
}

fn parse<T: serde::de::DeserializeOwned>(
    kind: ChannelKind,
    credentials: &Value,
) -> Result<T, CredentialError> {
    // A channel created without credentials is stored as null
    let source = match credentials {
        Value::Null => Value::Object(serde_json::Map::new()),
        other => other.clone(),
    };
    serde_json::from_value(source).map_err(|e| CredentialError::Decode {
        kind,
        reason: e.to_string(),
    })
}

/// Decode and check a channel's credentials for the given kind.
pub fn decode_credentials(
    kind: ChannelKind,
    credentials: &Value,
) -> Result<ChannelConfig, CredentialError> {
    let config = match kind {
        ChannelKind::Telegram => ChannelConfig::Telegram(parse(kind, credentials)?),
        ChannelKind::Email => ChannelConfig::Email(parse(kind, credentials)?),
        ChannelKind::Webhook => ChannelConfig::Webhook(parse(kind, credentials)?),
        ChannelKind::Slack => ChannelConfig::Slack(parse(kind, credentials)?),
    };

    let fields = config.missing_fields();
    if !fields.is_empty() {
        return Err(CredentialError::Incomplete { kind, fields });
    }

    Ok(config)
}

/// Validate a stored type string and its credentials together.
pub fn validate_credentials(
    channel_type: &str,
    credentials: &Value,
) -> Result<ChannelConfig, CredentialError> {
    let kind: ChannelKind = channel_type.parse()?;
    decode_credentials(kind, credentials)
}
