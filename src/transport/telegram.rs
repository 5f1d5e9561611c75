//! Telegram Bot API transport (`POST /bot<token>/sendMessage`).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::credentials::{ChannelConfig, TelegramConfig};
use crate::domain::ChannelKind;

use super::http_client::{build_client, truncate_body};
use super::{ChannelTransport, DeliveryPayload, TransportError};

const MAX_ERROR_BODY: usize = 512;

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    parse_mode: Option<&'a str>,
}

/// Sends the route's rendered template as a bot message.
pub struct TelegramTransport {
    client: Client,
    api_base: String,
    timeout: Duration,
}

impl TelegramTransport {
    pub fn new(api_base: String, timeout: Duration) -> Result<Self, TransportError> {
        Ok(Self {
            client: build_client(timeout, None)?,
            api_base: api_base.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    fn endpoint(&self, bot_token: &str) -> String {
        format!("{}/bot{}/sendMessage", self.api_base, bot_token)
    }

    async fn deliver(&self, config: &TelegramConfig, text: &str) -> Result<(), TransportError> {
        let proxied;
        let client = match config.proxy.as_deref().filter(|p| !p.trim().is_empty()) {
            Some(proxy) => {
                proxied = build_client(self.timeout, Some(proxy))?;
                &proxied
            }
            None => &self.client,
        };

        let request = SendMessageRequest {
            chat_id: &config.chat_id,
            text,
            parse_mode: config.parse_mode.as_deref().filter(|m| !m.is_empty()),
        };

        let response = client
            .post(self.endpoint(&config.bot_token))
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error body".to_string());
            return Err(TransportError::Status {
                service: "telegram",
                status: status.as_u16(),
                body: truncate_body(&body, MAX_ERROR_BODY),
            });
        }

        tracing::debug!(chat_id = %config.chat_id, "Telegram message sent");
        Ok(())
    }
}

#[async_trait]
impl ChannelTransport for TelegramTransport {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Telegram
    }

    async fn send(
        &self,
        config: &ChannelConfig,
        payload: &DeliveryPayload<'_>,
    ) -> Result<(), TransportError> {
        match config {
            ChannelConfig::Telegram(cfg) => self.deliver(cfg, payload.rendered).await,
            other => Err(TransportError::ConfigMismatch {
                expected: ChannelKind::Telegram,
                actual: other.kind(),
            }),
        }
    }
}
