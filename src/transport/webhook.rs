//! Generic HTTP callback transport. Forwards the raw message content.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method};

use crate::credentials::{ChannelConfig, WebhookConfig};
use crate::domain::ChannelKind;

use super::http_client::{build_client, truncate_body};
use super::{ChannelTransport, DeliveryPayload, TransportError};

const MAX_ERROR_BODY: usize = 512;

pub struct WebhookTransport {
    client: Client,
    timeout: Duration,
}

impl WebhookTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        Ok(Self {
            client: build_client(timeout, None)?,
            timeout,
        })
    }

    async fn deliver(
        &self,
        config: &WebhookConfig,
        content: &serde_json::Value,
    ) -> Result<(), TransportError> {
        let method = parse_method(config.method.as_deref())?;
        let headers = build_headers(config)?;
        let body = serde_json::to_vec(content)
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;

        let proxied;
        let client = match config.proxy.as_deref().filter(|p| !p.trim().is_empty()) {
            Some(proxy) => {
                proxied = build_client(self.timeout, Some(proxy))?;
                &proxied
            }
            None => &self.client,
        };

        let response = client
            .request(method, &config.url)
            .headers(headers)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                service: "webhook",
                status: status.as_u16(),
                body: truncate_body(&body, MAX_ERROR_BODY),
            });
        }

        tracing::debug!(url = %config.url, status = status.as_u16(), "Webhook delivered");
        Ok(())
    }
}

fn parse_method(method: Option<&str>) -> Result<Method, TransportError> {
    match method.map(str::trim).filter(|m| !m.is_empty()) {
        None => Ok(Method::POST),
        Some(m) => Method::from_bytes(m.to_ascii_uppercase().as_bytes())
            .map_err(|_| TransportError::InvalidRequest(format!("invalid HTTP method: {}", m))),
    }
}

fn build_headers(config: &WebhookConfig) -> Result<HeaderMap, TransportError> {
    let mut headers = HeaderMap::new();

    for (name, value) in &config.headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| TransportError::InvalidRequest(format!("invalid header name: {}", name)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|_| TransportError::InvalidRequest(format!("invalid value for header {}", name)))?;
        headers.insert(name, value);
    }

    if !headers.contains_key(CONTENT_TYPE) {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    }

    Ok(headers)
}

#[async_trait]
impl ChannelTransport for WebhookTransport {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Webhook
    }

    fn renders_template(&self) -> bool {
        false
    }

    async fn send(
        &self,
        config: &ChannelConfig,
        payload: &DeliveryPayload<'_>,
    ) -> Result<(), TransportError> {
        match config {
            ChannelConfig::Webhook(cfg) => self.deliver(cfg, payload.content).await,
            other => Err(TransportError::ConfigMismatch {
                expected: ChannelKind::Webhook,
                actual: other.kind(),
            }),
        }
    }
}
