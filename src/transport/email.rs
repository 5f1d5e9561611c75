//! SMTP transport over implicit TLS.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::{Credentials, Mechanism};
use lettre::{AsyncSmtpTransport, AsyncTransport, Message as EmailMessage, Tokio1Executor};

use crate::config::EmailBodySource;
use crate::credentials::{ChannelConfig, EmailConfig};
use crate::domain::ChannelKind;

use super::{ChannelTransport, DeliveryPayload, TransportError};

pub struct EmailTransport {
    body_source: EmailBodySource,
    subject: String,
    timeout: Duration,
}

impl EmailTransport {
    pub fn new(body_source: EmailBodySource, subject: String, timeout: Duration) -> Self {
        Self {
            body_source,
            subject,
            timeout,
        }
    }

    fn body(&self, payload: &DeliveryPayload<'_>) -> String {
        match self.body_source {
            EmailBodySource::RawContent => payload.content.to_string(),
            EmailBodySource::RenderedTemplate => payload.rendered.to_string(),
        }
    }

    /// Build the message. `to` may hold several comma separated addresses.
    fn build_message(
        &self,
        config: &EmailConfig,
        body: String,
    ) -> Result<EmailMessage, TransportError> {
        let from: Mailbox = config
            .sender
            .parse()
            .map_err(|e| TransportError::InvalidRequest(format!("invalid sender address: {}", e)))?;

        let mut builder = EmailMessage::builder().from(from).subject(self.subject.as_str());

        for recipient in config.to.split(',').map(str::trim).filter(|r| !r.is_empty()) {
            let to: Mailbox = recipient.parse().map_err(|e| {
                TransportError::InvalidRequest(format!("invalid recipient {}: {}", recipient, e))
            })?;
            builder = builder.to(to);
        }

        builder
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| TransportError::InvalidRequest(e.to_string()))
    }

    async fn deliver(
        &self,
        config: &EmailConfig,
        payload: &DeliveryPayload<'_>,
    ) -> Result<(), TransportError> {
        if config.proxy.as_deref().is_some_and(|p| !p.trim().is_empty()) {
            tracing::warn!(
                smtp_host = %config.smtp_host,
                "Proxy is not supported for SMTP, connecting directly"
            );
        }

        let message = self.build_message(config, self.body(payload))?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&config.smtp_host)
            .map_err(|e| TransportError::Smtp(e.to_string()))?
            .port(config.smtp_port)
            .credentials(Credentials::new(
                config.smtp_username.clone(),
                config.smtp_password.clone(),
            ))
            .authentication(vec![Mechanism::Plain, Mechanism::Login])
            .timeout(Some(self.timeout))
            .build();

        mailer
            .send(message)
            .await
            .map_err(|e| TransportError::Smtp(e.to_string()))?;

        tracing::debug!(smtp_host = %config.smtp_host, to = %config.to, "Email sent");
        Ok(())
    }
}

#[async_trait]
impl ChannelTransport for EmailTransport {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Email
    }

    fn renders_template(&self) -> bool {
        self.body_source == EmailBodySource::RenderedTemplate
    }

    async fn send(
        &self,
        config: &ChannelConfig,
        payload: &DeliveryPayload<'_>,
    ) -> Result<(), TransportError> {
        match config {
            ChannelConfig::Email(cfg) => self.deliver(cfg, payload).await,
            other => Err(TransportError::ConfigMismatch {
                expected: ChannelKind::Email,
                actual: other.kind(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> EmailConfig {
        EmailConfig {
            smtp_host: "smtp.example.com".to_string(),
            smtp_port: 465,
            smtp_username: "bot".to_string(),
            smtp_password: "secret".to_string(),
            sender: "Bot <bot@example.com>".to_string(),
            to: "ops@example.com, oncall@example.com".to_string(),
            proxy: None,
        }
    }

    #[test]
    fn test_body_source() {
        let content = json!({"alert": "disk"});
        let payload = DeliveryPayload {
            rendered: "rendered text",
            content: &content,
        };

        let raw = EmailTransport::new(
            EmailBodySource::RawContent,
            "s".to_string(),
            Duration::from_secs(1),
        );
        assert_eq!(raw.body(&payload), r#"{"alert":"disk"}"#);

        let rendered = EmailTransport::new(
            EmailBodySource::RenderedTemplate,
            "s".to_string(),
            Duration::from_secs(1),
        );
        assert_eq!(rendered.body(&payload), "rendered text");

        assert!(!raw.renders_template());
        assert!(rendered.renders_template());
    }

    #[test]
    fn test_build_message_with_multiple_recipients() {
        let transport = EmailTransport::new(
            EmailBodySource::RawContent,
            "Alert".to_string(),
            Duration::from_secs(1),
        );
        let message = transport.build_message(&config(), "body".to_string()).unwrap();
        assert_eq!(message.envelope().to().len(), 2);
    }

    #[test]
    fn test_invalid_sender_rejected() {
        let transport = EmailTransport::new(
            EmailBodySource::RawContent,
            "Alert".to_string(),
            Duration::from_secs(1),
        );
        let mut config = config();
        config.sender = "not an address".to_string();

        let err = transport.build_message(&config, "body".to_string()).unwrap_err();
        assert!(matches!(err, TransportError::InvalidRequest(_)));
    }
}
