//! Slack transport placeholder.

use async_trait::async_trait;

use crate::credentials::ChannelConfig;
use crate::domain::ChannelKind;

use super::{ChannelTransport, DeliveryPayload, TransportError};

/// Accepts every message without contacting Slack.
pub struct SlackTransport;

#[async_trait]
impl ChannelTransport for SlackTransport {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Slack
    }

    fn renders_template(&self) -> bool {
        false
    }

    async fn send(
        &self,
        config: &ChannelConfig,
        payload: &DeliveryPayload<'_>,
    ) -> Result<(), TransportError> {
        if !matches!(config, ChannelConfig::Slack(_)) {
            return Err(TransportError::ConfigMismatch {
                expected: ChannelKind::Slack,
                actual: config.kind(),
            });
        }

        tracing::debug!(
            length = payload.rendered.len(),
            "Slack delivery is not implemented, reporting success"
        );
        Ok(())
    }
}
