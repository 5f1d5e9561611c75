//! Append-only delivery log recording.

use std::sync::Arc;

use crate::domain::{DeliveryStatus, NewDeliveryLog};
use crate::metrics::DeliveryMetrics;
use crate::repository::Store;

/// Response text stored for successful attempts
pub const SUCCESS_RESPONSE: &str = "delivered successfully";

/// Writes one row per delivery attempt.
///
/// A failed write is logged and counted but never changes the outcome of
/// the attempt it describes.
#[derive(Clone)]
pub struct DeliveryLogWriter {
    store: Arc<dyn Store>,
}

impl DeliveryLogWriter {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn record_success(&self, message_id: i64, channel_id: i64) {
        self.write(message_id, channel_id, DeliveryStatus::Success, SUCCESS_RESPONSE.to_string())
            .await;
    }

    pub async fn record_failure(&self, message_id: i64, channel_id: i64, error: &str) {
        self.write(message_id, channel_id, DeliveryStatus::Failed, error.to_string())
            .await;
    }

    async fn write(
        &self,
        message_id: i64,
        channel_id: i64,
        status: DeliveryStatus,
        response: String,
    ) {
        let log = NewDeliveryLog {
            message_id,
            channel_id,
            status,
            response,
        };

        if let Err(e) = self.store.append_delivery_log(log).await {
            DeliveryMetrics::record_log_write_error();
            tracing::warn!(
                message_id,
                channel_id,
                status = %status,
                error = %e,
                "Failed to write delivery log"
            );
        }
    }
}
