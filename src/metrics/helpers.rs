//! Metrics helper structs for convenient metric recording

use std::time::Duration;

use prometheus::{Encoder, TextEncoder};

use crate::domain::{ExecutionMode, MessageStatus};

use super::{
    DELIVERY_ATTEMPTS_TOTAL, DELIVERY_LATENCY, DELIVERY_LOG_WRITE_ERRORS_TOTAL,
    DELIVERY_QUEUE_DEPTH, DELIVERY_QUEUE_REJECTED_TOTAL, MESSAGES_PROCESSED_TOTAL,
    WEBHOOKS_RECEIVED_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording inbound webhook metrics
pub struct WebhookMetrics;

impl WebhookMetrics {
    pub fn record_received(mode: ExecutionMode) {
        WEBHOOKS_RECEIVED_TOTAL
            .with_label_values(&[mode.as_str()])
            .inc();
    }
}

/// Helper struct for recording delivery metrics
pub struct DeliveryMetrics;

impl DeliveryMetrics {
    /// Record one attempt for a channel kind (or "unknown")
    pub fn record_attempt(channel: &str, success: bool, elapsed: Duration) {
        let outcome = if success { "success" } else { "failed" };
        DELIVERY_ATTEMPTS_TOTAL
            .with_label_values(&[channel, outcome])
            .inc();
        DELIVERY_LATENCY
            .with_label_values(&[channel])
            .observe(elapsed.as_secs_f64());
    }

    /// Record a message reaching its terminal status
    pub fn record_processed(status: MessageStatus) {
        MESSAGES_PROCESSED_TOTAL
            .with_label_values(&[status.as_str()])
            .inc();
    }

    pub fn record_log_write_error() {
        DELIVERY_LOG_WRITE_ERRORS_TOTAL.inc();
    }
}

/// Helper struct for the async delivery queue
pub struct QueueMetrics;

impl QueueMetrics {
    pub fn record_enqueued() {
        DELIVERY_QUEUE_DEPTH.inc();
    }

    pub fn record_dequeued() {
        DELIVERY_QUEUE_DEPTH.dec();
    }

    pub fn record_rejected() {
        DELIVERY_QUEUE_REJECTED_TOTAL.inc();
    }
}
