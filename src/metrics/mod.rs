//! Prometheus metrics for the delivery service.
//!
//! - Webhook intake (by execution mode)
//! - Message processing outcomes (by terminal status)
//! - Delivery attempts and latency (by channel kind)
//! - Async delivery queue depth

mod helpers;

pub use helpers::{encode_metrics, DeliveryMetrics, QueueMetrics, WebhookMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    HistogramVec, IntCounter, IntCounterVec, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "synapse";

lazy_static! {
    // ============================================================================
    // Intake Metrics
    // ============================================================================

    /// Inbound webhook calls accepted, by execution mode
    pub static ref WEBHOOKS_RECEIVED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_webhooks_received_total", METRIC_PREFIX),
        "Total inbound webhook calls accepted",
        &["mode"]
    ).unwrap();

    // ============================================================================
    // Processing Metrics
    // ============================================================================

    /// Messages that reached a terminal status
    pub static ref MESSAGES_PROCESSED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_messages_processed_total", METRIC_PREFIX),
        "Total messages processed, by terminal status",
        &["status"]
    ).unwrap();

    /// Per-route delivery attempts
    pub static ref DELIVERY_ATTEMPTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_delivery_attempts_total", METRIC_PREFIX),
        "Total delivery attempts, by channel kind and outcome",
        &["channel", "outcome"]
    ).unwrap();

    /// Delivery attempt latency in seconds
    pub static ref DELIVERY_LATENCY: HistogramVec = register_histogram_vec!(
        format!("{}_delivery_latency_seconds", METRIC_PREFIX),
        "Delivery attempt latency in seconds",
        &["channel"],
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    ).unwrap();

    /// Delivery log rows that could not be written
    pub static ref DELIVERY_LOG_WRITE_ERRORS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_delivery_log_write_errors_total", METRIC_PREFIX),
        "Total delivery log rows that failed to persist"
    ).unwrap();

    // ============================================================================
    // Queue Metrics
    // ============================================================================

    /// Messages waiting for an async worker
    pub static ref DELIVERY_QUEUE_DEPTH: IntGauge = register_int_gauge!(
        format!("{}_delivery_queue_depth", METRIC_PREFIX),
        "Messages waiting in the async delivery queue"
    ).unwrap();

    /// Webhook calls refused because the queue was full or closed
    pub static ref DELIVERY_QUEUE_REJECTED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_delivery_queue_rejected_total", METRIC_PREFIX),
        "Total messages refused by the async delivery queue"
    ).unwrap();
}
