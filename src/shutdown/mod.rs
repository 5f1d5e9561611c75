//! Graceful shutdown handling for the delivery service.
//!
//! After the HTTP server stops accepting requests:
//! 1. The async delivery queue is closed and drained
//! 2. The PostgreSQL pool is closed

use std::sync::Arc;
use std::time::Duration;

use tokio::signal;

use crate::delivery::DeliveryWorkerPool;
use crate::postgres::PostgresPool;

/// Configuration for graceful shutdown behavior
#[derive(Debug, Clone)]
pub struct ShutdownConfig {
    /// Time to wait for queued deliveries to complete (default: 30 seconds)
    pub drain_timeout: Duration,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            drain_timeout: Duration::from_secs(30),
        }
    }
}

/// Handles graceful shutdown of the delivery service
pub struct GracefulShutdown {
    worker_pool: Arc<DeliveryWorkerPool>,
    postgres_pool: Option<Arc<PostgresPool>>,
    config: ShutdownConfig,
}

impl GracefulShutdown {
    pub fn new(
        worker_pool: Arc<DeliveryWorkerPool>,
        postgres_pool: Option<Arc<PostgresPool>>,
    ) -> Self {
        Self::with_config(worker_pool, postgres_pool, ShutdownConfig::default())
    }

    /// Create with custom configuration
    pub fn with_config(
        worker_pool: Arc<DeliveryWorkerPool>,
        postgres_pool: Option<Arc<PostgresPool>>,
        config: ShutdownConfig,
    ) -> Self {
        Self {
            worker_pool,
            postgres_pool,
            config,
        }
    }

    /// Execute graceful shutdown sequence
    #[tracing::instrument(name = "graceful_shutdown", skip(self))]
    pub async fn execute(&self, reason: &str) -> ShutdownResult {
        let start = std::time::Instant::now();
        let mut result = ShutdownResult::default();

        tracing::info!(reason = %reason, "Starting graceful shutdown - Phase 1: Draining delivery queue");
        result.queue_drained = self.worker_pool.shutdown(self.config.drain_timeout).await;

        tracing::info!("Phase 2: Closing database connections");
        if let Some(ref pool) = self.postgres_pool {
            pool.close().await;
        }

        result.duration = start.elapsed();
        result.success = true;

        tracing::info!(
            queue_drained = result.queue_drained,
            duration_ms = result.duration.as_millis(),
            "Graceful shutdown completed"
        );

        result
    }
}

/// Result of a graceful shutdown operation
#[derive(Debug, Default)]
pub struct ShutdownResult {
    /// Whether shutdown completed successfully
    pub success: bool,
    /// Whether every queued delivery finished before the timeout
    pub queue_drained: bool,
    /// Total time taken for shutdown
    pub duration: Duration,
}

/// Resolve on Ctrl+C or SIGTERM
pub async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
