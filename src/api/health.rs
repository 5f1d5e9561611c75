//! Health check endpoint.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub store: StoreHealthResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postgres: Option<PostgresHealthResponse>,
    pub delivery: DeliveryHealthResponse,
}

#[derive(Debug, Serialize)]
pub struct StoreHealthResponse {
    pub backend: String,
}

#[derive(Debug, Serialize)]
pub struct PostgresHealthResponse {
    pub connected: bool,
    pub pool_size: u32,
    pub idle_connections: u32,
}

#[derive(Debug, Serialize)]
pub struct DeliveryHealthResponse {
    pub workers: usize,
    pub queue_capacity: usize,
    pub transports: Vec<String>,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime_seconds = state.start_time.elapsed().as_secs();

    let postgres = match state.postgres_pool {
        Some(ref pool) => {
            let inner_pool = pool.pool();
            let connected = sqlx::query("SELECT 1").execute(inner_pool).await.is_ok();
            Some(PostgresHealthResponse {
                connected,
                pool_size: inner_pool.size(),
                idle_connections: inner_pool.num_idle() as u32,
            })
        }
        None => None,
    };

    let mut transports: Vec<String> = state
        .processor
        .transport_kinds()
        .iter()
        .map(|k| k.as_str().to_string())
        .collect();
    transports.sort();

    let healthy = postgres.as_ref().map(|p| p.connected).unwrap_or(true);
    let status = if healthy { "healthy" } else { "degraded" };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        store: StoreHealthResponse {
            backend: state.store.backend_type().to_string(),
        },
        postgres,
        delivery: DeliveryHealthResponse {
            workers: state.settings.delivery.workers,
            queue_capacity: state.settings.delivery.queue_capacity,
            transports,
        },
    })
}
