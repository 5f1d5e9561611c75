use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use synapse_notification_service::config::{DatabaseConfig, Settings};
use synapse_notification_service::postgres::PostgresPool;
use synapse_notification_service::repository::create_store;
use synapse_notification_service::server::{create_app, AppState};
use synapse_notification_service::shutdown::{wait_for_signal, GracefulShutdown};
use synapse_notification_service::transport::TransportRegistry;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    init_tracing();

    // Load configuration
    let settings = Settings::new()?;
    tracing::info!("Configuration loaded");

    let postgres_pool = connect_postgres(&settings.database).await?;
    let store = create_store(&settings.database, postgres_pool.clone())?;

    let transports = TransportRegistry::with_defaults(&settings.delivery)?;

    // Create application state (starts the delivery workers)
    let state = AppState::new(settings.clone(), store, transports, postgres_pool.clone());
    tracing::info!(
        backend = state.store.backend_type(),
        workers = settings.delivery.workers,
        "Application state initialized"
    );

    let shutdown = GracefulShutdown::new(state.worker_pool.clone(), postgres_pool);

    // Create Axum app
    let app = create_app(state);

    // Start server
    let addr = settings.server_addr();
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(wait_for_signal())
        .await?;

    shutdown.execute("server stopped").await;

    tracing::info!("Server shutdown complete");
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    // LOG_FORMAT=json for log shippers
    if std::env::var("LOG_FORMAT").is_ok_and(|f| f == "json") {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

/// Connect and apply the schema when the postgres backend is selected.
/// Startup aborts if either step fails.
async fn connect_postgres(config: &DatabaseConfig) -> Result<Option<Arc<PostgresPool>>> {
    if config.backend != "postgres" {
        return Ok(None);
    }

    let pool = PostgresPool::new(config)
        .await
        .context("Failed to connect to PostgreSQL")?;

    pool.apply_schema()
        .await
        .context("Failed to apply database schema")?;

    tracing::info!(url = %pool.database_url_masked(), "PostgreSQL ready");
    Ok(Some(Arc::new(pool)))
}
