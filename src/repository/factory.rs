//! Store backend factory

use std::sync::Arc;

use thiserror::Error;

use crate::config::DatabaseConfig;
use crate::postgres::PostgresPool;

use super::backend::Store;
use super::memory_backend::MemoryStore;
use super::postgres_backend::PostgresStore;

#[derive(Debug, Error)]
pub enum StoreFactoryError {
    #[error("PostgreSQL backend selected but no connection pool is available")]
    MissingPool,

    #[error("Unknown store backend: {0}")]
    UnknownBackend(String),
}

/// Create a store backend based on configuration.
///
/// - `"postgres"`: a `PostgresStore` over the given pool; the pool is required
/// - `"memory"` (default): a `MemoryStore`
///
/// Any other backend name is rejected rather than replaced with memory.
///
/// # Example
///
/// ```rust,ignore
/// let store = create_store(&settings.database, Some(pg_pool.clone()))?;
/// ```
pub fn create_store(
    settings: &DatabaseConfig,
    postgres_pool: Option<Arc<PostgresPool>>,
) -> Result<Arc<dyn Store>, StoreFactoryError> {
    match settings.backend.as_str() {
        "postgres" => {
            let pool = postgres_pool.ok_or(StoreFactoryError::MissingPool)?;
            tracing::info!(backend = "postgres", "Creating PostgreSQL store");
            Ok(Arc::new(PostgresStore::new(pool.pool().clone())))
        }
        "memory" => {
            tracing::info!(backend = "memory", "Creating memory store");
            Ok(Arc::new(MemoryStore::new()))
        }
        other => Err(StoreFactoryError::UnknownBackend(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_backend_is_memory() {
        let store = create_store(&DatabaseConfig::default(), None).unwrap();
        assert_eq!(store.backend_type(), "memory");
    }

    #[test]
    fn test_postgres_without_pool_is_rejected() {
        let settings = DatabaseConfig {
            backend: "postgres".to_string(),
            ..DatabaseConfig::default()
        };
        assert!(matches!(
            create_store(&settings, None),
            Err(StoreFactoryError::MissingPool)
        ));
    }

    #[test]
    fn test_unknown_backend_is_rejected() {
        let settings = DatabaseConfig {
            backend: "redis".to_string(),
            ..DatabaseConfig::default()
        };
        match create_store(&settings, None) {
            Err(StoreFactoryError::UnknownBackend(name)) => assert_eq!(name, "redis"),
            _ => panic!("expected unknown backend error"),
        }
    }
}
