//! Postgres persistence for the host platform adapter

pub mod channel_repository;
pub mod error;
pub mod host;
pub mod order_repository;
pub mod payment_method_repository;
pub mod settlement_repository;
pub mod transaction;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::{error as log_error, info, warn};
use uuid::Uuid;

use self::error::{DatabaseError, DbResult};

pub use self::host::PgHost;

/// Database pool configuration
#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub connection_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_lifetime: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 20,
            min_connections: 2,
            connection_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            max_lifetime: Duration::from_secs(1800),
        }
    }
}

impl PoolConfig {
    pub fn with_max_connections(max_connections: u32) -> Self {
        let defaults = Self::default();
        Self {
            max_connections,
            min_connections: defaults.min_connections.min(max_connections),
            ..defaults
        }
    }
}

/// Initialize the database connection pool
pub async fn init_pool(database_url: &str, config: Option<PoolConfig>) -> DbResult<PgPool> {
    let config = config.unwrap_or_default();

    info!(
        "Initializing database pool: max_connections={}, min_connections={}, connection_timeout={:?}",
        config.max_connections, config.min_connections, config.connection_timeout
    );

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(config.connection_timeout)
        .idle_timeout(config.idle_timeout)
        .max_lifetime(config.max_lifetime)
        .connect(database_url)
        .await
        .map_err(|e| {
            log_error!("Failed to initialize database pool: {}", e);
            DatabaseError::from_sqlx(e)
        })?;

    info!("Database pool initialized successfully");
    Ok(pool)
}

/// Apply the schema in `migrations/`
pub async fn run_migrations(pool: &PgPool) -> DbResult<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| {
            log_error!("Failed to run migrations: {}", e);
            DatabaseError::from_sqlx(e.into())
        })?;
    info!("Database migrations applied");
    Ok(())
}

/// Connection pool health check
pub async fn health_check(pool: &PgPool) -> DbResult<()> {
    sqlx::query("SELECT 1")
        .execute(pool)
        .await
        .map_err(|e| {
            warn!("Health check failed: {}", e);
            DatabaseError::from_sqlx(e)
        })?;

    Ok(())
}

/// Parse a textual entity id coming from the domain layer
pub(crate) fn parse_id(entity: &str, value: &str) -> DbResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| DatabaseError::decode(format!("invalid {} id '{}': {}", entity, value, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pool_config() {
        let config = PoolConfig::default();
        assert_eq!(config.max_connections, 20);
        assert_eq!(config.min_connections, 2);
        assert_eq!(config.connection_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_min_connections_never_exceed_max() {
        let config = PoolConfig::with_max_connections(1);
        assert_eq!(config.max_connections, 1);
        assert_eq!(config.min_connections, 1);
    }

    #[test]
    fn test_parse_id_rejects_garbage() {
        let err = parse_id("Order", "not-a-uuid").unwrap_err();
        assert!(err.to_string().contains("invalid Order id"));
        assert!(parse_id("Order", &Uuid::new_v4().to_string()).is_ok());
    }

    #[tokio::test]
    #[ignore] // Requires DATABASE_URL
    async fn test_pool_initialization() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let pool = init_pool(&url, Some(PoolConfig::with_max_connections(2)))
            .await
            .unwrap();
        assert!(health_check(&pool).await.is_ok());
    }
}
