//! Database Module
//!
//! PostgreSQL connection pool and migrations. Multi-row writes open their
//! own transaction with `pool.begin()` inside the repository.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

use crate::config::DatabaseSettings;
use crate::infrastructure::metrics;

/// Create a PostgreSQL connection pool
pub async fn create_pool(settings: &DatabaseSettings) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .min_connections(settings.min_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout))
        .connect(&settings.url)
        .await
}

/// Create a pool that connects on first use. Used when the database may not
/// be reachable yet (and by tests that never touch it).
pub fn create_lazy_pool(settings: &DatabaseSettings) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(Duration::from_secs(settings.acquire_timeout))
        .connect_lazy(&settings.url)
}

/// Run database migrations
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Publish the pool's current size to the metrics registry.
pub fn record_pool_stats(pool: &PgPool, max_connections: u32) {
    let idle = pool.num_idle() as u32;
    let size = pool.size();
    metrics::update_db_pool_stats(idle, size.saturating_sub(idle), max_connections);
}
