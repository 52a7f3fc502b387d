//! Redis Module
//!
//! Redis connection management. Redis is optional: when `redis.url` is empty
//! no connection is made and Redis-backed features (rate limiting) are off.

use redis::aio::ConnectionManager;
use redis::Client;
use tracing::{info, instrument};

use crate::config::RedisSettings;

/// Creates a Redis connection manager with automatic reconnection.
#[instrument(skip(settings))]
pub async fn create_redis_client(
    settings: &RedisSettings,
) -> Result<ConnectionManager, redis::RedisError> {
    info!("Connecting to Redis...");
    let client = Client::open(settings.url.as_str())?;
    let manager = ConnectionManager::new(client).await?;
    info!("Redis connection established");
    Ok(manager)
}

/// Connect when configured, `None` otherwise.
pub async fn connect_optional(
    settings: &RedisSettings,
) -> Result<Option<ConnectionManager>, redis::RedisError> {
    if !settings.is_enabled() {
        info!("Redis not configured; rate limiting disabled");
        return Ok(None);
    }
    create_redis_client(settings).await.map(Some)
}

/// Round-trip a `PING`.
pub async fn ping(conn: &mut ConnectionManager) -> Result<(), redis::RedisError> {
    redis::cmd("PING").query_async::<String>(conn).await.map(|_| ())
}

/// Cache key prefixes.
pub mod keys {
    /// Prefix for rate limiting windows (e.g., "ratelimit:auth:10.0.0.1")
    pub const RATE_LIMIT: &str = "ratelimit:";

    /// Generates a rate limit key
    #[inline]
    pub fn rate_limit(bucket: &str, client: impl std::fmt::Display) -> String {
        format!("{}{}:{}", RATE_LIMIT, bucket, client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_key() {
        assert_eq!(keys::rate_limit("auth", "10.0.0.1"), "ratelimit:auth:10.0.0.1");
    }

    #[tokio::test]
    async fn test_disabled_redis_yields_none() {
        let settings = RedisSettings { url: String::new() };
        assert!(connect_optional(&settings).await.unwrap().is_none());
    }
}
