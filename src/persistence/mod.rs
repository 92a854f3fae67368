use crate::cache::WarmStore;
use crate::error::CacheError;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::time::Duration;
use tokio::time::timeout;

const KEY_PREFIX: &str = "marketfeed:";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Redis-backed warm tier
///
/// Values are JSON strings under `marketfeed:{key}` with `EX` set to the warm
/// lifetime, so Redis itself enforces expiry.
#[derive(Clone)]
pub struct RedisWarmStore {
    conn: ConnectionManager,
}

impl RedisWarmStore {
    /// Connect to Redis
    ///
    /// # Arguments
    /// * `redis_url` - Redis connection URL (e.g., "redis://127.0.0.1:6379")
    pub async fn new(redis_url: &str) -> Result<Self, CacheError> {
        let client = Client::open(redis_url)?;

        let conn = timeout(CONNECT_TIMEOUT, ConnectionManager::new(client))
            .await
            .map_err(|_| CacheError::ConnectTimeout)??;

        tracing::info!("Connected to Redis warm cache at {}", redis_url);

        Ok(Self { conn })
    }

    fn key(key: &str) -> String {
        format!("{}{}", KEY_PREFIX, key)
    }
}

#[async_trait]
impl WarmStore for RedisWarmStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, CacheError> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(Self::key(key)).await?;

        match raw {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    async fn put(
        &self,
        key: &str,
        value: &serde_json::Value,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let json = serde_json::to_string(value)?;
        // EX takes whole seconds; never round down to "no expiry"
        let seconds = ttl.as_secs().max(1);

        conn.set_ex::<_, _, ()>(Self::key(key), json, seconds).await?;

        tracing::debug!(key = %key, ttl_secs = seconds, "Stored warm cache entry");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_prefix() {
        assert_eq!(RedisWarmStore::key("quotes:BTC/USDT"), "marketfeed:quotes:BTC/USDT");
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn test_connection_timeout() {
        // Non-routable address
        let result = RedisWarmStore::new("redis://10.255.255.1:6379").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    async fn test_round_trip_with_expiry() {
        let redis_url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string());
        let store = RedisWarmStore::new(&redis_url).await.unwrap();

        let value = serde_json::json!({"value": 50, "classification": "Neutral"});
        store
            .put("test:sentiment", &value, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(store.get("test:sentiment").await.unwrap(), Some(value));

        tokio::time::sleep(Duration::from_millis(2100)).await;
        assert_eq!(store.get("test:sentiment").await.unwrap(), None);
    }
}
