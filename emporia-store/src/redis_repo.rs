use async_trait::async_trait;
use redis::AsyncCommands;
use serde_json::Value;
use std::time::Duration;
use tracing::info;
use crate::cache::{CacheError, SharedCache};

/// Shared cache tier backed by Redis. Values are stored as JSON under
/// `<namespace>:<key>`.
#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
    namespace: String,
}

impl RedisClient {
    pub async fn new(connection_string: &str, namespace: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client, namespace: namespace.to_string() })
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }

    pub async fn ping(&self) -> Result<(), redis::RedisError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }
}

#[async_trait]
impl SharedCache for RedisClient {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let raw: Option<String> = conn.get(self.namespaced(key)).await?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &Value, ttl: Duration) -> Result<(), CacheError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload = serde_json::to_string(value)?;
        // SET EX rejects 0
        let seconds = ttl.as_secs().max(1);
        conn.set_ex::<_, _, ()>(self.namespaced(key), payload, seconds).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        conn.del::<_, ()>(self.namespaced(key)).await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let pattern = format!("{}:*", self.namespace);
        let mut cursor: u64 = 0;
        let mut removed = 0usize;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(500)
                .query_async(&mut conn)
                .await?;

            if !keys.is_empty() {
                removed += keys.len();
                conn.del::<_, ()>(keys).await?;
            }
            if next == 0 {
                break;
            }
            cursor = next;
        }

        info!("Cleared {} shared cache keys under {}", removed, pattern);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ping_fails_without_server() {
        // Opening a client does not connect; only ping finds a dead server.
        let client = RedisClient::new("redis://127.0.0.1:1/", "emporia").await.unwrap();
        assert!(client.ping().await.is_err());
    }

    #[test]
    fn test_keys_are_namespaced() {
        let client = redis::Client::open("redis://127.0.0.1/").unwrap();
        let redis = RedisClient { client, namespace: "emporia".to_string() };
        assert_eq!(redis.namespaced("abc"), "emporia:abc");
    }
}
