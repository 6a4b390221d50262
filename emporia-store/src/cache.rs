//! Two cache tiers consulted in order: a process-local `moka` cache in front
//! of a shared store (Redis in production).
//!
//! Values are JSON. A cached `null` is a hit; only an absent or expired
//! entry is a miss.

use async_trait::async_trait;
use moka::Expiry;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache backend error: {0}")]
    Backend(String),

    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<redis::RedisError> for CacheError {
    fn from(e: redis::RedisError) -> Self {
        CacheError::Backend(e.to_string())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("Cached response for key [{key}] was not found")]
pub struct CachedResponseError {
    pub key: String,
}

/// Outcome of a cache lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum CachedResponse {
    Hit { key: String, value: Value },
    Miss { key: String },
}

impl CachedResponse {
    pub fn is_found(&self) -> bool {
        matches!(self, CachedResponse::Hit { .. })
    }

    pub fn key(&self) -> &str {
        match self {
            CachedResponse::Hit { key, .. } | CachedResponse::Miss { key } => key,
        }
    }

    /// Reading the value of a miss is an error, never a default.
    pub fn value(&self) -> Result<&Value, CachedResponseError> {
        match self {
            CachedResponse::Hit { value, .. } => Ok(value),
            CachedResponse::Miss { key } => Err(CachedResponseError { key: key.clone() }),
        }
    }

    pub fn into_value(self) -> Result<Value, CachedResponseError> {
        match self {
            CachedResponse::Hit { value, .. } => Ok(value),
            CachedResponse::Miss { key } => Err(CachedResponseError { key }),
        }
    }
}

#[derive(Clone)]
struct LocalEntry {
    value: Value,
    ttl: Duration,
}

struct LocalExpiry {
    max_ttl: Duration,
}

impl Expiry<String, LocalEntry> for LocalExpiry {
    fn expire_after_create(&self, _key: &String, entry: &LocalEntry, _created_at: Instant) -> Option<Duration> {
        Some(entry.ttl.min(self.max_ttl))
    }
}

/// Process-local tier.
#[derive(Clone)]
pub struct RequestCache {
    inner: moka::future::Cache<String, LocalEntry>,
}

impl RequestCache {
    pub fn new(max_capacity: u64, max_ttl: Duration) -> Self {
        let inner = moka::future::Cache::builder()
            .max_capacity(max_capacity)
            .expire_after(LocalExpiry { max_ttl })
            .build();
        Self { inner }
    }

    pub async fn get_cached_response(&self, key: &str) -> CachedResponse {
        match self.inner.get(key).await {
            Some(entry) => CachedResponse::Hit { key: key.to_string(), value: entry.value },
            None => CachedResponse::Miss { key: key.to_string() },
        }
    }

    pub async fn set(&self, key: &str, value: Value, ttl: Duration) {
        self.inner.insert(key.to_string(), LocalEntry { value, ttl }).await;
    }

    pub async fn delete(&self, key: &str) {
        self.inner.invalidate(key).await;
    }

    pub fn clear(&self) {
        self.inner.invalidate_all();
    }
}

/// Cache shared between processes.
#[async_trait]
pub trait SharedCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError>;

    async fn set(&self, key: &str, value: &Value, ttl: Duration) -> Result<(), CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    async fn clear(&self) -> Result<(), CacheError>;
}

/// Shared tier kept in memory, for development and tests.
#[derive(Default)]
pub struct InMemorySharedCache {
    entries: RwLock<HashMap<String, (Value, Instant)>>,
}

impl InMemorySharedCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored entries, expired ones included until they are next read.
    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn poisoned() -> CacheError {
        CacheError::Backend("in-memory cache lock poisoned".to_string())
    }
}

#[async_trait]
impl SharedCache for InMemorySharedCache {
    async fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let mut entries = self.entries.write().map_err(|_| Self::poisoned())?;
        match entries.get(key) {
            Some((value, expires_at)) if Instant::now() < *expires_at => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &Value, ttl: Duration) -> Result<(), CacheError> {
        let mut entries = self.entries.write().map_err(|_| Self::poisoned())?;
        entries.insert(key.to_string(), (value.clone(), Instant::now() + ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), CacheError> {
        let mut entries = self.entries.write().map_err(|_| Self::poisoned())?;
        entries.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), CacheError> {
        let mut entries = self.entries.write().map_err(|_| Self::poisoned())?;
        entries.clear();
        Ok(())
    }
}

/// Local tier in front of the shared tier.
///
/// Shared-tier failures are logged and read as misses. Concurrent writers of
/// the same key race; the last write wins.
#[derive(Clone)]
pub struct TieredCache {
    local: RequestCache,
    shared: Arc<dyn SharedCache>,
}

impl TieredCache {
    pub fn new(local: RequestCache, shared: Arc<dyn SharedCache>) -> Self {
        Self { local, shared }
    }

    pub async fn get_cached_response(&self, key: &str) -> CachedResponse {
        let local = self.local.get_cached_response(key).await;
        if local.is_found() {
            debug!(key = %key, "Local cache hit");
            return local;
        }

        match self.shared.get(key).await {
            Ok(Some(value)) => {
                debug!(key = %key, "Shared cache hit");
                // The shared tier does not report remaining TTL; keep it locally
                // for at most the local tier's bound.
                self.local.set(key, value.clone(), Duration::MAX).await;
                CachedResponse::Hit { key: key.to_string(), value }
            }
            Ok(None) => CachedResponse::Miss { key: key.to_string() },
            Err(e) => {
                warn!(key = %key, "Shared cache read failed, treating as miss: {}", e);
                CachedResponse::Miss { key: key.to_string() }
            }
        }
    }

    pub async fn set_all_tiers(&self, key: &str, value: Value, ttl: Duration) {
        if let Err(e) = self.shared.set(key, &value, ttl).await {
            warn!(key = %key, "Shared cache write failed: {}", e);
        }
        self.local.set(key, value, ttl).await;
    }

    pub async fn delete_all_tiers(&self, key: &str) {
        self.local.delete(key).await;
        if let Err(e) = self.shared.delete(key).await {
            warn!(key = %key, "Shared cache delete failed: {}", e);
        }
    }

    pub async fn clear_all_tiers(&self) {
        self.local.clear();
        if let Err(e) = self.shared.clear().await {
            warn!("Shared cache clear failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct BrokenSharedCache;

    #[async_trait]
    impl SharedCache for BrokenSharedCache {
        async fn get(&self, _key: &str) -> Result<Option<Value>, CacheError> {
            Err(CacheError::Backend("connection refused".to_string()))
        }

        async fn set(&self, _key: &str, _value: &Value, _ttl: Duration) -> Result<(), CacheError> {
            Err(CacheError::Backend("connection refused".to_string()))
        }

        async fn delete(&self, _key: &str) -> Result<(), CacheError> {
            Err(CacheError::Backend("connection refused".to_string()))
        }

        async fn clear(&self) -> Result<(), CacheError> {
            Err(CacheError::Backend("connection refused".to_string()))
        }
    }

    fn local() -> RequestCache {
        RequestCache::new(100, Duration::from_secs(60))
    }

    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn test_miss_value_is_an_error() {
        let miss = CachedResponse::Miss { key: "k".to_string() };
        assert!(!miss.is_found());
        assert_eq!(miss.value(), Err(CachedResponseError { key: "k".to_string() }));
    }

    #[tokio::test]
    async fn test_cached_null_is_a_hit() {
        let cache = TieredCache::new(local(), Arc::new(InMemorySharedCache::new()));
        cache.set_all_tiers("k", Value::Null, HOUR).await;

        let response = cache.get_cached_response("k").await;
        assert!(response.is_found());
        assert_eq!(response.into_value().unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn test_shared_hit_populates_local() {
        let shared = Arc::new(InMemorySharedCache::new());
        shared.set("k", &json!({"a": 1}), HOUR).await.unwrap();
        let request_cache = local();
        let cache = TieredCache::new(request_cache.clone(), shared.clone());

        assert!(!request_cache.get_cached_response("k").await.is_found());
        assert!(cache.get_cached_response("k").await.is_found());
        assert_eq!(
            request_cache.get_cached_response("k").await.into_value().unwrap(),
            json!({"a": 1})
        );

        // Local copy survives the shared entry going away.
        shared.delete("k").await.unwrap();
        assert!(cache.get_cached_response("k").await.is_found());
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let cache = TieredCache::new(local(), Arc::new(InMemorySharedCache::new()));
        cache.delete_all_tiers("missing").await;

        cache.set_all_tiers("a", json!(1), HOUR).await;
        cache.set_all_tiers("b", json!(2), HOUR).await;
        cache.delete_all_tiers("a").await;
        assert!(!cache.get_cached_response("a").await.is_found());
        assert!(cache.get_cached_response("b").await.is_found());

        cache.clear_all_tiers().await;
        assert!(!cache.get_cached_response("b").await.is_found());
    }

    #[tokio::test]
    async fn test_shared_failure_is_a_miss() {
        let cache = TieredCache::new(local(), Arc::new(BrokenSharedCache));
        assert!(!cache.get_cached_response("k").await.is_found());

        // Local tier still works.
        cache.set_all_tiers("k", json!("v"), HOUR).await;
        assert_eq!(cache.get_cached_response("k").await.into_value().unwrap(), json!("v"));
    }

    #[tokio::test]
    async fn test_shared_entries_expire() {
        let shared = InMemorySharedCache::new();
        shared.set("k", &json!(1), Duration::from_millis(20)).await.unwrap();
        assert!(shared.get("k").await.unwrap().is_some());
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(shared.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_shared_entry_is_dropped_on_read() {
        let shared = InMemorySharedCache::new();
        shared.set("stale", &json!(1), Duration::from_millis(10)).await.unwrap();
        shared.set("fresh", &json!(2), HOUR).await.unwrap();
        assert_eq!(shared.len(), 2);

        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(shared.get("stale").await.unwrap().is_none());
        assert_eq!(shared.len(), 1);
        assert!(shared.get("fresh").await.unwrap().is_some());
    }
}
