mod memory;
mod redis_backend;
mod upstash;

pub use memory::MemoryBackend;
pub use redis_backend::RedisBackend;
pub use upstash::UpstashBackend;

use anyhow::Result;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::CacheSettings;

/// TTL for cached search results.
pub const SEARCH_TTL_SECS: u64 = 3600;
/// Interval between background expiry sweeps.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(3600);

/// Key-value/sorted-set store surface. Implemented by a self-hosted Redis,
/// a managed REST store, and an in-process map; call sites never branch on
/// which backend is active.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()>;
    async fn del(&self, key: &str) -> Result<()>;
    /// Remaining TTL in seconds; -1 for no expiry, -2 for a missing or
    /// logically expired key.
    async fn ttl(&self, key: &str) -> Result<i64>;
    async fn keys(&self, pattern: &str) -> Result<Vec<String>>;
    async fn zadd(&self, key: &str, score: f64, member: &str) -> Result<()>;
    async fn zrange(&self, key: &str, start: isize, stop: isize, rev: bool)
        -> Result<Vec<String>>;
    async fn hset(&self, key: &str, fields: &[(String, String)]) -> Result<()>;
    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>>;
    fn name(&self) -> &'static str;
}

/// TTL cache over one backend. Constructed once at startup and passed in
/// explicitly; every backend error is absorbed so the cache is only ever an
/// optimization, never a correctness dependency.
#[derive(Clone)]
pub struct CacheStore {
    backend: Arc<dyn CacheBackend>,
}

impl CacheStore {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self { backend }
    }

    /// Pick a backend from settings. Unreachable backends degrade to the
    /// in-process map with a warning rather than failing startup.
    pub async fn connect(settings: &CacheSettings) -> Self {
        if settings.use_local_redis {
            match RedisBackend::connect(&settings.local_redis_url).await {
                Ok(backend) => {
                    tracing::info!("connected to Redis at {}", settings.local_redis_url);
                    return Self::new(Arc::new(backend));
                }
                Err(e) => {
                    tracing::warn!("failed to connect to Redis: {e}; using in-memory cache");
                }
            }
        } else if let (Some(url), Some(token)) = (
            settings.upstash_rest_url.as_deref(),
            settings.upstash_rest_token.as_deref(),
        ) {
            match UpstashBackend::new(url, token) {
                Ok(backend) => {
                    tracing::info!("using managed REST cache backend");
                    return Self::new(Arc::new(backend));
                }
                Err(e) => {
                    tracing::warn!("failed to initialize REST cache: {e}; using in-memory cache");
                }
            }
        }
        Self::new(Arc::new(MemoryBackend::new()))
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        match self.backend.get(key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => {
                    tracing::debug!("cache hit for key: {key}");
                    Some(value)
                }
                Err(e) => {
                    tracing::warn!("cache entry for {key} failed to deserialize: {e}");
                    None
                }
            },
            Ok(None) => {
                tracing::debug!("cache miss for key: {key}");
                None
            }
            Err(e) => {
                tracing::warn!("cache get error for {key}: {e}");
                None
            }
        }
    }

    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) {
        let raw = match serde_json::to_string(value) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!("failed to serialize cache entry for {key}: {e}");
                return;
            }
        };
        if let Err(e) = self.backend.set_ex(key, &raw, ttl_secs).await {
            tracing::warn!("cache set error for {key}: {e}");
        }
    }

    pub async fn delete(&self, key: &str) {
        if let Err(e) = self.backend.del(key).await {
            tracing::warn!("cache delete error for {key}: {e}");
        }
    }

    /// One sweep pass: remove entries under `pattern` whose TTL has run out.
    /// Advisory only; native backend TTLs are the primary enforcement.
    pub async fn sweep_expired(&self, pattern: &str) -> usize {
        let keys = match self.backend.keys(pattern).await {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!("cache sweep error: {e}");
                return 0;
            }
        };

        let mut removed = 0;
        for key in keys {
            match self.backend.ttl(&key).await {
                // -1 is "no expiry"; only reap keys that have actually run out.
                Ok(ttl) if ttl == 0 || ttl == -2 => {
                    if self.backend.del(&key).await.is_ok() {
                        tracing::debug!("removed expired cache entry: {key}");
                        removed += 1;
                    }
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("cache sweep ttl error for {key}: {e}"),
            }
        }
        removed
    }

    /// Background expiry sweep, independent of request handling.
    pub fn spawn_sweeper(
        &self,
        interval: Duration,
        pattern: String,
    ) -> tokio::task::JoinHandle<()> {
        let store = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick fires immediately; skip it so the sweep stays periodic.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let removed = store.sweep_expired(&pattern).await;
                if removed > 0 {
                    tracing::info!("cache sweep removed {removed} expired entries");
                }
            }
        })
    }
}
