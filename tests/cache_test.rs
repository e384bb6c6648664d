use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use seeker::cache::{CacheBackend, CacheStore, MemoryBackend};

/// Backend whose every operation fails, standing in for an unreachable
/// cache server.
struct FailingBackend;

#[async_trait]
impl CacheBackend for FailingBackend {
    async fn get(&self, _key: &str) -> Result<Option<String>> {
        anyhow::bail!("connection refused")
    }
    async fn set_ex(&self, _key: &str, _value: &str, _ttl_secs: u64) -> Result<()> {
        anyhow::bail!("connection refused")
    }
    async fn del(&self, _key: &str) -> Result<()> {
        anyhow::bail!("connection refused")
    }
    async fn ttl(&self, _key: &str) -> Result<i64> {
        anyhow::bail!("connection refused")
    }
    async fn keys(&self, _pattern: &str) -> Result<Vec<String>> {
        anyhow::bail!("connection refused")
    }
    async fn zadd(&self, _key: &str, _score: f64, _member: &str) -> Result<()> {
        anyhow::bail!("connection refused")
    }
    async fn zrange(
        &self,
        _key: &str,
        _start: isize,
        _stop: isize,
        _rev: bool,
    ) -> Result<Vec<String>> {
        anyhow::bail!("connection refused")
    }
    async fn hset(&self, _key: &str, _fields: &[(String, String)]) -> Result<()> {
        anyhow::bail!("connection refused")
    }
    async fn hgetall(&self, _key: &str) -> Result<HashMap<String, String>> {
        anyhow::bail!("connection refused")
    }
    fn name(&self) -> &'static str {
        "failing"
    }
}

#[tokio::test]
async fn json_roundtrip_through_the_store() {
    let store = CacheStore::new(Arc::new(MemoryBackend::new()));
    store.set_json("k", &json!({"a": [1, 2]}), 60).await;
    let value: serde_json::Value = store.get_json("k").await.unwrap();
    assert_eq!(value["a"][1], 2);
}

#[tokio::test]
async fn backend_errors_read_as_misses() {
    let store = CacheStore::new(Arc::new(FailingBackend));
    // Writes are swallowed, reads come back as plain misses.
    store.set_json("k", &json!({"a": 1}), 60).await;
    let value: Option<serde_json::Value> = store.get_json("k").await;
    assert!(value.is_none());
    store.delete("k").await;
}

#[tokio::test]
async fn corrupt_entries_read_as_misses() {
    let backend = Arc::new(MemoryBackend::new());
    backend.set_ex("k", "{not json", 60).await.unwrap();
    let store = CacheStore::new(backend);
    let value: Option<serde_json::Value> = store.get_json("k").await;
    assert!(value.is_none());
}

#[tokio::test]
async fn sweep_removes_only_expired_entries() {
    let backend = Arc::new(MemoryBackend::new());
    let store = CacheStore::new(backend.clone());

    store.set_json("search:stale", &json!(1), 1).await;
    store.set_json("search:fresh", &json!(2), 600).await;
    store.set_json("other:stale", &json!(3), 1).await;
    tokio::time::sleep(Duration::from_millis(1100)).await;

    let removed = store.sweep_expired("search:*").await;
    assert_eq!(removed, 1);

    // The fresh entry survives; the out-of-pattern key was not touched.
    let fresh: Option<serde_json::Value> = store.get_json("search:fresh").await;
    assert!(fresh.is_some());
    assert!(backend.keys("other:*").await.unwrap().contains(&"other:stale".to_string()));
}

#[tokio::test]
async fn background_sweeper_purges_expired_entries() {
    let backend = Arc::new(MemoryBackend::new());
    let store = CacheStore::new(backend.clone());

    store.set_json("search:old", &json!(1), 1).await;
    let sweeper = store.spawn_sweeper(Duration::from_millis(200), "search:*".to_string());

    tokio::time::sleep(Duration::from_millis(1500)).await;
    // Physically gone, not just hidden from readers.
    assert!(backend.keys("search:*").await.unwrap().is_empty());
    sweeper.abort();
}

#[tokio::test]
async fn sweep_failure_is_absorbed() {
    let store = CacheStore::new(Arc::new(FailingBackend));
    assert_eq!(store.sweep_expired("search:*").await, 0);
}
