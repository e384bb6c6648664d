use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

use super::CacheBackend;

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

#[derive(Default)]
struct Inner {
    entries: HashMap<String, Entry>,
    zsets: HashMap<String, Vec<(f64, String)>>,
    hashes: HashMap<String, HashMap<String, String>>,
}

/// In-process cache backend. Used in tests and whenever no external cache
/// is configured. Expiry is lazy on `get`; `keys` still reports expired
/// entries so the sweep can purge them.
pub struct MemoryBackend {
    inner: RwLock<Inner>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn pattern_matches(pattern: &str, key: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => key.starts_with(prefix),
        None => key == pattern,
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut inner = self.inner.write().map_err(|_| poisoned())?;
        if let Some(entry) = inner.entries.get(key) {
            if entry.expired() {
                inner.entries.remove(key);
                return Ok(None);
            }
            return Ok(Some(entry.value.clone()));
        }
        Ok(None)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        let mut inner = self.inner.write().map_err(|_| poisoned())?;
        inner.entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + Duration::from_secs(ttl_secs)),
            },
        );
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<()> {
        let mut inner = self.inner.write().map_err(|_| poisoned())?;
        inner.entries.remove(key);
        inner.zsets.remove(key);
        inner.hashes.remove(key);
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<i64> {
        let inner = self.inner.read().map_err(|_| poisoned())?;
        match inner.entries.get(key) {
            Some(entry) if entry.expired() => Ok(-2),
            Some(entry) => match entry.expires_at {
                Some(at) => Ok(at.saturating_duration_since(Instant::now()).as_secs() as i64),
                None => Ok(-1),
            },
            None => Ok(-2),
        }
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let inner = self.inner.read().map_err(|_| poisoned())?;
        Ok(inner
            .entries
            .keys()
            .filter(|k| pattern_matches(pattern, k))
            .cloned()
            .collect())
    }

    async fn zadd(&self, key: &str, score: f64, member: &str) -> Result<()> {
        let mut inner = self.inner.write().map_err(|_| poisoned())?;
        let set = inner.zsets.entry(key.to_string()).or_default();
        set.retain(|(_, m)| m != member);
        set.push((score, member.to_string()));
        set.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        Ok(())
    }

    async fn zrange(
        &self,
        key: &str,
        start: isize,
        stop: isize,
        rev: bool,
    ) -> Result<Vec<String>> {
        let inner = self.inner.read().map_err(|_| poisoned())?;
        let Some(set) = inner.zsets.get(key) else {
            return Ok(Vec::new());
        };

        let mut members: Vec<String> = set.iter().map(|(_, m)| m.clone()).collect();
        if rev {
            members.reverse();
        }

        let len = members.len() as isize;
        let norm = |i: isize| -> isize {
            if i < 0 {
                (len + i).max(0)
            } else {
                i.min(len)
            }
        };
        let from = norm(start);
        let to = (norm(stop) + 1).min(len);
        if from >= to {
            return Ok(Vec::new());
        }
        Ok(members[from as usize..to as usize].to_vec())
    }

    async fn hset(&self, key: &str, fields: &[(String, String)]) -> Result<()> {
        let mut inner = self.inner.write().map_err(|_| poisoned())?;
        let hash = inner.hashes.entry(key.to_string()).or_default();
        for (field, value) in fields {
            hash.insert(field.clone(), value.clone());
        }
        Ok(())
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>> {
        let inner = self.inner.read().map_err(|_| poisoned())?;
        Ok(inner.hashes.get(key).cloned().unwrap_or_default())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

fn poisoned() -> anyhow::Error {
    anyhow::anyhow!("cache lock poisoned")
}
