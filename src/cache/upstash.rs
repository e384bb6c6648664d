use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;
use std::collections::HashMap;

use super::CacheBackend;

/// Managed REST cache backend (Upstash-style protocol): each command is a
/// JSON array POSTed to the base URL, answered with `{"result": ...}`.
pub struct UpstashBackend {
    http: reqwest::Client,
    base_url: String,
}

impl UpstashBackend {
    pub fn new(base_url: &str, token: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}"))?,
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn command(&self, parts: &[String]) -> Result<Value> {
        let response = self
            .http
            .post(&self.base_url)
            .json(&parts)
            .send()
            .await?;
        let body: Value = response.json().await?;
        if let Some(error) = body.get("error").and_then(|e| e.as_str()) {
            return Err(anyhow!("cache command failed: {error}"));
        }
        Ok(body["result"].clone())
    }
}

fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|s| s.to_string()).collect()
}

#[async_trait]
impl CacheBackend for UpstashBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let result = self.command(&args(&["GET", key])).await?;
        Ok(result.as_str().map(String::from))
    }

    async fn set_ex(&self, key: &str, value: &str, ttl_secs: u64) -> Result<()> {
        self.command(&args(&["SET", key, value, "EX", &ttl_secs.to_string()]))
            .await?;
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.command(&args(&["DEL", key])).await?;
        Ok(())
    }

    async fn ttl(&self, key: &str) -> Result<i64> {
        let result = self.command(&args(&["TTL", key])).await?;
        result
            .as_i64()
            .ok_or_else(|| anyhow!("unexpected TTL reply: {result}"))
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>> {
        let result = self.command(&args(&["KEYS", pattern])).await?;
        Ok(result
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn zadd(&self, key: &str, score: f64, member: &str) -> Result<()> {
        self.command(&args(&["ZADD", key, &score.to_string(), member]))
            .await?;
        Ok(())
    }

    async fn zrange(
        &self,
        key: &str,
        start: isize,
        stop: isize,
        rev: bool,
    ) -> Result<Vec<String>> {
        let mut parts = args(&[
            "ZRANGE",
            key,
            &start.to_string(),
            &stop.to_string(),
        ]);
        if rev {
            parts.push("REV".to_string());
        }
        let result = self.command(&parts).await?;
        Ok(result
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn hset(&self, key: &str, fields: &[(String, String)]) -> Result<()> {
        let mut parts = args(&["HSET", key]);
        for (field, value) in fields {
            parts.push(field.clone());
            parts.push(value.clone());
        }
        self.command(&parts).await?;
        Ok(())
    }

    async fn hgetall(&self, key: &str) -> Result<HashMap<String, String>> {
        let result = self.command(&args(&["HGETALL", key])).await?;
        let mut map = HashMap::new();
        if let Some(flat) = result.as_array() {
            for pair in flat.chunks(2) {
                if let [field, value] = pair {
                    if let (Some(f), Some(v)) = (field.as_str(), value.as_str()) {
                        map.insert(f.to_string(), v.to_string());
                    }
                }
            }
        }
        Ok(map)
    }

    fn name(&self) -> &'static str {
        "upstash"
    }
}
