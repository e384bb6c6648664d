use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use url::Url;

use super::Tool;
use crate::cache::{CacheStore, SEARCH_TTL_SECS};
use crate::fetch::{FetchResult, Fetcher};
use crate::llm::ToolDefinition;

const SEARCH_MAX_ATTEMPTS: u32 = 3;

fn default_max_results() -> usize {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default)]
    pub include_domains: Vec<String>,
    #[serde(default)]
    pub exclude_domains: Vec<String>,
}

/// Deterministic key for one logical search: every parameter that affects
/// the result, joined in a fixed order.
pub fn search_cache_key(request: &SearchRequest) -> String {
    format!(
        "search:{}:{}:{}:{}",
        request.query,
        request.max_results,
        request.include_domains.join(","),
        request.exclude_domains.join(",")
    )
}

/// Web search backed by a SearXNG-compatible endpoint, with a 1-hour
/// result cache in front of it.
pub struct SearchTool {
    base_url: String,
    fetcher: Arc<Fetcher>,
    cache: CacheStore,
}

impl SearchTool {
    pub fn new(base_url: String, fetcher: Arc<Fetcher>, cache: CacheStore) -> Self {
        Self {
            base_url,
            fetcher,
            cache,
        }
    }

    fn build_url(&self, request: &SearchRequest) -> Result<Url> {
        let mut url = Url::parse(self.base_url.trim_end_matches('/'))?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("search base URL cannot be a base"))?
            .push("search");
        url.query_pairs_mut()
            .append_pair("q", &request.query)
            .append_pair("format", "json");
        Ok(url)
    }

    fn normalize(request: &SearchRequest, body: Value) -> Value {
        let results: Vec<Value> = body["results"]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter(|r| {
                        r["url"]
                            .as_str()
                            .map(|u| domain_allowed(u, request))
                            .unwrap_or(false)
                    })
                    .take(request.max_results)
                    .map(|r| {
                        json!({
                            "title": r["title"].as_str().unwrap_or(""),
                            "url": r["url"].as_str().unwrap_or(""),
                            "content": r["content"].as_str().unwrap_or(""),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let images = body["images"].as_array().cloned().unwrap_or_default();

        json!({
            "query": request.query,
            "number_of_results": results.len(),
            "results": results,
            "images": images,
        })
    }
}

fn error_envelope(query: &str, error: &str) -> Value {
    json!({
        "message": "Internal Server Error",
        "error": error,
        "query": query,
        "results": [],
        "images": [],
        "number_of_results": 0,
    })
}

fn domain_allowed(url: &str, request: &SearchRequest) -> bool {
    let Some(host) = Url::parse(url).ok().and_then(|u| u.host_str().map(String::from)) else {
        return false;
    };
    let matches = |domain: &String| host == *domain || host.ends_with(&format!(".{domain}"));

    if !request.include_domains.is_empty() && !request.include_domains.iter().any(|d| matches(d)) {
        return false;
    }
    !request.exclude_domains.iter().any(|d| matches(d))
}

#[async_trait]
impl Tool for SearchTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "search".to_string(),
            description: "Search the web for up-to-date information".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The search query"
                    },
                    "max_results": {
                        "type": "integer",
                        "description": "Maximum number of results to return"
                    },
                    "include_domains": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Restrict results to these domains"
                    },
                    "exclude_domains": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Drop results from these domains"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    async fn execute(&self, args: &Value) -> Result<Value> {
        let request: SearchRequest = serde_json::from_value(args.clone())?;
        let cache_key = search_cache_key(&request);

        if let Some(hit) = self.cache.get_json::<Value>(&cache_key).await {
            return Ok(hit);
        }

        let url = self.build_url(&request)?;
        match self
            .fetcher
            .fetch_json_with_retry(url.as_str(), SEARCH_MAX_ATTEMPTS)
            .await
        {
            Ok(FetchResult::Json(body)) => {
                let normalized = Self::normalize(&request, body);
                self.cache
                    .set_json(&cache_key, &normalized, SEARCH_TTL_SECS)
                    .await;
                Ok(normalized)
            }
            Ok(FetchResult::Malformed {
                status,
                body_prefix,
            }) => {
                tracing::warn!("search returned non-JSON (status {status}): {body_prefix}");
                Ok(error_envelope(
                    &request.query,
                    &format!("invalid JSON response (status {status}): {body_prefix}"),
                ))
            }
            Err(e) => {
                tracing::error!("search failed for {:?}: {e}", request.query);
                Ok(error_envelope(&request.query, &e.to_string()))
            }
        }
    }
}
