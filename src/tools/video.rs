use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use super::Tool;
use crate::cache::{CacheStore, SEARCH_TTL_SECS};
use crate::fetch::{FetchResult, Fetcher};
use crate::llm::ToolDefinition;

const SERPER_VIDEOS_URL: &str = "https://google.serper.dev/videos";
const MAX_VIDEOS: usize = 10;

/// Video search via the Serper API. Failures degrade to an empty video
/// list rather than surfacing an error to the model.
pub struct VideoSearchTool {
    api_key: String,
    fetcher: Arc<Fetcher>,
    cache: CacheStore,
}

impl VideoSearchTool {
    pub fn new(api_key: String, fetcher: Arc<Fetcher>, cache: CacheStore) -> Self {
        Self {
            api_key,
            fetcher,
            cache,
        }
    }
}

pub fn video_cache_key(query: &str) -> String {
    format!("videoSearch:{query}")
}

fn truncate_videos(mut body: Value) -> Value {
    if let Some(videos) = body["videos"].as_array_mut() {
        videos.truncate(MAX_VIDEOS);
    } else {
        body["videos"] = json!([]);
    }
    body
}

#[async_trait]
impl Tool for VideoSearchTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "video_search".to_string(),
            description: "Search for videos related to a query".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The video search query"
                    }
                },
                "required": ["query"]
            }),
        }
    }

    async fn execute(&self, args: &Value) -> Result<Value> {
        let query = args["query"]
            .as_str()
            .ok_or_else(|| anyhow::anyhow!("video_search requires a \"query\" argument"))?;
        let cache_key = video_cache_key(query);

        if let Some(hit) = self.cache.get_json::<Value>(&cache_key).await {
            return Ok(hit);
        }

        let result = self
            .fetcher
            .post_json(
                SERPER_VIDEOS_URL,
                &[("X-API-KEY", self.api_key.as_str())],
                &json!({"q": query}),
            )
            .await;

        match result {
            Ok(FetchResult::Json(body)) => {
                let truncated = truncate_videos(body);
                self.cache
                    .set_json(&cache_key, &truncated, SEARCH_TTL_SECS)
                    .await;
                Ok(truncated)
            }
            Ok(FetchResult::Malformed { status, .. }) => {
                tracing::warn!("video search returned non-JSON (status {status})");
                Ok(json!({"videos": []}))
            }
            Err(e) => {
                tracing::error!("video search failed for {query:?}: {e}");
                Ok(json!({"videos": []}))
            }
        }
    }
}
