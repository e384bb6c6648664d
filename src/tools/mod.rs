mod retrieve;
mod search;
mod video;

pub use retrieve::RetrieveTool;
pub use search::{search_cache_key, SearchRequest, SearchTool};
pub use video::VideoSearchTool;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::cache::CacheStore;
use crate::config::Settings;
use crate::fetch::Fetcher;
use crate::llm::ToolDefinition;

/// A capability the model may invoke mid-conversation: a pure function of
/// its structured arguments, backed by the fetcher and the cache.
#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDefinition;
    async fn execute(&self, args: &Value) -> Result<Value>;
}

pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn empty() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    /// Register each tool whose external requirements are met. The model is
    /// never offered a tool it cannot execute.
    pub fn from_settings(settings: &Settings, fetcher: Arc<Fetcher>, cache: CacheStore) -> Self {
        let mut registry = Self::empty();

        if let Some(base_url) = settings.search.searxng_url.clone() {
            registry.register(Box::new(SearchTool::new(
                base_url,
                fetcher.clone(),
                cache.clone(),
            )));
        } else {
            tracing::debug!("SEARXNG_API_URL not set; search tool disabled");
        }

        registry.register(Box::new(RetrieveTool::new(fetcher.clone())));

        if let Some(api_key) = settings.search.serper_api_key.clone() {
            registry.register(Box::new(VideoSearchTool::new(api_key, fetcher, cache)));
        } else {
            tracing::debug!("SERPER_API_KEY not set; video search tool disabled");
        }

        tracing::info!(
            "tools initialized: {}",
            registry.names().join(", ")
        );
        registry
    }

    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let def = tool.definition();
        self.tools.insert(def.name, tool);
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> =
            self.tools.values().map(|t| t.definition()).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub async fn execute(&self, name: &str, args: &Value) -> Result<Value> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("tool not found: {name}"))?;
        tool.execute(args).await
    }
}
