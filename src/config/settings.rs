use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Which LLM backend a provider entry talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Google,
    Anthropic,
    OpenAi,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Google => "google",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::OpenAi => "openai",
        }
    }
}

/// One configured LLM backend. Loaded once at startup; immutable afterwards.
/// Priority ranks are total: no two entries share one.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: String,
    pub priority: u8,
}

impl ProviderConfig {
    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

#[derive(Debug, Clone, Default)]
pub struct SearchSettings {
    /// Base URL of the search endpoint (e.g. a SearXNG instance).
    pub searxng_url: Option<String>,
    /// Serper credential for the video search tool.
    pub serper_api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub use_local_redis: bool,
    pub local_redis_url: String,
    pub upstash_rest_url: Option<String>,
    pub upstash_rest_token: Option<String>,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            use_local_redis: false,
            local_redis_url: "redis://localhost:6379".to_string(),
            upstash_rest_url: None,
            upstash_rest_token: None,
        }
    }
}

/// Optional on-disk overrides (model names, token budget). Credentials never
/// live in the file; they come from the environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub google_model: Option<String>,
    #[serde(default)]
    pub anthropic_model: Option<String>,
    #[serde(default)]
    pub openai_model: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_max_tokens() -> u32 {
    4096
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            google_model: None,
            anthropic_model: None,
            openai_model: None,
            max_tokens: default_max_tokens(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    /// Provider fallback chain, highest priority first.
    pub providers: Vec<ProviderConfig>,
    pub search: SearchSettings,
    pub cache: CacheSettings,
    pub max_tokens: u32,
}

impl Settings {
    /// Load settings from the environment, with optional TOML overrides from
    /// the config directory. Missing credentials disable the matching
    /// provider or tool; they are never a startup failure.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let overrides = match Self::config_path() {
            Ok(path) if path.exists() => {
                let content =
                    fs::read_to_string(&path).context("Failed to read config file")?;
                toml::from_str(&content).context("Failed to parse config file")?
            }
            _ => FileConfig::default(),
        };

        Ok(Self::from_env(&overrides))
    }

    pub fn from_env(overrides: &FileConfig) -> Self {
        let providers = vec![
            ProviderConfig {
                kind: ProviderKind::Google,
                api_key: env_var("GOOGLE_GENERATIVE_AI_API_KEY"),
                base_url: None,
                model: overrides
                    .google_model
                    .clone()
                    .unwrap_or_else(|| "gemini-1.5-pro-002".to_string()),
                priority: 0,
            },
            ProviderConfig {
                kind: ProviderKind::Anthropic,
                api_key: env_var("ANTHROPIC_API_KEY"),
                base_url: None,
                model: overrides
                    .anthropic_model
                    .clone()
                    .unwrap_or_else(|| "claude-3-5-sonnet-20240620".to_string()),
                priority: 1,
            },
            ProviderConfig {
                kind: ProviderKind::OpenAi,
                api_key: env_var("OPENAI_API_KEY"),
                base_url: env_var("OPENAI_API_BASE"),
                model: env_var("OPENAI_API_MODEL")
                    .or_else(|| overrides.openai_model.clone())
                    .unwrap_or_else(|| "gpt-4o".to_string()),
                priority: 2,
            },
        ];

        let search = SearchSettings {
            searxng_url: env_var("SEARXNG_API_URL"),
            serper_api_key: env_var("SERPER_API_KEY"),
        };

        let cache = CacheSettings {
            use_local_redis: env_var("USE_LOCAL_REDIS")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
            local_redis_url: env_var("LOCAL_REDIS_URL")
                .unwrap_or_else(|| "redis://localhost:6379".to_string()),
            upstash_rest_url: env_var("UPSTASH_REDIS_REST_URL"),
            upstash_rest_token: env_var("UPSTASH_REDIS_REST_TOKEN"),
        };

        Self {
            providers,
            search,
            cache,
            max_tokens: overrides.max_tokens,
        }
    }

    pub fn config_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("ai", "seeker", "seeker")
            .context("Could not determine config directory")?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    pub fn configured_providers(&self) -> Vec<&'static str> {
        self.providers
            .iter()
            .filter(|p| p.is_configured())
            .map(|p| p.kind.as_str())
            .collect()
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
