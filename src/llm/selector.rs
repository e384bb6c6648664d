use std::sync::Arc;
use thiserror::Error;

use super::providers::{AnthropicProvider, GeminiProvider, OpenAiProvider, Provider};
use crate::config::{ProviderConfig, ProviderKind, Settings};

/// Ready-to-call provider+model pair. Carries no mutable state.
pub type ModelHandle = Arc<dyn Provider>;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("no LLM provider configured; set at least one provider API key")]
    NoProviderConfigured,
}

/// Walk the provider chain in priority order and return the first handle
/// that constructs. A provider is tried exactly once per call; construction
/// failures are logged and skipped.
pub fn resolve(settings: &Settings) -> Result<ModelHandle, LlmError> {
    for config in &settings.providers {
        if !config.is_configured() {
            continue;
        }
        match build_handle(config, settings.max_tokens) {
            Ok(handle) => {
                tracing::debug!(provider = config.kind.as_str(), model = %config.model, "provider resolved");
                return Ok(handle);
            }
            Err(e) => {
                tracing::warn!(
                    provider = config.kind.as_str(),
                    "failed to initialize provider: {e}"
                );
            }
        }
    }
    Err(LlmError::NoProviderConfigured)
}

fn build_handle(config: &ProviderConfig, max_tokens: u32) -> anyhow::Result<ModelHandle> {
    let key = config.api_key.clone().unwrap_or_default();
    let handle: ModelHandle = match config.kind {
        ProviderKind::Google => {
            Arc::new(GeminiProvider::new(key, config.model.clone(), max_tokens)?)
        }
        ProviderKind::Anthropic => {
            Arc::new(AnthropicProvider::new(key, config.model.clone(), max_tokens)?)
        }
        ProviderKind::OpenAi => Arc::new(OpenAiProvider::new(
            key,
            config.model.clone(),
            config.base_url.clone(),
        )?),
    };
    Ok(handle)
}

/// Log which providers are usable. Run once at startup.
pub fn log_available(settings: &Settings) {
    let available = settings.configured_providers();
    if available.is_empty() {
        tracing::warn!("no AI providers configured; queries will fail until one is set");
    } else {
        tracing::info!("available AI providers: {}", available.join(", "));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CacheSettings, SearchSettings};

    fn settings_with(providers: Vec<ProviderConfig>) -> Settings {
        Settings {
            providers,
            search: SearchSettings::default(),
            cache: CacheSettings::default(),
            max_tokens: 1024,
        }
    }

    fn provider(kind: ProviderKind, key: Option<&str>, priority: u8) -> ProviderConfig {
        ProviderConfig {
            kind,
            api_key: key.map(String::from),
            base_url: None,
            model: "test-model".to_string(),
            priority,
        }
    }

    #[test]
    fn picks_highest_priority_configured() {
        let settings = settings_with(vec![
            provider(ProviderKind::Google, None, 0),
            provider(ProviderKind::Anthropic, Some("sk-ant-x"), 1),
            provider(ProviderKind::OpenAi, Some("sk-x"), 2),
        ]);
        let handle = resolve(&settings).unwrap();
        assert_eq!(handle.name(), "anthropic");
    }

    #[test]
    fn falls_through_on_construction_failure() {
        // Whitespace in the key makes construction fail; the chain advances.
        let settings = settings_with(vec![
            provider(ProviderKind::Google, Some("bad key"), 0),
            provider(ProviderKind::OpenAi, Some("sk-ok"), 2),
        ]);
        let handle = resolve(&settings).unwrap();
        assert_eq!(handle.name(), "openai");
    }

    #[test]
    fn errors_when_nothing_configured() {
        let settings = settings_with(vec![
            provider(ProviderKind::Google, None, 0),
            provider(ProviderKind::Anthropic, None, 1),
        ]);
        assert!(matches!(
            resolve(&settings),
            Err(LlmError::NoProviderConfigured)
        ));
    }

    #[test]
    fn errors_when_all_constructions_fail() {
        let settings = settings_with(vec![
            provider(ProviderKind::Google, Some("bad key"), 0),
            provider(ProviderKind::Anthropic, Some("also bad"), 1),
        ]);
        assert!(matches!(
            resolve(&settings),
            Err(LlmError::NoProviderConfigured)
        ));
    }
}
