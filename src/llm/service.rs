//! LLM Service — holds the configured provider and builds per-request
//! clients when the caller brings their own credential.

use crate::llm::config::{LlmConfig, LlmProviderConfig};
use crate::llm::openai::OpenAIClient;
use crate::llm::provider::LlmProvider;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct LlmService {
    default_provider: Arc<RwLock<Option<Arc<dyn LlmProvider>>>>,
    config: Arc<RwLock<LlmConfig>>,
}

impl LlmService {
    /// Create an LlmService from a persisted config. When no API key
    /// resolves from config or environment, the service still constructs;
    /// requests must then carry their own key.
    pub fn from_config(config: LlmConfig) -> Self {
        let default_provider = build_provider(&config, None);
        if default_provider.is_none() {
            tracing::warn!("[LLM] No API key configured — callers must supply one per request");
        }
        Self {
            default_provider: Arc::new(RwLock::new(default_provider)),
            config: Arc::new(RwLock::new(config)),
        }
    }

    /// Resolve the provider for one request. A caller-supplied key builds a
    /// fresh client against the configured endpoint; otherwise the default
    /// provider is used when one exists.
    pub async fn provider_for(
        &self,
        api_key_override: Option<&str>,
    ) -> Result<Arc<dyn LlmProvider>, String> {
        if let Some(key) = api_key_override.filter(|k| !k.is_empty()) {
            let config = self.config.read().await;
            return build_provider(&config, Some(key))
                .ok_or_else(|| "No LLM provider configured".to_string());
        }

        self.default_provider
            .read()
            .await
            .clone()
            .ok_or_else(|| "OpenAI API key required".to_string())
    }

    pub async fn config(&self) -> LlmConfig {
        self.config.read().await.clone()
    }

    /// Model used for web-search replies.
    pub async fn search_model(&self) -> String {
        self.config.read().await.search_model.clone()
    }

    /// Model used for emotion classification, when overridden.
    pub async fn classifier_model(&self) -> Option<String> {
        self.config.read().await.classifier_model.clone()
    }
}

/// Factory: build a provider from config, optionally forcing the API key.
fn build_provider(config: &LlmConfig, key_override: Option<&str>) -> Option<Arc<dyn LlmProvider>> {
    let provider_cfg = active_provider_config(config)?;

    let api_key = match key_override {
        Some(key) => key.to_string(),
        None => provider_cfg.resolve_api_key()?,
    };

    tracing::info!(
        "[LLM] Initializing OpenAI provider: base_url={}, model={}",
        provider_cfg
            .base_url
            .as_deref()
            .unwrap_or("https://api.openai.com/v1"),
        provider_cfg.model.as_deref().unwrap_or("gpt-4o")
    );

    Some(Arc::new(OpenAIClient::new(
        api_key,
        provider_cfg.base_url.clone(),
        provider_cfg.model.clone(),
    )))
}

fn active_provider_config(config: &LlmConfig) -> Option<&LlmProviderConfig> {
    config
        .providers
        .iter()
        .find(|p| p.id == config.active_provider)
        .or_else(|| config.providers.iter().find(|p| p.enabled))
        .or_else(|| config.providers.first())
}
