//! STT Service — manages the configured provider and routes transcription
//! requests, honoring per-request credentials.

use super::config::{SttConfig, SttProviderConfig};
use super::interface::{SttError, SttProvider};
use super::openai::OpenAIWhisperProvider;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct SttService {
    default_provider: Arc<RwLock<Option<Arc<dyn SttProvider>>>>,
    config: Arc<RwLock<SttConfig>>,
}

impl SttService {
    /// Initialize from config. Without a resolvable API key the service
    /// still constructs; requests must then carry their own key.
    pub fn init_from_config(config: &SttConfig) -> Self {
        let default_provider = active_config(config)
            .and_then(|cfg| build_provider(cfg, None));

        match &default_provider {
            Some(p) => tracing::info!("[STT] Initialized with provider '{}'", p.id()),
            None => tracing::warn!("[STT] No usable provider — callers must supply an API key"),
        }

        Self {
            default_provider: Arc::new(RwLock::new(default_provider)),
            config: Arc::new(RwLock::new(config.clone())),
        }
    }

    /// Transcribe audio. `api_key_override` is the caller-supplied
    /// credential, preferred over the configured one.
    pub async fn transcribe(
        &self,
        audio: &[u8],
        format: &str,
        api_key_override: Option<&str>,
    ) -> Result<String, SttError> {
        let (language, active) = {
            let config = self.config.read().await;
            (config.language.clone(), active_config(&config).cloned())
        };

        let provider = match api_key_override.filter(|k| !k.is_empty()) {
            Some(key) => active
                .as_ref()
                .and_then(|cfg| build_provider(cfg, Some(key)))
                .ok_or_else(|| {
                    SttError::ConfigError("No STT provider configured".to_string())
                })?,
            None => self.default_provider.read().await.clone().ok_or_else(|| {
                SttError::ProviderUnavailable("OpenAI API key required".to_string())
            })?,
        };

        provider.transcribe(audio, format, language.as_deref()).await
    }

    pub async fn get_config(&self) -> SttConfig {
        self.config.read().await.clone()
    }
}

fn active_config(config: &SttConfig) -> Option<&SttProviderConfig> {
    config
        .providers
        .iter()
        .find(|p| p.id == config.active_provider && p.enabled)
        .or_else(|| config.providers.iter().find(|p| p.enabled))
}

/// Build a provider from config, optionally forcing the API key.
fn build_provider(
    config: &SttProviderConfig,
    key_override: Option<&str>,
) -> Option<Arc<dyn SttProvider>> {
    let api_key = match key_override {
        Some(key) => key.to_string(),
        None => config.resolve_api_key()?,
    };

    match config.provider_type.as_str() {
        "openai_whisper" => Some(Arc::new(OpenAIWhisperProvider::new(
            config.id.clone(),
            api_key,
            config.base_url.clone(),
            config.model.clone(),
        ))),
        other => {
            tracing::warn!("[STT] Unknown provider type: {}", other);
            None
        }
    }
}
