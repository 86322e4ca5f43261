//! TTS Service — manages the configured provider and routes synthesis
//! requests, honoring per-request credentials.

use super::config::{TtsConfig, TtsProviderConfig};
use super::interface::{TtsError, TtsParams, TtsProvider};
use super::openai::OpenAITtsProvider;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct TtsService {
    default_provider: Arc<RwLock<Option<Arc<dyn TtsProvider>>>>,
    config: Arc<RwLock<TtsConfig>>,
}

impl TtsService {
    pub fn init_from_config(config: &TtsConfig) -> Self {
        let default_provider = active_config(config)
            .and_then(|cfg| build_provider(cfg, None));

        match &default_provider {
            Some(p) => tracing::info!("[TTS] Initialized with provider '{}'", p.id()),
            None => tracing::warn!("[TTS] No usable provider — synthesis will be skipped"),
        }

        Self {
            default_provider: Arc::new(RwLock::new(default_provider)),
            config: Arc::new(RwLock::new(config.clone())),
        }
    }

    /// Synthesize speech for `text` with the given voice.
    pub async fn synthesize(
        &self,
        text: &str,
        voice: Option<String>,
        api_key_override: Option<&str>,
    ) -> Result<Vec<u8>, TtsError> {
        let provider = match api_key_override.filter(|k| !k.is_empty()) {
            Some(key) => {
                let config = self.config.read().await;
                active_config(&config)
                    .and_then(|cfg| build_provider(cfg, Some(key)))
                    .ok_or_else(|| {
                        TtsError::ConfigError("No TTS provider configured".to_string())
                    })?
            }
            None => self.default_provider.read().await.clone().ok_or_else(|| {
                TtsError::Unavailable("OpenAI API key required".to_string())
            })?,
        };

        provider
            .synthesize(text, TtsParams { voice, speed: None })
            .await
    }

    pub async fn get_config(&self) -> TtsConfig {
        self.config.read().await.clone()
    }
}

fn active_config(config: &TtsConfig) -> Option<&TtsProviderConfig> {
    config
        .providers
        .iter()
        .find(|p| p.id == config.active_provider && p.enabled)
        .or_else(|| config.providers.iter().find(|p| p.enabled))
}

fn build_provider(
    config: &TtsProviderConfig,
    key_override: Option<&str>,
) -> Option<Arc<dyn TtsProvider>> {
    match config.provider_type.as_str() {
        "openai" => OpenAITtsProvider::from_config(config, key_override)
            .map(|p| Arc::new(p) as Arc<dyn TtsProvider>),
        other => {
            tracing::warn!("[TTS] Unknown provider type: {}", other);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_without_key() -> TtsConfig {
        let mut config = TtsConfig::default();
        for p in &mut config.providers {
            p.api_key = None;
            p.api_key_env = Some("MAUM_TEST_NO_SUCH_KEY".to_string());
        }
        config
    }

    #[tokio::test]
    async fn missing_key_is_unavailable() {
        let service = TtsService::init_from_config(&config_without_key());
        let err = service.synthesize("hello", None, None).await.unwrap_err();
        assert!(matches!(err, TtsError::Unavailable(_)));
    }

    #[tokio::test]
    async fn caller_key_builds_a_provider() {
        // The ephemeral provider is built; the network call then fails
        // against the real endpoint with a fake key, which proves provider
        // resolution succeeded.
        let mut config = config_without_key();
        config.providers[0].base_url = Some("http://127.0.0.1:1".to_string());
        let service = TtsService::init_from_config(&config);
        let err = service
            .synthesize("hello", None, Some("sk-user"))
            .await
            .unwrap_err();
        assert!(matches!(err, TtsError::SynthesisFailed(_)));
    }
}
