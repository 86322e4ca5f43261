//! TTS configuration — persisted to `tts_config.json`.

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsProviderConfig {
    pub id: String,
    /// "openai" (any OpenAI-compatible speech endpoint)
    pub provider_type: String,
    #[serde(default = "default_true")]
    pub enabled: bool,

    pub api_key: Option<String>,
    pub api_key_env: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub default_voice: Option<String>,
}

impl TtsProviderConfig {
    /// Resolve the API key: check `api_key` field first, then `api_key_env`.
    pub fn resolve_api_key(&self) -> Option<String> {
        crate::config::resolve_api_key(&self.api_key, &self.api_key_env)
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TtsConfig {
    #[serde(default = "default_active_provider")]
    pub active_provider: String,

    #[serde(default = "default_providers")]
    pub providers: Vec<TtsProviderConfig>,
}

fn default_active_provider() -> String {
    "openai".to_string()
}

fn default_providers() -> Vec<TtsProviderConfig> {
    vec![TtsProviderConfig {
        id: "openai".to_string(),
        provider_type: "openai".to_string(),
        enabled: true,
        api_key: None,
        api_key_env: Some("OPENAI_API_KEY".to_string()),
        base_url: Some("https://api.openai.com/v1".to_string()),
        model: Some("gpt-4o-mini-tts".to_string()),
        default_voice: Some("alloy".to_string()),
    }]
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            active_provider: default_active_provider(),
            providers: default_providers(),
        }
    }
}

pub fn load_config(path: &Path) -> TtsConfig {
    crate::config::load_json_config(path, "TTS")
}

pub fn save_config(path: &Path, config: &TtsConfig) -> Result<(), String> {
    crate::config::save_json_config(path, config, "TTS")
}
