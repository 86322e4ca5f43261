//! Chat configuration — characters, voices, and generation limits.
//! Persisted to `chat_config.json`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterConfig {
    pub system_prompt: String,
    /// TTS voice for this character (OpenAI voice name).
    pub voice: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(default = "default_character")]
    pub default_character: String,

    #[serde(default = "default_characters")]
    pub characters: HashMap<String, CharacterConfig>,

    /// Sliding window for per-session turn and emotion history.
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    #[serde(default = "default_reply_max_tokens")]
    pub reply_max_tokens: u32,

    #[serde(default = "default_reply_temperature")]
    pub reply_temperature: f32,
}

fn default_character() -> String {
    "kei".to_string()
}

fn default_characters() -> HashMap<String, CharacterConfig> {
    let mut characters = HashMap::new();
    characters.insert(
        "kei".to_string(),
        CharacterConfig {
            system_prompt: "You are a creative character with a modern sensibility, known for \
                            your silver hair and emerald eyes. Read the emotion in what the user \
                            tells you, empathize with it warmly without losing a practical \
                            perspective, and answer in a refined tone within two sentences."
                .to_string(),
            voice: "alloy".to_string(),
        },
    );
    characters.insert(
        "haru".to_string(),
        CharacterConfig {
            system_prompt: "You are a professional, confident woman working in a business \
                            environment. Read the emotion in what the user tells you, empathize \
                            with it, and offer a clear, practical solution within two sentences."
                .to_string(),
            voice: "shimmer".to_string(),
        },
    );
    characters
}

fn default_history_window() -> usize {
    10
}

fn default_reply_max_tokens() -> u32 {
    512
}

fn default_reply_temperature() -> f32 {
    0.7
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            default_character: default_character(),
            characters: default_characters(),
            history_window: default_history_window(),
            reply_max_tokens: default_reply_max_tokens(),
            reply_temperature: default_reply_temperature(),
        }
    }
}

impl ChatConfig {
    /// Character entry for `name`, falling back to the default character.
    pub fn character(&self, name: &str) -> Option<&CharacterConfig> {
        self.characters
            .get(name)
            .or_else(|| self.characters.get(&self.default_character))
            .or_else(|| self.characters.values().next())
    }
}

pub fn load_config(path: &Path) -> ChatConfig {
    crate::config::load_json_config(path, "Chat")
}
