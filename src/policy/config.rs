//! Proactive policy configuration — persisted to `policy_config.json`.
//!
//! Trigger labels and thresholds are configuration rather than constants:
//! deployments differ on which emotion vocabulary the classifier speaks.

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Minimum elapsed time (ms) between two suggestions in one session.
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: i64,
    /// Silence (ms) after the last user utterance before a hint fires.
    #[serde(default = "default_silence_ms")]
    pub silence_ms: i64,
    /// Emotion label that triggers a `recommend` suggestion.
    #[serde(default = "default_sadness_label")]
    pub sadness_label: String,
    #[serde(default = "default_sadness_threshold")]
    pub sadness_threshold: f32,
    /// Emotion label that triggers an `assist` suggestion.
    #[serde(default = "default_anger_label")]
    pub anger_label: String,
    #[serde(default = "default_anger_threshold")]
    pub anger_threshold: f32,
    /// Cooldown multiplier applied when the session prefers a low cadence.
    #[serde(default = "default_low_frequency_factor")]
    pub low_frequency_factor: i64,
}

fn default_cooldown_ms() -> i64 {
    45_000
}

fn default_silence_ms() -> i64 {
    15_000
}

fn default_sadness_label() -> String {
    "sadness".to_string()
}

fn default_sadness_threshold() -> f32 {
    0.5
}

fn default_anger_label() -> String {
    "anger".to_string()
}

fn default_anger_threshold() -> f32 {
    0.6
}

fn default_low_frequency_factor() -> i64 {
    2
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            cooldown_ms: default_cooldown_ms(),
            silence_ms: default_silence_ms(),
            sadness_label: default_sadness_label(),
            sadness_threshold: default_sadness_threshold(),
            anger_label: default_anger_label(),
            anger_threshold: default_anger_threshold(),
            low_frequency_factor: default_low_frequency_factor(),
        }
    }
}

pub fn load_config(path: &Path) -> PolicyConfig {
    crate::config::load_json_config(path, "Policy")
}

pub fn save_config(path: &Path, config: &PolicyConfig) -> Result<(), String> {
    crate::config::save_json_config(path, config, "Policy")
}
