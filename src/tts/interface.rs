//! TTS Provider Interface & Error Types

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TtsError {
    SynthesisFailed(String),
    Unavailable(String),
    ConfigError(String),
}

impl fmt::Display for TtsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TtsError::SynthesisFailed(msg) => write!(f, "Synthesis failed: {}", msg),
            TtsError::Unavailable(msg) => write!(f, "TTS unavailable: {}", msg),
            TtsError::ConfigError(msg) => write!(f, "TTS config error: {}", msg),
        }
    }
}

impl std::error::Error for TtsError {}

// ── Synthesis Parameters ───────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TtsParams {
    pub voice: Option<String>,
    pub speed: Option<f32>,
}

/// Abstract interface for a text-to-speech backend.
#[async_trait]
pub trait TtsProvider: Send + Sync {
    fn id(&self) -> String;

    async fn is_available(&self) -> bool;

    /// Synthesize speech, returning encoded audio bytes (mp3).
    async fn synthesize(&self, text: &str, params: TtsParams) -> Result<Vec<u8>, TtsError>;
}
