//! STT Provider Interface & Error Types
//!
//! The engine consumes already-encoded audio (whatever container the
//! browser recorder produced) and hands it to a transcription backend
//! as-is; transcoding is the caller's concern.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SttError {
    AudioTooShort,
    AudioFormatInvalid(String),
    TranscriptionFailed(String),
    ProviderUnavailable(String),
    ConfigError(String),
}

impl fmt::Display for SttError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SttError::AudioTooShort => write!(f, "Audio too short to transcribe"),
            SttError::AudioFormatInvalid(msg) => write!(f, "Invalid audio format: {}", msg),
            SttError::TranscriptionFailed(msg) => write!(f, "Transcription failed: {}", msg),
            SttError::ProviderUnavailable(msg) => write!(f, "STT provider unavailable: {}", msg),
            SttError::ConfigError(msg) => write!(f, "STT configuration error: {}", msg),
        }
    }
}

impl std::error::Error for SttError {}

/// Abstract interface for a speech-to-text backend.
#[async_trait]
pub trait SttProvider: Send + Sync {
    /// Unique identifier for this provider instance.
    fn id(&self) -> String;

    /// Check if the provider is ready (credentials present etc).
    async fn is_available(&self) -> bool;

    /// Transcribe encoded audio. `format` is a container hint ("webm",
    /// "wav", "mp3", ...), `language` an optional BCP-47 code.
    async fn transcribe(
        &self,
        audio: &[u8],
        format: &str,
        language: Option<&str>,
    ) -> Result<String, SttError>;
}
