//! Emotion classification — LLM JSON-mode adapter.
//!
//! Sends the utterance to the chat model with a JSON response format and
//! parses the `{percent, top_emotion}` shape. Any malformed or failed
//! response degrades to a neutral report; classification never takes a
//! turn down.
//!
//! The label vocabulary is configuration: deployments differ on which
//! emotion set their prompts speak (the default is a seven-emotion set).

use crate::llm::{LlmParams, LlmProvider, Message};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

pub const NEUTRAL_LABEL: &str = "neutral";

// ── Config ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackLink {
    pub title: String,
    pub url: String,
}

/// Emotion vocabulary — persisted to `emotion_config.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionConfig {
    /// Full classifier vocabulary.
    #[serde(default = "default_labels")]
    pub labels: Vec<String>,
    /// Labels that route the reply through the web-search model.
    #[serde(default = "default_negative")]
    pub negative: Vec<String>,
    /// Labels answered with a curious, celebrating prompt.
    #[serde(default = "default_cheerful")]
    pub cheerful: Vec<String>,
    /// Labels answered with an encouraging prompt.
    #[serde(default = "default_encourage")]
    pub encourage: Vec<String>,
    /// Per-label link candidates used when web search yields none.
    #[serde(default = "default_fallback_links")]
    pub fallback_links: HashMap<String, Vec<FallbackLink>>,
}

fn default_labels() -> Vec<String> {
    ["joy", "anger", "sadness", "pleasure", "love", "disgust", "desire"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_negative() -> Vec<String> {
    ["anger", "sadness", "disgust"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_cheerful() -> Vec<String> {
    ["joy", "pleasure", "love"].iter().map(|s| s.to_string()).collect()
}

fn default_encourage() -> Vec<String> {
    vec!["desire".to_string()]
}

fn default_fallback_links() -> HashMap<String, Vec<FallbackLink>> {
    let mut links = HashMap::new();
    links.insert(
        "sadness".to_string(),
        vec![
            FallbackLink {
                title: "Lo-fi beats to relax to".to_string(),
                url: "https://www.youtube.com/watch?v=jfKfPfyJRdk".to_string(),
            },
            FallbackLink {
                title: "Calm piano".to_string(),
                url: "https://www.youtube.com/watch?v=XULUBg_ZcAU".to_string(),
            },
        ],
    );
    links.insert(
        "anger".to_string(),
        vec![FallbackLink {
            title: "Rain sounds for unwinding".to_string(),
            url: "https://www.youtube.com/watch?v=q76bMs-NwRk".to_string(),
        }],
    );
    links.insert(
        "disgust".to_string(),
        vec![FallbackLink {
            title: "A change of scenery".to_string(),
            url: "https://www.youtube.com/watch?v=BHACKCNDMW8".to_string(),
        }],
    );
    links
}

impl Default for EmotionConfig {
    fn default() -> Self {
        Self {
            labels: default_labels(),
            negative: default_negative(),
            cheerful: default_cheerful(),
            encourage: default_encourage(),
            fallback_links: default_fallback_links(),
        }
    }
}

pub fn load_config(path: &Path) -> EmotionConfig {
    crate::config::load_json_config(path, "Emotion")
}

// ── Report ─────────────────────────────────────────────

/// Classifier output: percentage per label plus the dominant label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionReport {
    #[serde(default)]
    pub percent: HashMap<String, f32>,
    #[serde(rename = "top_emotion", default = "default_top")]
    pub top_label: String,
}

fn default_top() -> String {
    NEUTRAL_LABEL.to_string()
}

impl EmotionReport {
    /// The safe default: no signal at all.
    pub fn neutral() -> Self {
        Self {
            percent: HashMap::new(),
            top_label: NEUTRAL_LABEL.to_string(),
        }
    }

    /// Parse the raw classifier JSON, degrading to neutral on any mismatch.
    pub fn parse(raw: &str) -> Self {
        serde_json::from_str(raw).unwrap_or_else(|e| {
            tracing::warn!("[Emotion] Malformed classifier response: {} — using neutral", e);
            Self::neutral()
        })
    }

    /// Intensity of the dominant emotion, derived from its percent share.
    pub fn intensity(&self) -> f32 {
        self.percent
            .get(&self.top_label)
            .map(|p| (p / 100.0).clamp(0.0, 1.0))
            .unwrap_or(0.0)
    }
}

// ── Classification call ────────────────────────────────

fn classifier_prompt(labels: &[String]) -> String {
    format!(
        "You are an emotion analyst. Judge how strongly the user's utterance \
         expresses each of these emotions: {}. Respond with JSON only, shaped \
         as {{\"percent\": {{\"<emotion>\": <0-100>, ...}}, \"top_emotion\": \"<emotion>\"}}.",
        labels.join(", ")
    )
}

/// Classify one utterance. Never errors; failures come back neutral.
pub async fn classify(
    provider: &Arc<dyn LlmProvider>,
    model_override: Option<String>,
    config: &EmotionConfig,
    text: &str,
) -> EmotionReport {
    let messages = vec![
        Message::system(classifier_prompt(&config.labels)),
        Message::user(text),
    ];
    let params = LlmParams {
        model: model_override,
        temperature: Some(0.0),
        max_tokens: Some(200),
        json_mode: true,
        ..Default::default()
    };

    match provider.chat(messages, Some(params)).await {
        Ok(reply) => EmotionReport::parse(&reply.content),
        Err(e) => {
            tracing::warn!("[Emotion] Classification call failed: {} — using neutral", e);
            EmotionReport::neutral()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmReply;
    use async_trait::async_trait;
    use futures::Stream;
    use std::pin::Pin;

    struct StubLlm {
        response: Result<String, String>,
    }

    #[async_trait]
    impl LlmProvider for StubLlm {
        async fn chat(
            &self,
            _messages: Vec<Message>,
            options: Option<LlmParams>,
        ) -> Result<LlmReply, String> {
            assert!(options.map(|o| o.json_mode).unwrap_or(false));
            self.response.clone().map(|content| LlmReply {
                content,
                citations: Vec::new(),
            })
        }

        async fn chat_stream(
            &self,
            _messages: Vec<Message>,
            _options: Option<LlmParams>,
        ) -> Result<Pin<Box<dyn Stream<Item = Result<String, String>> + Send>>, String> {
            Err("not used".to_string())
        }

        fn id(&self) -> &str {
            "stub"
        }
    }

    #[test]
    fn parse_reads_percent_and_top_label() {
        let report =
            EmotionReport::parse(r#"{"percent": {"sadness": 62.0, "joy": 10.0}, "top_emotion": "sadness"}"#);
        assert_eq!(report.top_label, "sadness");
        assert!((report.intensity() - 0.62).abs() < 1e-6);
    }

    #[test]
    fn malformed_json_degrades_to_neutral() {
        let report = EmotionReport::parse("the model rambled instead of JSON");
        assert_eq!(report.top_label, NEUTRAL_LABEL);
        assert!(report.percent.is_empty());
        assert_eq!(report.intensity(), 0.0);
    }

    #[test]
    fn missing_top_emotion_defaults_to_neutral() {
        let report = EmotionReport::parse(r#"{"percent": {"joy": 80.0}}"#);
        assert_eq!(report.top_label, NEUTRAL_LABEL);
    }

    #[test]
    fn percent_above_hundred_is_clamped() {
        let report =
            EmotionReport::parse(r#"{"percent": {"anger": 140.0}, "top_emotion": "anger"}"#);
        assert_eq!(report.intensity(), 1.0);
    }

    #[tokio::test]
    async fn classify_parses_the_providers_json() {
        let provider: Arc<dyn LlmProvider> = Arc::new(StubLlm {
            response: Ok(r#"{"percent": {"anger": 70.0}, "top_emotion": "anger"}"#.to_string()),
        });
        let report = classify(&provider, None, &EmotionConfig::default(), "why me").await;
        assert_eq!(report.top_label, "anger");
        assert!((report.intensity() - 0.7).abs() < 1e-6);
    }

    #[tokio::test]
    async fn classify_call_failure_degrades_to_neutral() {
        let provider: Arc<dyn LlmProvider> = Arc::new(StubLlm {
            response: Err("timeout".to_string()),
        });
        let report = classify(&provider, None, &EmotionConfig::default(), "hello").await;
        assert_eq!(report.top_label, NEUTRAL_LABEL);
    }

    #[test]
    fn default_vocabulary_has_seven_labels() {
        let config = EmotionConfig::default();
        assert_eq!(config.labels.len(), 7);
        for label in &config.negative {
            assert!(config.labels.contains(label));
        }
    }
}
