//! OpenAI TTS provider (`/v1/audio/speech`).

use super::config::TtsProviderConfig;
use super::interface::{TtsError, TtsParams, TtsProvider};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

#[derive(Serialize, Clone)]
struct TtsRequest {
    model: String,
    input: String,
    voice: String,
    response_format: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    speed: Option<f32>,
}

pub struct OpenAITtsProvider {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    default_voice: String,
}

impl OpenAITtsProvider {
    pub fn new(
        api_key: String,
        base_url: Option<String>,
        model: Option<String>,
        voice: Option<String>,
    ) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .unwrap_or_else(|_| Client::new()),
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            model: model.unwrap_or_else(|| "gpt-4o-mini-tts".to_string()),
            default_voice: voice.unwrap_or_else(|| "alloy".to_string()),
        }
    }

    /// Construct from a ProviderConfig entry, optionally forcing the key.
    pub fn from_config(config: &TtsProviderConfig, key_override: Option<&str>) -> Option<Self> {
        let api_key = match key_override {
            Some(key) => key.to_string(),
            None => config.resolve_api_key()?,
        };
        Some(Self::new(
            api_key,
            config.base_url.clone(),
            config.model.clone(),
            config.default_voice.clone(),
        ))
    }
}

#[async_trait]
impl TtsProvider for OpenAITtsProvider {
    fn id(&self) -> String {
        "openai".to_string()
    }

    async fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn synthesize(&self, text: &str, params: TtsParams) -> Result<Vec<u8>, TtsError> {
        let url = format!("{}/audio/speech", self.base_url);
        let request_body = TtsRequest {
            model: self.model.clone(),
            input: text.to_string(),
            voice: params.voice.unwrap_or_else(|| self.default_voice.clone()),
            response_format: "mp3".to_string(),
            speed: params.speed,
        };

        let client = self.client.clone();
        let url_clone = url.clone();
        let api_key = self.api_key.clone();
        let body = request_body.clone();

        let response = crate::utils::http::request_with_retry(
            move || {
                let client = client.clone();
                let url = url_clone.clone();
                let body = body.clone();
                let api_key = api_key.clone();
                async move {
                    client
                        .post(&url)
                        .header("Authorization", format!("Bearer {}", api_key))
                        .header("Content-Type", "application/json")
                        .json(&body)
                        .send()
                        .await
                }
            },
            2,
        )
        .await
        .map_err(|e| TtsError::SynthesisFailed(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(TtsError::SynthesisFailed(format!(
                "OpenAI API error: {}",
                error_text
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| TtsError::SynthesisFailed(format!("Bytes error: {}", e)))?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider_for(server: &MockServer) -> OpenAITtsProvider {
        OpenAITtsProvider::new(
            "sk-test".to_string(),
            Some(server.uri()),
            None,
            Some("shimmer".to_string()),
        )
    }

    #[tokio::test]
    async fn synthesize_returns_audio_bytes() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/audio/speech"))
            .and(header("Authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({"voice": "shimmer", "response_format": "mp3"})))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ID3fakemp3".to_vec()))
            .mount(&server)
            .await;

        let audio = provider_for(&server)
            .synthesize("hello", TtsParams::default())
            .await
            .unwrap();
        assert_eq!(audio, b"ID3fakemp3".to_vec());
    }

    #[tokio::test]
    async fn explicit_voice_overrides_the_default() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(json!({"voice": "nova"})))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(Vec::<u8>::new()))
            .mount(&server)
            .await;

        let params = TtsParams {
            voice: Some("nova".to_string()),
            speed: None,
        };
        assert!(provider_for(&server).synthesize("hi", params).await.is_ok());
    }

    #[tokio::test]
    async fn api_error_becomes_synthesis_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad voice"))
            .mount(&server)
            .await;

        let err = provider_for(&server)
            .synthesize("hello", TtsParams::default())
            .await
            .unwrap_err();
        assert!(matches!(err, TtsError::SynthesisFailed(_)));
    }
}
