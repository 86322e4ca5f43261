//! OpenAI chat-completion client (`/v1/chat/completions`).
//!
//! One client covers all three call shapes the engine needs: plain
//! empathetic replies, JSON-mode emotion classification, and the
//! web-search-preview model whose answers carry `url_citation` annotations.

use super::provider::{LlmParams, LlmProvider, LlmReply, Message};
use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::Stream;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::pin::Pin;

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<Message>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamResponse {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

pub struct OpenAIClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAIClient {
    pub fn new(api_key: String, base_url: Option<String>, model: Option<String>) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(60))
                .build()
                .unwrap_or_else(|_| Client::new()),
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
            model: model.unwrap_or_else(|| "gpt-4o".to_string()),
        }
    }

    fn request_body(&self, messages: Vec<Message>, opts: &LlmParams, stream: bool) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: opts.model.clone().unwrap_or_else(|| self.model.clone()),
            messages,
            stream,
            temperature: opts.temperature,
            max_tokens: opts.max_tokens,
            top_p: opts.top_p,
            stop: opts.stop.clone(),
            response_format: opts
                .json_mode
                .then(|| serde_json::json!({"type": "json_object"})),
        }
    }

    async fn send(&self, body: ChatCompletionRequest) -> Result<reqwest::Response, String> {
        let url = format!("{}/chat/completions", self.base_url);
        let client = self.client.clone();
        let api_key = self.api_key.clone();

        let response = crate::utils::http::request_with_retry(
            move || {
                let client = client.clone();
                let url = url.clone();
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
        .map_err(|e| format!("Request failed: {}", e))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(format!("API Error: {}", error_text));
        }

        Ok(response)
    }
}

/// Pull `url_citation` annotation URLs out of a completed message, in order.
fn citation_urls(message: &Value) -> Vec<String> {
    message["annotations"]
        .as_array()
        .map(|anns| {
            anns.iter()
                .filter(|a| a["type"].as_str() == Some("url_citation"))
                .filter_map(|a| a["url_citation"]["url"].as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl LlmProvider for OpenAIClient {
    async fn chat(
        &self,
        messages: Vec<Message>,
        options: Option<LlmParams>,
    ) -> Result<LlmReply, String> {
        let opts = options.unwrap_or_default();
        let response = self.send(self.request_body(messages, &opts, false)).await?;

        let body: Value = response
            .json()
            .await
            .map_err(|e| format!("Failed to parse response: {}", e))?;

        let message = &body["choices"][0]["message"];
        let content = message["content"].as_str().unwrap_or("").to_string();

        Ok(LlmReply {
            citations: citation_urls(message),
            content,
        })
    }

    async fn chat_stream(
        &self,
        messages: Vec<Message>,
        options: Option<LlmParams>,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<String, String>> + Send>>, String> {
        let opts = options.unwrap_or_default();
        let response = self.send(self.request_body(messages, &opts, true)).await?;

        let stream = response
            .bytes_stream()
            .eventsource()
            .map(|result| {
                match result {
                    Ok(event) => {
                        if event.data == "[DONE]" {
                            return Ok(None);
                        }

                        match serde_json::from_str::<OpenAIStreamResponse>(&event.data) {
                            Ok(parsed) => {
                                if let Some(choice) = parsed.choices.first() {
                                    if let Some(content) = &choice.delta.content {
                                        return Ok(Some(content.clone()));
                                    }
                                }
                                Ok(None)
                            }
                            Err(_) => Ok(None), // Ignore parse errors for keep-alives etc
                        }
                    }
                    Err(e) => Err(format!("Stream error: {}", e)),
                }
            })
            .filter_map(|res| async {
                match res {
                    Ok(Some(content)) => Some(Ok(content)),
                    Ok(None) => None,
                    Err(e) => Some(Err(e)),
                }
            });

        Ok(Box::pin(stream))
    }

    fn id(&self) -> &str {
        "openai"
    }
}
