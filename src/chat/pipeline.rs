//! Chat Pipeline — one spoken (or typed) turn, end to end.
//!
//! Sequences STT → emotion classification → empathetic reply → TTS →
//! proactive policy → response assembly. Provider I/O is awaited without
//! holding any session lock; the policy check runs only after reply
//! generation succeeded, so a failed turn never stamps the cooldown.

use crate::chat::config::ChatConfig;
use crate::chat::prompts;
use crate::emotion::{self, EmotionConfig, EmotionReport};
use crate::llm::{LlmParams, LlmProvider, LlmService, Message};
use crate::policy::{build_card, ProactivePolicy, SuggestAction, SuggestionCard};
use crate::session::{Role, SessionStore};
use crate::stt::{SttError, SttService};
use crate::tts::TtsService;
use crate::utils::text;
use base64::Engine as _;
use chrono::Utc;
use futures::channel::mpsc;
use futures::{Stream, StreamExt};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

const EMPTY_REPLY_FALLBACK: &str =
    "I haven't put an answer together yet. Could you say that once more?";
const FALLBACK_PERSONA: &str = "You are a warm, empathetic companion. Keep replies short.";

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("empty utterance")]
    EmptyUtterance,
    #[error("{0}")]
    Stt(#[from] SttError),
    #[error("{0}")]
    Llm(String),
}

/// What the caller sent for this turn.
pub enum ChatInput {
    Audio { data: Vec<u8>, format: String },
    Text(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct ProactiveOutcome {
    pub action: SuggestAction,
    pub why: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub card: Option<SuggestionCard>,
}

/// Assembled response for one turn.
#[derive(Debug, Clone, Serialize)]
pub struct ChatTurnOutcome {
    pub user_text: String,
    pub ai_text: String,
    /// Base64 mp3, empty when synthesis was skipped or failed.
    pub audio: String,
    pub emotion_percent: HashMap<String, f32>,
    pub top_emotion: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    pub proactive: ProactiveOutcome,
}

/// Events on the streaming variant.
pub enum StreamEvent {
    Token(String),
    Final(Box<ChatTurnOutcome>),
    Error(String),
}

/// Everything gathered before reply generation starts.
struct PreparedTurn {
    user_text: String,
    report: EmotionReport,
    /// Silence measured up to (not including) this utterance.
    silence_secs: f64,
    messages: Vec<Message>,
    used_search: bool,
    now_ms: i64,
    provider: Arc<dyn LlmProvider>,
}

#[derive(Clone)]
pub struct ChatPipeline {
    store: Arc<SessionStore>,
    policy: Arc<ProactivePolicy>,
    llm: LlmService,
    stt: SttService,
    tts: TtsService,
    chat_config: ChatConfig,
    emotion_config: EmotionConfig,
}

impl ChatPipeline {
    pub fn new(
        store: Arc<SessionStore>,
        policy: Arc<ProactivePolicy>,
        llm: LlmService,
        stt: SttService,
        tts: TtsService,
        chat_config: ChatConfig,
        emotion_config: EmotionConfig,
    ) -> Self {
        Self {
            store,
            policy,
            llm,
            stt,
            tts,
            chat_config,
            emotion_config,
        }
    }

    fn persona_and_voice(&self, character: &str) -> (String, Option<String>) {
        match self.chat_config.character(character) {
            Some(c) => (c.system_prompt.clone(), Some(c.voice.clone())),
            None => (FALLBACK_PERSONA.to_string(), None),
        }
    }

    fn reply_params(&self, used_search: bool, search_model: String) -> LlmParams {
        LlmParams {
            model: used_search.then_some(search_model),
            temperature: Some(self.chat_config.reply_temperature),
            max_tokens: Some(self.chat_config.reply_max_tokens),
            ..Default::default()
        }
    }

    /// Run one complete turn and assemble the response payload.
    pub async fn run_turn(
        &self,
        sid: &str,
        character: &str,
        input: ChatInput,
        api_key: Option<&str>,
    ) -> Result<ChatTurnOutcome, ChatError> {
        let (persona, voice) = self.persona_and_voice(character);
        let prepared = self.prepare(sid, &persona, input, api_key).await?;

        let params = self.reply_params(prepared.used_search, self.llm.search_model().await);
        let reply = prepared
            .provider
            .chat(prepared.messages.clone(), Some(params))
            .await
            .map_err(ChatError::Llm)?;

        Ok(self
            .finalize(sid, voice, prepared, reply.content, reply.citations, api_key)
            .await)
    }

    /// Streaming variant: reply tokens first, then the assembled payload.
    pub async fn run_turn_stream(
        self: Arc<Self>,
        sid: String,
        character: String,
        input: ChatInput,
        api_key: Option<String>,
    ) -> Result<impl Stream<Item = StreamEvent> + Send, ChatError> {
        let (persona, voice) = self.persona_and_voice(&character);
        let prepared = self.prepare(&sid, &persona, input, api_key.as_deref()).await?;

        let params = self.reply_params(prepared.used_search, self.llm.search_model().await);
        let token_stream = prepared
            .provider
            .chat_stream(prepared.messages.clone(), Some(params))
            .await
            .map_err(ChatError::Llm)?;

        let (tx, rx) = mpsc::unbounded();
        let pipeline = self.clone();
        tokio::spawn(async move {
            let mut token_stream = token_stream;
            let mut full_text = String::new();
            while let Some(item) = token_stream.next().await {
                match item {
                    Ok(delta) => {
                        full_text.push_str(&delta);
                        let _ = tx.unbounded_send(StreamEvent::Token(delta));
                    }
                    Err(e) => {
                        let _ = tx.unbounded_send(StreamEvent::Error(e));
                        return;
                    }
                }
            }

            let outcome = pipeline
                .finalize(&sid, voice, prepared, full_text, Vec::new(), api_key.as_deref())
                .await;
            let _ = tx.unbounded_send(StreamEvent::Final(Box::new(outcome)));
        });

        Ok(rx)
    }

    /// Transcribe, classify, record the turn, and build the reply messages.
    async fn prepare(
        &self,
        sid: &str,
        persona: &str,
        input: ChatInput,
        api_key: Option<&str>,
    ) -> Result<PreparedTurn, ChatError> {
        let user_text = match input {
            ChatInput::Text(text) => text.trim().to_string(),
            ChatInput::Audio { data, format } => {
                self.stt.transcribe(&data, &format, api_key).await?
            }
        };
        if user_text.is_empty() {
            return Err(ChatError::EmptyUtterance);
        }

        let provider = self.llm.provider_for(api_key).await.map_err(ChatError::Llm)?;
        let classifier_model = self.llm.classifier_model().await;
        let report =
            emotion::classify(&provider, classifier_model, &self.emotion_config, &user_text).await;

        let now_ms = Utc::now().timestamp_millis();

        // Snapshot history and the silence anchor before this turn lands
        let (history, prev_utter_ts) = {
            let session = self.store.get(sid).await;
            let st = session.lock().await;
            (
                st.history.iter().cloned().collect::<Vec<_>>(),
                st.last_user_utter_ts,
            )
        };
        let silence_secs = if prev_utter_ts > 0 {
            ((now_ms - prev_utter_ts) as f64 / 1000.0).max(0.0)
        } else {
            0.0
        };

        self.store
            .upsert_turn(sid, Role::User, &user_text, json!({ "ts": now_ms }))
            .await;
        let intensity = report.intensity();
        self.store
            .push_emotion(sid, &report.top_label, intensity, intensity, now_ms)
            .await;

        let used_search = self
            .emotion_config
            .negative
            .iter()
            .any(|l| *l == report.top_label);

        let mut messages = vec![Message::system(persona)];
        for turn in &history {
            let role = match turn.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            messages.push(Message {
                role: role.to_string(),
                content: turn.text.clone(),
            });
        }
        messages.push(Message::user(prompts::reply_prompt(
            &user_text,
            &report.top_label,
            &self.emotion_config,
        )));

        Ok(PreparedTurn {
            user_text,
            report,
            silence_secs,
            messages,
            used_search,
            now_ms,
            provider,
        })
    }

    /// Post-process the reply, synthesize speech, run the policy check, and
    /// record the assistant turn. Infallible; everything here degrades.
    async fn finalize(
        &self,
        sid: &str,
        voice: Option<String>,
        prepared: PreparedTurn,
        raw_reply: String,
        citations: Vec<String>,
        api_key: Option<&str>,
    ) -> ChatTurnOutcome {
        let top_emotion = prepared.report.top_label.clone();
        let mut rng = StdRng::from_entropy();

        let raw = if raw_reply.trim().is_empty() {
            EMPTY_REPLY_FALLBACK.to_string()
        } else {
            raw_reply
        };

        let (mut ai_text, link, tts_input) = if prepared.used_search {
            let ai_text = text::markdown_to_html_links(&raw);
            let link = citations
                .into_iter()
                .next()
                .or_else(|| text::extract_first_markdown_url(&raw))
                .or_else(|| pick_fallback_link(&self.emotion_config, &top_emotion, &mut rng));
            let tts_input = text::tts_text(&text::remove_empty_parentheses(&raw));
            (ai_text, link, tts_input)
        } else {
            let ai_text = text::remove_emojis(&raw);
            let tts_input = text::tts_text(&ai_text);
            (ai_text, None, tts_input)
        };

        if let Some(ref url) = link {
            if !ai_text.contains(url.as_str()) {
                ai_text.push_str(&format!(
                    "<br><a href=\"{}\" target=\"_blank\">▶️ Listen to the recommendation</a>",
                    url
                ));
            }
        }

        // TTS degrades to text-only rather than failing the turn
        let audio = match self.tts.synthesize(&tts_input, voice, api_key).await {
            Ok(bytes) => base64::engine::general_purpose::STANDARD.encode(bytes),
            Err(e) => {
                tracing::warn!("[Chat] TTS failed: {} — returning text only", e);
                String::new()
            }
        };

        let hint = prompts::topic_hint(&prepared.user_text);
        let decision = self
            .policy
            .should_suggest(
                sid,
                Some(&top_emotion),
                Some(prepared.silence_secs),
                hint,
                prepared.now_ms,
            )
            .await;

        let card = if decision.ok() {
            let types = self.policy.choose_suggestion_types(sid, &mut rng).await;
            let reason = prompts::rationale_for(decision.action, &decision.reason);
            Some(build_card(
                &types,
                &top_emotion,
                &reason,
                prepared.now_ms / 1000,
                &mut rng,
            ))
        } else {
            None
        };

        let ai_text = text::remove_empty_parentheses(&ai_text);
        self.store
            .upsert_turn(
                sid,
                Role::Assistant,
                &ai_text,
                json!({
                    "ts": Utc::now().timestamp_millis(),
                    "proactive_action": decision.action,
                }),
            )
            .await;

        ChatTurnOutcome {
            user_text: prepared.user_text,
            ai_text,
            audio,
            emotion_percent: prepared.report.percent,
            top_emotion,
            link,
            proactive: ProactiveOutcome {
                action: decision.action,
                why: decision.reason,
                card,
            },
        }
    }
}

fn pick_fallback_link<R: Rng>(
    config: &EmotionConfig,
    label: &str,
    rng: &mut R,
) -> Option<String> {
    config
        .fallback_links
        .get(label)
        .and_then(|candidates| candidates.choose(rng))
        .map(|l| l.url.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::config::LlmConfig;
    use crate::policy::PolicyConfig;
    use crate::stt::config::SttConfig;
    use crate::tts::config::TtsConfig;
    use serde_json::json as j;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn pipeline_against(server: &MockServer) -> Arc<ChatPipeline> {
        let base = Some(server.uri());

        let mut llm_config = LlmConfig::default();
        llm_config.providers[0].api_key = Some("sk-test".to_string());
        llm_config.providers[0].base_url = base.clone();

        let mut stt_config = SttConfig::default();
        stt_config.providers[0].api_key = Some("sk-test".to_string());
        stt_config.providers[0].base_url = base.clone();

        let mut tts_config = TtsConfig::default();
        tts_config.providers[0].api_key = Some("sk-test".to_string());
        tts_config.providers[0].base_url = base;

        let store = Arc::new(SessionStore::new(10));
        let policy = Arc::new(ProactivePolicy::new(store.clone(), PolicyConfig::default()));
        Arc::new(ChatPipeline::new(
            store,
            policy,
            LlmService::from_config(llm_config),
            SttService::init_from_config(&stt_config),
            TtsService::init_from_config(&tts_config),
            ChatConfig::default(),
            EmotionConfig::default(),
        ))
    }

    /// Mount mocks: classifier (JSON mode), reply, and TTS.
    async fn mount_providers(server: &MockServer, classifier_json: serde_json::Value, reply: &str) {
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(j!({"response_format": {"type": "json_object"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(j!({
                "choices": [{"message": {
                    "role": "assistant",
                    "content": classifier_json.to_string(),
                }}]
            })))
            .mount(server)
            .await;

        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(j!({
                "choices": [{"message": {"role": "assistant", "content": reply}}]
            })))
            .mount(server)
            .await;

        Mock::given(method("POST"))
            .and(path("/audio/speech"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"mp3!".to_vec()))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn sad_turn_recommends_with_a_card_and_link() {
        let server = MockServer::start().await;
        mount_providers(
            &server,
            j!({"percent": {"sadness": 80.0}, "top_emotion": "sadness"}),
            "I'm here with you. How about [this song](https://youtu.be/comfort)?",
        )
        .await;

        let pipeline = pipeline_against(&server).await;
        let outcome = pipeline
            .run_turn("s1", "kei", ChatInput::Text("I feel so sad today".into()), None)
            .await
            .unwrap();

        assert_eq!(outcome.top_emotion, "sadness");
        assert_eq!(outcome.link.as_deref(), Some("https://youtu.be/comfort"));
        assert!(outcome.ai_text.contains("<a href=\"https://youtu.be/comfort\""));
        assert!(!outcome.audio.is_empty(), "TTS audio should be attached");

        // First suggestion of the session: sadness at 0.8 fires `recommend`
        assert_eq!(outcome.proactive.action, SuggestAction::Recommend);
        assert_eq!(outcome.proactive.why, "sadness detected");
        let card = outcome.proactive.card.expect("card should be attached");
        assert!((2..=3).contains(&card.buttons.len()));
    }

    #[tokio::test]
    async fn second_sad_turn_is_cooled_down() {
        let server = MockServer::start().await;
        mount_providers(
            &server,
            j!({"percent": {"sadness": 80.0}, "top_emotion": "sadness"}),
            "Take it slow.",
        )
        .await;

        let pipeline = pipeline_against(&server).await;
        let first = pipeline
            .run_turn("s1", "kei", ChatInput::Text("so sad".into()), None)
            .await
            .unwrap();
        assert!(first.proactive.card.is_some());

        let second = pipeline
            .run_turn("s1", "kei", ChatInput::Text("still sad".into()), None)
            .await
            .unwrap();
        assert_eq!(second.proactive.action, SuggestAction::None);
        assert_eq!(second.proactive.why, "cooldown active");
        assert!(second.proactive.card.is_none());
    }

    #[tokio::test]
    async fn joyful_turn_skips_search_and_policy_stays_quiet() {
        let server = MockServer::start().await;
        mount_providers(
            &server,
            j!({"percent": {"joy": 90.0}, "top_emotion": "joy"}),
            "That's wonderful! What happened? 🎉",
        )
        .await;

        let pipeline = pipeline_against(&server).await;
        let outcome = pipeline
            .run_turn("s2", "haru", ChatInput::Text("I got the job!".into()), None)
            .await
            .unwrap();

        assert_eq!(outcome.top_emotion, "joy");
        assert!(outcome.link.is_none());
        assert!(
            !outcome.ai_text.contains('🎉'),
            "emoji are stripped from the display text"
        );
        assert_eq!(outcome.proactive.action, SuggestAction::None);
        assert_eq!(outcome.proactive.why, "no policy hit");
    }

    #[tokio::test]
    async fn disabled_session_never_gets_a_card() {
        let server = MockServer::start().await;
        mount_providers(
            &server,
            j!({"percent": {"sadness": 95.0}, "top_emotion": "sadness"}),
            "I'm listening.",
        )
        .await;

        let pipeline = pipeline_against(&server).await;
        {
            let session = pipeline.store.get("s3").await;
            session.lock().await.settings.proactive_enabled = false;
        }
        let outcome = pipeline
            .run_turn("s3", "kei", ChatInput::Text("terrible day".into()), None)
            .await
            .unwrap();
        assert_eq!(outcome.proactive.why, "proactive disabled by user");
        assert!(outcome.proactive.card.is_none());
    }

    #[tokio::test]
    async fn empty_text_is_rejected() {
        let server = MockServer::start().await;
        let pipeline = pipeline_against(&server).await;
        let err = pipeline
            .run_turn("s4", "kei", ChatInput::Text("   ".into()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::EmptyUtterance));
    }

    #[tokio::test]
    async fn classifier_gibberish_degrades_to_neutral_turn() {
        let server = MockServer::start().await;
        // Classifier mock returns non-JSON content
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(j!({"response_format": {"type": "json_object"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(j!({
                "choices": [{"message": {"role": "assistant", "content": "sorry, no JSON"}}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(j!({
                "choices": [{"message": {"role": "assistant", "content": "Tell me more."}}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/audio/speech"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"mp3!".to_vec()))
            .mount(&server)
            .await;

        let pipeline = pipeline_against(&server).await;
        let outcome = pipeline
            .run_turn("s5", "kei", ChatInput::Text("hmm".into()), None)
            .await
            .unwrap();
        assert_eq!(outcome.top_emotion, "neutral");
        assert!(outcome.emotion_percent.is_empty());
        assert_eq!(outcome.proactive.why, "no policy hit");
    }

    #[tokio::test]
    async fn tts_failure_degrades_to_text_only() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(j!({"response_format": {"type": "json_object"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(j!({
                "choices": [{"message": {"role": "assistant",
                    "content": "{\"percent\": {\"joy\": 60.0}, \"top_emotion\": \"joy\"}"}}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(j!({
                "choices": [{"message": {"role": "assistant", "content": "Good to hear."}}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/audio/speech"))
            .respond_with(ResponseTemplate::new(400).set_body_string("no voice"))
            .mount(&server)
            .await;

        let pipeline = pipeline_against(&server).await;
        let outcome = pipeline
            .run_turn("s6", "kei", ChatInput::Text("all good".into()), None)
            .await
            .unwrap();
        assert_eq!(outcome.ai_text, "Good to hear.");
        assert!(outcome.audio.is_empty(), "failed TTS degrades to empty audio");
    }

    #[tokio::test]
    async fn streaming_yields_tokens_then_final_payload() {
        let server = MockServer::start().await;
        // Classifier
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(body_partial_json(j!({"response_format": {"type": "json_object"}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(j!({
                "choices": [{"message": {"role": "assistant",
                    "content": "{\"percent\": {\"joy\": 40.0}, \"top_emotion\": \"joy\"}"}}]
            })))
            .mount(&server)
            .await;
        // Streaming reply (SSE)
        let sse_body = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hel\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"lo.\"}}]}\n\n",
            "data: [DONE]\n\n"
        );
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(sse_body, "text/event-stream"),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/audio/speech"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"mp3!".to_vec()))
            .mount(&server)
            .await;

        let pipeline = pipeline_against(&server).await;
        let stream = pipeline
            .run_turn_stream(
                "s7".to_string(),
                "kei".to_string(),
                ChatInput::Text("hi".into()),
                None,
            )
            .await
            .unwrap();

        let events: Vec<StreamEvent> = stream.collect().await;
        let tokens: String = events
            .iter()
            .filter_map(|e| match e {
                StreamEvent::Token(t) => Some(t.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(tokens, "Hello.");

        match events.last() {
            Some(StreamEvent::Final(outcome)) => {
                assert_eq!(outcome.ai_text, "Hello.");
                assert_eq!(outcome.top_emotion, "joy");
            }
            other => panic!(
                "last event should be Final, got {}",
                match other {
                    Some(StreamEvent::Token(_)) => "Token",
                    Some(StreamEvent::Error(e)) => e.as_str(),
                    _ => "nothing",
                }
            ),
        }
    }
}
