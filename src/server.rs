//! HTTP layer — warp routes under `/api`.
//!
//! Thin request/response plumbing over the session store, the chat
//! pipeline, and the proactive policy. Handlers never panic; every error
//! path renders a JSON error body with an appropriate status.

use crate::chat::{ChatError, ChatInput, ChatPipeline, StreamEvent};
use crate::policy::{ProactivePolicy, SuggestionType};
use crate::session::{Frequency, SessionStore};
use crate::stt::SttError;
use crate::utils::text::redact_pii;
use base64::Engine as _;
use chrono::Utc;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use std::convert::Infallible;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::sse::Event;
use warp::{Filter, Reply};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<SessionStore>,
    pub policy: Arc<ProactivePolicy>,
    pub pipeline: Arc<ChatPipeline>,
}

// ── Request bodies ─────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SessionRequest {
    sid: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SettingsRequest {
    sid: String,
    proactive: Option<bool>,
    frequency: Option<Frequency>,
}

#[derive(Debug, Deserialize)]
struct EmotionRequest {
    sid: String,
    label: String,
    conf: Option<f32>,
    intensity: Option<f32>,
    ts: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct ChatRequest {
    sid: Option<String>,
    session_id: Option<String>,
    character: Option<String>,
    text: Option<String>,
    /// Base64-encoded audio in a container the STT provider accepts.
    audio: Option<String>,
    audio_format: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FeedbackRequest {
    session_id: Option<String>,
    sid: Option<String>,
    suggestion_type: Option<String>,
    accepted: Option<bool>,
}

// ── Routes ─────────────────────────────────────────────

pub fn routes(
    state: AppState,
) -> impl Filter<Extract = (impl Reply,), Error = warp::Rejection> + Clone {
    let session = warp::path!("api" / "session")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(handle_session);

    let settings = warp::path!("api" / "settings")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(handle_settings);

    let emotion = warp::path!("api" / "emotion")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(handle_emotion);

    let chat = warp::path!("api" / "chat")
        .and(warp::post())
        .and(warp::body::json())
        .and(warp::header::optional::<String>("x-api-key"))
        .and(warp::header::optional::<String>("x-session-id"))
        .and(with_state(state.clone()))
        .and_then(handle_chat);

    let chat_stream = warp::path!("api" / "chat" / "stream")
        .and(warp::post())
        .and(warp::body::json())
        .and(warp::header::optional::<String>("x-api-key"))
        .and(warp::header::optional::<String>("x-session-id"))
        .and(with_state(state.clone()))
        .and_then(handle_chat_stream);

    let feedback = warp::path!("api" / "proactive" / "feedback")
        .and(warp::post())
        .and(warp::body::json())
        .and(with_state(state.clone()))
        .and_then(handle_feedback);

    let events = warp::path!("api" / "events")
        .and(warp::post())
        .and(warp::body::json())
        .and_then(handle_events);

    let log = warp::log::custom(|info| {
        tracing::info!(
            "[HTTP] {} {} {} {}ms",
            info.method(),
            redact_pii(info.path()),
            info.status().as_u16(),
            info.elapsed().as_millis()
        );
    });

    session
        .or(settings)
        .or(emotion)
        .or(chat)
        .or(chat_stream)
        .or(feedback)
        .or(events)
        .with(log)
}

fn with_state(state: AppState) -> impl Filter<Extract = (AppState,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

fn json_error(status: StatusCode, message: &str) -> warp::reply::Response {
    warp::reply::with_status(warp::reply::json(&json!({ "error": message })), status)
        .into_response()
}

// ── Handlers ───────────────────────────────────────────

async fn handle_session(
    body: SessionRequest,
    state: AppState,
) -> Result<warp::reply::Response, Infallible> {
    let sid = body.sid.filter(|s| !s.is_empty()).unwrap_or_else(|| {
        // Timestamp plus a short uuid suffix for uniqueness
        let short_id = &uuid::Uuid::new_v4().to_string()[..8];
        format!("sid_{}_{}", Utc::now().timestamp_millis(), short_id)
    });
    state.store.get(&sid).await; // ensure created
    Ok(warp::reply::json(&json!({ "sid": sid })).into_response())
}

async fn handle_settings(
    body: SettingsRequest,
    state: AppState,
) -> Result<warp::reply::Response, Infallible> {
    let session = state.store.get(&body.sid).await;
    let mut st = session.lock().await;
    if let Some(proactive) = body.proactive {
        st.settings.proactive_enabled = proactive;
    }
    if let Some(frequency) = body.frequency {
        st.settings.frequency = frequency;
    }
    Ok(warp::reply::json(&json!({ "ok": true, "settings": st.settings })).into_response())
}

async fn handle_emotion(
    body: EmotionRequest,
    state: AppState,
) -> Result<warp::reply::Response, Infallible> {
    let ts = body.ts.unwrap_or_else(|| Utc::now().timestamp_millis());
    state
        .store
        .push_emotion(
            &body.sid,
            &body.label,
            body.conf.unwrap_or(1.0),
            body.intensity.unwrap_or(0.0),
            ts,
        )
        .await;
    Ok(warp::reply::json(&json!({ "ok": true })).into_response())
}

fn resolve_sid(
    body_sid: Option<String>,
    body_session_id: Option<String>,
    header: Option<String>,
) -> String {
    body_sid
        .filter(|s| !s.is_empty())
        .or_else(|| body_session_id.filter(|s| !s.is_empty()))
        .or_else(|| header.filter(|s| !s.is_empty()))
        .unwrap_or_else(|| "default-session".to_string())
}

fn chat_input(body: &ChatRequest) -> Result<ChatInput, warp::reply::Response> {
    if let Some(audio_b64) = body.audio.as_deref().filter(|a| !a.is_empty()) {
        let data = base64::engine::general_purpose::STANDARD
            .decode(audio_b64)
            .map_err(|_| json_error(StatusCode::BAD_REQUEST, "audio is not valid base64"))?;
        return Ok(ChatInput::Audio {
            data,
            format: body.audio_format.clone().unwrap_or_else(|| "webm".to_string()),
        });
    }
    match body.text.as_deref().map(str::trim) {
        Some(text) if !text.is_empty() => Ok(ChatInput::Text(text.to_string())),
        _ => Err(json_error(StatusCode::BAD_REQUEST, "audio or text is required")),
    }
}

fn chat_error_response(err: &ChatError) -> warp::reply::Response {
    match err {
        ChatError::EmptyUtterance => json_error(StatusCode::BAD_REQUEST, "empty text"),
        ChatError::Llm(msg) if msg.contains("API key required") => {
            json_error(StatusCode::UNAUTHORIZED, msg)
        }
        ChatError::Stt(SttError::ProviderUnavailable(msg)) => {
            json_error(StatusCode::UNAUTHORIZED, msg)
        }
        other => {
            tracing::error!("[HTTP] Chat turn failed: {}", other);
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                &format!("Failed to process request: {}", other),
            )
        }
    }
}

async fn handle_chat(
    body: ChatRequest,
    api_key: Option<String>,
    session_header: Option<String>,
    state: AppState,
) -> Result<warp::reply::Response, Infallible> {
    let sid = resolve_sid(body.sid.clone(), body.session_id.clone(), session_header);
    let character = body
        .character
        .clone()
        .unwrap_or_else(|| "kei".to_string());

    let input = match chat_input(&body) {
        Ok(input) => input,
        Err(response) => return Ok(response),
    };

    match state
        .pipeline
        .run_turn(&sid, &character, input, api_key.as_deref())
        .await
    {
        Ok(outcome) => Ok(warp::reply::json(&outcome).into_response()),
        Err(err) => Ok(chat_error_response(&err)),
    }
}

async fn handle_chat_stream(
    body: ChatRequest,
    api_key: Option<String>,
    session_header: Option<String>,
    state: AppState,
) -> Result<warp::reply::Response, Infallible> {
    let sid = resolve_sid(body.sid.clone(), body.session_id.clone(), session_header);
    let character = body
        .character
        .clone()
        .unwrap_or_else(|| "kei".to_string());

    let input = match chat_input(&body) {
        Ok(input) => input,
        Err(response) => return Ok(response),
    };

    let stream = match state
        .pipeline
        .clone()
        .run_turn_stream(sid, character, input, api_key)
        .await
    {
        Ok(stream) => stream,
        Err(err) => return Ok(chat_error_response(&err)),
    };

    let events = stream.map(|event| {
        let rendered = match event {
            StreamEvent::Token(token) => Event::default()
                .event("token")
                .data(json!({ "token": token }).to_string()),
            StreamEvent::Final(outcome) => Event::default()
                .event("final")
                .data(serde_json::to_string(&outcome).unwrap_or_else(|_| "{}".to_string())),
            StreamEvent::Error(message) => Event::default()
                .event("error")
                .data(json!({ "error": message }).to_string()),
        };
        Ok::<_, Infallible>(rendered)
    });

    Ok(warp::sse::reply(warp::sse::keep_alive().stream(events)).into_response())
}

async fn handle_feedback(
    body: FeedbackRequest,
    state: AppState,
) -> Result<warp::reply::Response, Infallible> {
    let sid = resolve_sid(body.sid.clone(), body.session_id.clone(), None);

    // Unknown type tags coerce to `info` rather than failing
    let stype = match body.suggestion_type.as_deref() {
        Some("music") => SuggestionType::Music,
        Some("breathing") => SuggestionType::Breathing,
        Some("timer") => SuggestionType::Timer,
        Some("memo") => SuggestionType::Memo,
        _ => SuggestionType::Info,
    };
    let accepted = body.accepted.unwrap_or(false);

    state.policy.feedback(&sid, stype, accepted).await;
    let snapshot = state.policy.preference_snapshot(&sid).await;
    Ok(warp::reply::json(&json!({
        "ok": true,
        "weights": snapshot.weights,
        "accepts": snapshot.accepts,
        "rejects": snapshot.rejects,
    }))
    .into_response())
}

async fn handle_events(body: serde_json::Value) -> Result<warp::reply::Response, Infallible> {
    // UI telemetry (shown/clicked/dismissed) is only acknowledged and logged
    tracing::info!("[HTTP] UI event: {}", redact_pii(&body.to_string()));
    Ok(warp::reply::json(&json!({ "ok": true })).into_response())
}
