//! Session Store — lazily-created, process-lifetime session map.
//!
//! One `SessionState` per conversation id, each behind its own mutex so
//! concurrent requests for different sessions never contend. Constructed
//! once at startup and passed by reference; there is no global singleton.

use super::state::{EmotionSample, Role, SessionState, Turn};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Mutex<SessionState>>>>,
    window: usize,
}

impl SessionStore {
    pub fn new(window: usize) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            window,
        }
    }

    /// Fetch the session for `sid`, creating a fresh default state on first
    /// reference. Never fails.
    pub async fn get(&self, sid: &str) -> Arc<Mutex<SessionState>> {
        if let Some(session) = self.sessions.read().await.get(sid) {
            return session.clone();
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(sid.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(SessionState::new(self.window))))
            .clone()
    }

    /// Append a turn. A user turn also refreshes the silence anchor from
    /// `meta["ts"]`.
    pub async fn upsert_turn(&self, sid: &str, role: Role, text: &str, meta: serde_json::Value) {
        let ts = meta.get("ts").and_then(|v| v.as_i64()).unwrap_or(0);
        let session = self.get(sid).await;
        let mut st = session.lock().await;
        st.push_turn(Turn {
            role,
            text: text.to_string(),
            ts,
            meta,
        });
        if role == Role::User {
            st.last_user_utter_ts = ts;
        }
    }

    /// Append an emotion sample. An emotion push is evidence of a fresh
    /// utterance, so it also refreshes the silence anchor.
    pub async fn push_emotion(
        &self,
        sid: &str,
        label: &str,
        confidence: f32,
        intensity: f32,
        ts: i64,
    ) {
        let session = self.get(sid).await;
        let mut st = session.lock().await;
        st.push_emotion(EmotionSample {
            label: label.to_string(),
            confidence,
            intensity,
            ts,
        });
        st.last_user_utter_ts = ts;
    }

    /// Number of live sessions (diagnostics only).
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
