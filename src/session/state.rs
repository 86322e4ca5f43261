//! Per-session conversational and emotional state.
//!
//! Holds the bounded turn/emotion history, the user's proactive settings,
//! and the policy bookkeeping (cooldown anchor, silence anchor, per-type
//! preference weights). The store owns every instance; the policy engine
//! mutates the bookkeeping fields in place through the session lock.

use crate::policy::SuggestionType;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One conversation turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub text: String,
    /// Epoch milliseconds, taken from `meta["ts"]` when present.
    pub ts: i64,
    #[serde(default)]
    pub meta: serde_json::Value,
}

/// A single classified emotion sample.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmotionSample {
    pub label: String,
    /// Classifier confidence, 0.0 - 1.0.
    pub confidence: f32,
    /// Emotion strength, 0.0 - 1.0.
    pub intensity: f32,
    /// Epoch milliseconds.
    pub ts: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Low,
    Normal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSettings {
    #[serde(default = "default_true")]
    pub proactive_enabled: bool,
    #[serde(default = "default_frequency")]
    pub frequency: Frequency,
}

fn default_true() -> bool {
    true
}

fn default_frequency() -> Frequency {
    Frequency::Normal
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            proactive_enabled: true,
            frequency: Frequency::Normal,
        }
    }
}

/// State for one conversation, identified by an opaque `sid`.
#[derive(Debug, Clone)]
pub struct SessionState {
    pub history: VecDeque<Turn>,
    pub emotions: VecDeque<EmotionSample>,
    pub settings: SessionSettings,
    /// Timestamp (ms) of the most recently issued suggestion. 0 = never.
    pub last_proactive_ts: i64,
    /// Timestamp (ms) of the most recent user utterance. 0 = never.
    pub last_user_utter_ts: i64,
    /// Per-type preference weight, adjusted by accept/reject feedback.
    pub pref_weights: HashMap<SuggestionType, f32>,
    pub accepts: HashMap<SuggestionType, u32>,
    pub rejects: HashMap<SuggestionType, u32>,
    window: usize,
}

impl SessionState {
    pub fn new(window: usize) -> Self {
        Self {
            history: VecDeque::new(),
            emotions: VecDeque::new(),
            settings: SessionSettings::default(),
            last_proactive_ts: 0,
            last_user_utter_ts: 0,
            pref_weights: HashMap::new(),
            accepts: HashMap::new(),
            rejects: HashMap::new(),
            window,
        }
    }

    /// Append a turn, evicting the oldest once the window is full.
    pub fn push_turn(&mut self, turn: Turn) {
        self.history.push_back(turn);
        while self.history.len() > self.window {
            self.history.pop_front();
        }
    }

    /// Append an emotion sample, evicting the oldest once the window is full.
    pub fn push_emotion(&mut self, sample: EmotionSample) {
        self.emotions.push_back(sample);
        while self.emotions.len() > self.window {
            self.emotions.pop_front();
        }
    }

    /// Most recent emotion sample, if any.
    pub fn recent_emotion(&self) -> Option<&EmotionSample> {
        self.emotions.back()
    }

    /// Preference weight for a suggestion type (1.0 until feedback arrives).
    pub fn weight_of(&self, stype: SuggestionType) -> f32 {
        self.pref_weights.get(&stype).copied().unwrap_or(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turn(n: usize) -> Turn {
        Turn {
            role: Role::User,
            text: format!("turn {}", n),
            ts: n as i64,
            meta: serde_json::Value::Null,
        }
    }

    #[test]
    fn history_evicts_fifo_beyond_window() {
        let mut st = SessionState::new(10);
        for n in 1..=11 {
            st.push_turn(turn(n));
        }
        assert_eq!(st.history.len(), 10, "window must hold exactly 10 turns");
        assert!(
            !st.history.iter().any(|t| t.text == "turn 1"),
            "oldest turn must be evicted first"
        );
        assert_eq!(
            st.history.back().map(|t| t.text.as_str()),
            Some("turn 11"),
            "newest turn must be present"
        );
        // Order of the survivors is the original insertion order
        let texts: Vec<&str> = st.history.iter().map(|t| t.text.as_str()).collect();
        let expected: Vec<String> = (2..=11).map(|n| format!("turn {}", n)).collect();
        assert_eq!(texts, expected.iter().map(|s| s.as_str()).collect::<Vec<_>>());
    }

    #[test]
    fn emotions_evict_fifo_beyond_window() {
        let mut st = SessionState::new(3);
        for n in 0..5 {
            st.push_emotion(EmotionSample {
                label: format!("e{}", n),
                confidence: 1.0,
                intensity: 0.5,
                ts: n,
            });
        }
        assert_eq!(st.emotions.len(), 3);
        assert_eq!(st.recent_emotion().map(|e| e.label.as_str()), Some("e4"));
        assert_eq!(st.emotions.front().map(|e| e.label.as_str()), Some("e2"));
    }

    #[test]
    fn default_settings_are_proactive_normal() {
        let st = SessionState::new(10);
        assert!(st.settings.proactive_enabled);
        assert_eq!(st.settings.frequency, Frequency::Normal);
        assert_eq!(st.last_proactive_ts, 0);
        assert_eq!(st.last_user_utter_ts, 0);
    }

    #[test]
    fn unseen_type_has_unit_weight() {
        let st = SessionState::new(10);
        assert_eq!(st.weight_of(SuggestionType::Music), 1.0);
    }
}
