//! Proactive Policy Engine — decides when the companion may interject.
//!
//! Each session sits behind an implicit cooldown gate: once a suggestion
//! fires, every trigger is suppressed until the cooldown elapses. When the
//! gate is open, trigger rules are evaluated in fixed priority order
//! (disabled > cooldown > silence > sadness > anger > no-trigger) and only
//! the first match fires. Firing re-arms the gate, which is what keeps the
//! companion from spamming suggestions.
//!
//! Accept/reject feedback nudges a per-session weight per suggestion type,
//! biasing future type selection toward what this user actually taps.

use crate::policy::config::PolicyConfig;
use crate::session::SessionStore;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Weight nudge on an accepted suggestion.
const ACCEPT_BOOST: f32 = 1.15;
/// Weight nudge on a rejected suggestion.
const REJECT_DAMP: f32 = 0.85;
/// Weights stay inside this band so no type is ever starved permanently.
const WEIGHT_MIN: f32 = 0.2;
const WEIGHT_MAX: f32 = 5.0;

/// Category of proactive help offered on a suggestion card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionType {
    Music,
    Breathing,
    Timer,
    Memo,
    Info,
}

impl SuggestionType {
    pub const ALL: [SuggestionType; 5] = [
        SuggestionType::Music,
        SuggestionType::Breathing,
        SuggestionType::Timer,
        SuggestionType::Memo,
        SuggestionType::Info,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestAction {
    None,
    Hint,
    Assist,
    Recommend,
}

/// Outcome of one policy evaluation. Every branch produces one; the
/// engine never errors.
#[derive(Debug, Clone, Serialize)]
pub struct Decision {
    pub action: SuggestAction,
    pub reason: String,
}

impl Decision {
    fn none(reason: &str) -> Self {
        Self {
            action: SuggestAction::None,
            reason: reason.to_string(),
        }
    }

    fn fire(action: SuggestAction, reason: String) -> Self {
        Self { action, reason }
    }

    /// Whether a suggestion should actually be surfaced.
    pub fn ok(&self) -> bool {
        self.action != SuggestAction::None
    }
}

/// Per-session preference bookkeeping, as reported to the feedback caller.
#[derive(Debug, Clone, Serialize)]
pub struct PreferenceSnapshot {
    pub weights: HashMap<SuggestionType, f32>,
    pub accepts: HashMap<SuggestionType, u32>,
    pub rejects: HashMap<SuggestionType, u32>,
}

pub struct ProactivePolicy {
    store: Arc<SessionStore>,
    config: PolicyConfig,
}

impl ProactivePolicy {
    pub fn new(store: Arc<SessionStore>, config: PolicyConfig) -> Self {
        Self { store, config }
    }

    /// Evaluate the trigger rules for `sid` at `now_ms`.
    ///
    /// `silence_secs` is the caller-measured silence when available;
    /// otherwise the session's own utterance anchor is used. A firing rule
    /// stamps `last_proactive_ts = now_ms`, re-arming the cooldown gate.
    pub async fn should_suggest(
        &self,
        sid: &str,
        emotion_label: Option<&str>,
        silence_secs: Option<f64>,
        topic_hint: Option<&str>,
        now_ms: i64,
    ) -> Decision {
        let session = self.store.get(sid).await;
        let mut st = session.lock().await;

        tracing::debug!(
            "[Policy] evaluating sid={} emotion={:?} topic={:?}",
            sid,
            emotion_label,
            topic_hint
        );

        // 1. User opt-out wins over everything
        if !st.settings.proactive_enabled {
            return Decision::none("proactive disabled by user");
        }

        // 2. Cooldown gate
        let cooldown = match st.settings.frequency {
            crate::session::Frequency::Low => self.config.cooldown_ms * self.config.low_frequency_factor,
            crate::session::Frequency::Normal => self.config.cooldown_ms,
        };
        if now_ms - st.last_proactive_ts < cooldown {
            return Decision::none("cooldown active");
        }

        // 3. Silence trigger
        let silence_ms = match silence_secs {
            Some(secs) => (secs * 1000.0) as i64,
            None if st.last_user_utter_ts > 0 => now_ms - st.last_user_utter_ts,
            None => 0,
        };
        if silence_ms > self.config.silence_ms {
            st.last_proactive_ts = now_ms;
            return Decision::fire(SuggestAction::Hint, "prolonged silence".to_string());
        }

        // 4. Emotion trigger, on the most recent sample
        let (label, intensity) = match st.recent_emotion() {
            Some(sample) => (sample.label.clone(), sample.intensity),
            None => return Decision::none("no emotion signal"),
        };

        if label == self.config.sadness_label && intensity >= self.config.sadness_threshold {
            st.last_proactive_ts = now_ms;
            return Decision::fire(SuggestAction::Recommend, format!("{} detected", label));
        }
        if label == self.config.anger_label && intensity >= self.config.anger_threshold {
            st.last_proactive_ts = now_ms;
            return Decision::fire(SuggestAction::Assist, format!("{} detected", label));
        }

        Decision::none("no policy hit")
    }

    /// Pick 2-3 suggestion types by weighted sampling without replacement.
    ///
    /// Sampling happens over the whole vocabulary each time, so a
    /// down-weighted type still shows up occasionally instead of starving.
    pub async fn choose_suggestion_types<R: Rng>(
        &self,
        sid: &str,
        rng: &mut R,
    ) -> Vec<SuggestionType> {
        let session = self.store.get(sid).await;
        let st = session.lock().await;

        let mut candidates: Vec<(SuggestionType, f32)> = SuggestionType::ALL
            .iter()
            .map(|t| (*t, st.weight_of(*t)))
            .collect();
        drop(st);

        let count = candidates.len().min(3);
        let mut picked = Vec::with_capacity(count);
        while picked.len() < count {
            match weighted_pick(&mut candidates, rng) {
                Some(stype) => picked.push(stype),
                None => break,
            }
        }
        picked
    }

    /// Record accept/reject feedback for one suggestion type.
    ///
    /// Accepted feedback never decreases the weight; rejected feedback never
    /// increases it. Online and per-session only.
    pub async fn feedback(&self, sid: &str, stype: SuggestionType, accepted: bool) {
        let session = self.store.get(sid).await;
        let mut st = session.lock().await;

        if accepted {
            *st.accepts.entry(stype).or_insert(0) += 1;
        } else {
            *st.rejects.entry(stype).or_insert(0) += 1;
        }

        let current = st.weight_of(stype);
        st.pref_weights.insert(stype, updated_weight(current, accepted));
    }

    /// Current weights/counters for `sid` (feedback endpoint response).
    pub async fn preference_snapshot(&self, sid: &str) -> PreferenceSnapshot {
        let session = self.store.get(sid).await;
        let st = session.lock().await;
        PreferenceSnapshot {
            weights: st.pref_weights.clone(),
            accepts: st.accepts.clone(),
            rejects: st.rejects.clone(),
        }
    }
}

/// Multiplicative preference update, clamped to [WEIGHT_MIN, WEIGHT_MAX].
fn updated_weight(current: f32, accepted: bool) -> f32 {
    if accepted {
        (current * ACCEPT_BOOST).min(WEIGHT_MAX)
    } else {
        (current * REJECT_DAMP).max(WEIGHT_MIN)
    }
}

/// Remove and return one entry, chosen with probability proportional to its
/// weight.
fn weighted_pick<R: Rng>(
    candidates: &mut Vec<(SuggestionType, f32)>,
    rng: &mut R,
) -> Option<SuggestionType> {
    if candidates.is_empty() {
        return None;
    }
    let total: f32 = candidates.iter().map(|(_, w)| w.max(0.0)).sum();
    if total <= 0.0 {
        return Some(candidates.remove(0).0);
    }

    let mut roll = rng.gen::<f32>() * total;
    for i in 0..candidates.len() {
        roll -= candidates[i].1.max(0.0);
        if roll <= 0.0 {
            return Some(candidates.remove(i).0);
        }
    }
    // Float rounding can leave a sliver; fall back to the last entry
    candidates.pop().map(|(t, _)| t)
}
