//! Prompt construction for empathetic replies, plus the small text
//! heuristics around them (rationale lines, topic hints).

use crate::emotion::EmotionConfig;
use crate::policy::SuggestAction;

const REPLY_STRUCTURE: &str = "Answer in 2-3 short sentences with this structure:\n\
    1. One line of empathy\n\
    2. A suggestion that fits the situation (\"at times like this, how about ...?\")\n\
    3. A short explanation of the suggestion";

/// User prompt for the emotion-conditioned reply, matching the branch the
/// pipeline took for this emotion.
pub fn reply_prompt(user_text: &str, top_emotion: &str, config: &EmotionConfig) -> String {
    if config.negative.iter().any(|l| l == top_emotion) {
        format!(
            "{}\n(The user is feeling '{}'. Offer a warm word of comfort, and use web \
             search to find a comforting piece of music on YouTube to suggest, with its URL.)\n{}",
            user_text, top_emotion, REPLY_STRUCTURE
        )
    } else if config.cheerful.iter().any(|l| l == top_emotion) {
        format!(
            "{}\n(The user is feeling '{}'. Ask what exactly happened and share in the \
             feeling.)\n{}",
            user_text, top_emotion, REPLY_STRUCTURE
        )
    } else if config.encourage.iter().any(|l| l == top_emotion) {
        format!(
            "{}\n(The user is feeling '{}'. Send them a message of encouragement.)\n{}",
            user_text, top_emotion, REPLY_STRUCTURE
        )
    } else {
        format!("{}\n{}", user_text, REPLY_STRUCTURE)
    }
}

/// Friendly one-liner shown on the card for a firing action.
pub fn rationale_for(action: SuggestAction, policy_reason: &str) -> String {
    match action {
        SuggestAction::Hint => "You seemed quiet, so here's a gentle nudge.".to_string(),
        SuggestAction::Assist => "You sounded frustrated, this may help.".to_string(),
        SuggestAction::Recommend => "You seemed low, this may comfort you.".to_string(),
        SuggestAction::None => policy_reason.to_string(),
    }
}

/// Very light keyword-based topic hint from the transcript.
pub fn topic_hint(text: &str) -> Option<&'static str> {
    let lower = text.to_lowercase();
    const WORK_KW: &[&str] = &[
        "study", "homework", "assignment", "report", "deadline", "coding", "debug", "task",
    ];
    const STRESS_KW: &[&str] = &["anxious", "anxiety", "stress", "stressed", "nervous", "restless"];
    const HEALTH_KW: &[&str] = &["exercise", "stretch", "workout", "walk", "jog"];

    if WORK_KW.iter().any(|kw| lower.contains(kw)) {
        return Some("work/study");
    }
    if STRESS_KW.iter().any(|kw| lower.contains(kw)) {
        return Some("stress");
    }
    if HEALTH_KW.iter().any(|kw| lower.contains(kw)) {
        return Some("health");
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_emotion_asks_for_web_search() {
        let prompt = reply_prompt("I messed up again", "sadness", &EmotionConfig::default());
        assert!(prompt.contains("web"), "negative branch should mention search");
        assert!(prompt.contains("sadness"));
    }

    #[test]
    fn cheerful_emotion_asks_for_specifics() {
        let prompt = reply_prompt("I got the job!", "joy", &EmotionConfig::default());
        assert!(prompt.contains("what exactly happened"));
    }

    #[test]
    fn unknown_emotion_gets_the_generic_structure() {
        let prompt = reply_prompt("meeting at three", "neutral", &EmotionConfig::default());
        assert!(prompt.starts_with("meeting at three"));
        assert!(prompt.contains("2-3 short sentences"));
    }

    #[test]
    fn rationale_maps_each_action() {
        assert!(rationale_for(SuggestAction::Hint, "x").contains("quiet"));
        assert!(rationale_for(SuggestAction::Recommend, "x").contains("comfort"));
        assert_eq!(rationale_for(SuggestAction::None, "no policy hit"), "no policy hit");
    }

    #[test]
    fn topic_hints_detect_keyword_classes() {
        assert_eq!(topic_hint("this deadline is killing me"), Some("work/study"));
        assert_eq!(topic_hint("I feel so anxious lately"), Some("stress"));
        assert_eq!(topic_hint("maybe a short walk"), Some("health"));
        assert_eq!(topic_hint("nothing in particular"), None);
    }
}
