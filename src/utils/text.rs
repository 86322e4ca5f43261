//! Reply text post-processing — link rewriting, emoji stripping, and
//! PII redaction for request logs.

use regex::Regex;
use std::sync::OnceLock;

fn markdown_link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[([^\]]+)\]\((https?://[^\)]+)\)").expect("static regex"))
}

fn emoji_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Emoticons, symbols/pictographs, transport, flags, dingbats
    RE.get_or_init(|| {
        Regex::new(concat!(
            "[",
            "\u{1F600}-\u{1F64F}",
            "\u{1F300}-\u{1F5FF}",
            "\u{1F680}-\u{1F6FF}",
            "\u{1F1E0}-\u{1F1FF}",
            "\u{2702}-\u{27B0}",
            "\u{1F900}-\u{1F9FF}",
            "]+"
        ))
        .expect("static regex")
    })
}

fn email_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}").expect("static regex")
    })
}

fn phone_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\d{2,3}-\d{3,4}-\d{4}\b").expect("static regex"))
}

fn link_line_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)link:.*").expect("static regex"))
}

/// Drop `()` leftovers the model sometimes produces after link stripping.
pub fn remove_empty_parentheses(text: &str) -> String {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"\(\s*\)").expect("static regex"));
    re.replace_all(text, "").into_owned()
}

/// Rewrite markdown `[label](url)` links as HTML anchors for the front end.
pub fn markdown_to_html_links(text: &str) -> String {
    markdown_link_re()
        .replace_all(text, r#"<a href="$2" target="_blank">$1</a>"#)
        .into_owned()
}

/// First markdown link URL in the text, if any.
pub fn extract_first_markdown_url(text: &str) -> Option<String> {
    markdown_link_re()
        .captures(text)
        .map(|caps| caps[2].to_string())
}

/// Strip emoji so TTS doesn't read them aloud.
pub fn remove_emojis(text: &str) -> String {
    emoji_re().replace_all(text, "").into_owned()
}

/// Text prepared for speech synthesis: trailing `Link: ...` lines and
/// emoji removed.
pub fn tts_text(text: &str) -> String {
    let without_links = link_line_re().replace_all(text, "");
    remove_emojis(&without_links).trim().to_string()
}

/// Redact email addresses and phone numbers before a string reaches the logs.
pub fn redact_pii(text: &str) -> String {
    let redacted = email_re().replace_all(text, "[email]");
    phone_re().replace_all(&redacted, "[phone]").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_links_become_anchors() {
        let out = markdown_to_html_links("try [this song](https://youtu.be/abc) tonight");
        assert_eq!(
            out,
            r#"try <a href="https://youtu.be/abc" target="_blank">this song</a> tonight"#
        );
    }

    #[test]
    fn first_markdown_url_is_extracted() {
        let text = "a [one](https://a.example) b [two](https://b.example)";
        assert_eq!(
            extract_first_markdown_url(text).as_deref(),
            Some("https://a.example")
        );
        assert_eq!(extract_first_markdown_url("no links here"), None);
    }

    #[test]
    fn emoji_are_stripped() {
        assert_eq!(remove_emojis("take a breath 😊✨ ok"), "take a breath  ok");
    }

    #[test]
    fn tts_text_drops_link_lines_and_emoji() {
        let reply = "Why not try some lo-fi? 🎧\nLink: https://youtu.be/abc";
        assert_eq!(tts_text(reply), "Why not try some lo-fi?");
    }

    #[test]
    fn empty_parentheses_removed() {
        assert_eq!(remove_empty_parentheses("hello (  ) there"), "hello  there");
    }

    #[test]
    fn pii_is_redacted() {
        let line = "user kei@example.com called from 010-1234-5678";
        assert_eq!(redact_pii(line), "user [email] called from [phone]");
    }
}
