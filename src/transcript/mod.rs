//! Transcript entry model, line tagging, and speaker extraction.

pub mod appender;

pub use appender::TranscriptAppender;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One timestamped line of accumulated meeting text. Immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub timestamp: DateTime<Utc>,
    pub content: String,
}

impl TranscriptEntry {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            content: content.into(),
        }
    }
}

const CHAT_TAG_SUFFIX: &str = " via chat";

/// Tag for a spoken line: `[speaker] text`.
pub fn speech_line(speaker: &str, text: &str) -> String {
    format!("[{}] {}", speaker, text)
}

/// Tag for a chat message: `[sender via chat] text`.
pub fn chat_line(sender: &str, text: &str) -> String {
    format!("[{}{}] {}", sender, CHAT_TAG_SUFFIX, text)
}

/// Speaker named in an entry's leading `[Name]` tag, if present.
///
/// Chat entries report the sender with the `via chat` marker stripped, so a
/// participant counts as one speaker whether they talked or typed.
pub fn speaker_of(content: &str) -> Option<&str> {
    let rest = content.strip_prefix('[')?;
    let end = rest.find(']')?;
    let name = rest[..end].trim();
    let name = name.strip_suffix(CHAT_TAG_SUFFIX).unwrap_or(name);
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// Distinct speakers seen in `entries`, in first-appearance order.
///
/// Excludes `assistant_name` (its own replies are not participants) and
/// dedupes case-insensitively.
pub fn distinct_speakers(entries: &[TranscriptEntry], assistant_name: &str) -> Vec<String> {
    let mut speakers: Vec<String> = Vec::new();
    for entry in entries {
        if let Some(name) = speaker_of(&entry.content) {
            if name.eq_ignore_ascii_case(assistant_name) {
                continue;
            }
            if !speakers.iter().any(|s| s.eq_ignore_ascii_case(name)) {
                speakers.push(name.to_string());
            }
        }
    }
    speakers
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(content: &str) -> TranscriptEntry {
        TranscriptEntry::new(content)
    }

    #[test]
    fn test_line_tags() {
        assert_eq!(speech_line("Ada", "hello there"), "[Ada] hello there");
        assert_eq!(chat_line("Ada", "typed this"), "[Ada via chat] typed this");
    }

    #[test]
    fn test_speaker_of_speech_and_chat() {
        assert_eq!(speaker_of("[Ada] hello"), Some("Ada"));
        assert_eq!(speaker_of("[Ada via chat] hi"), Some("Ada"));
        assert_eq!(speaker_of("untagged line"), None);
        assert_eq!(speaker_of("[] empty tag"), None);
    }

    #[test]
    fn test_distinct_speakers_dedupes_and_excludes_assistant() {
        let entries = vec![
            entry("[Ada] first"),
            entry("[Grace] second"),
            entry("[ada] third"),
            entry("[Stenobot via chat] I am the assistant"),
            entry("[Grace via chat] typed too"),
        ];

        let speakers = distinct_speakers(&entries, "Stenobot");
        assert_eq!(speakers, vec!["Ada".to_string(), "Grace".to_string()]);
    }

    #[test]
    fn test_entry_serialization_shape() {
        let e = entry("[Ada] hello");
        let json = serde_json::to_string(&e).unwrap();
        assert!(json.contains("\"timestamp\""));
        assert!(json.contains("\"content\":\"[Ada] hello\""));

        let parsed: TranscriptEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.content, "[Ada] hello");
    }
}
