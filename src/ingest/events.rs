//! Typed payload models for the provider's realtime streaming channel.
//!
//! Frames arrive as JSON envelopes with an `event` discriminator. Only
//! `transcript.data` carries anything we act on; everything else passes
//! through as [`StreamEvent::Ignored`] so new provider event types never
//! break the connection.

use serde::Deserialize;
use thiserror::Error;

pub const TRANSCRIPT_DATA_EVENT: &str = "transcript.data";
pub const UNKNOWN_SPEAKER: &str = "Unknown Speaker";

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("missing field {0}")]
    MissingField(&'static str),
}

#[derive(Debug, Deserialize)]
struct StreamFrame {
    event: String,
    data: Option<StreamData>,
}

#[derive(Debug, Deserialize)]
struct StreamData {
    bot: Option<BotRef>,
    data: Option<TranscriptData>,
}

#[derive(Debug, Deserialize)]
struct BotRef {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TranscriptData {
    words: Option<Vec<Word>>,
    participant: Option<Participant>,
}

#[derive(Debug, Deserialize)]
struct Word {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Participant {
    name: Option<String>,
}

/// One validated inbound frame.
#[derive(Debug)]
pub enum StreamEvent {
    Transcript(TranscriptFragment),
    Ignored { event: String },
}

/// A finalized transcript fragment, ready for appending.
///
/// `text` is the word tokens joined with single spaces and trimmed; it may
/// legitimately be empty, which callers treat as a skip.
#[derive(Debug)]
pub struct TranscriptFragment {
    pub bot_id: String,
    pub speaker: String,
    pub text: String,
}

pub fn parse_stream_frame(raw: &str) -> Result<StreamEvent, FrameError> {
    let frame: StreamFrame = serde_json::from_str(raw)?;
    if frame.event != TRANSCRIPT_DATA_EVENT {
        return Ok(StreamEvent::Ignored { event: frame.event });
    }

    let data = frame.data.ok_or(FrameError::MissingField("data"))?;
    let bot_id = data
        .bot
        .and_then(|b| b.id)
        .filter(|id| !id.is_empty())
        .ok_or(FrameError::MissingField("data.bot.id"))?;
    let payload = data.data.ok_or(FrameError::MissingField("data.data"))?;
    let words = payload
        .words
        .ok_or(FrameError::MissingField("data.data.words"))?;

    let speaker = payload
        .participant
        .and_then(|p| p.name)
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_SPEAKER.to_string());

    let text = words
        .iter()
        .filter_map(|w| w.text.as_deref())
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string();

    Ok(StreamEvent::Transcript(TranscriptFragment {
        bot_id,
        speaker,
        text,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(words: &[&str], name: Option<&str>) -> String {
        let words: Vec<serde_json::Value> = words
            .iter()
            .map(|w| serde_json::json!({ "text": w }))
            .collect();
        let participant = match name {
            Some(n) => serde_json::json!({ "name": n }),
            None => serde_json::Value::Null,
        };
        serde_json::json!({
            "event": "transcript.data",
            "data": {
                "bot": { "id": "bot-123" },
                "data": { "words": words, "participant": participant }
            }
        })
        .to_string()
    }

    #[test]
    fn test_transcript_frame_parses() {
        let event = parse_stream_frame(&frame(&["hello", "there"], Some("Ada"))).unwrap();
        match event {
            StreamEvent::Transcript(f) => {
                assert_eq!(f.bot_id, "bot-123");
                assert_eq!(f.speaker, "Ada");
                assert_eq!(f.text, "hello there");
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_unrelated_event_is_ignored() {
        let raw = serde_json::json!({ "event": "transcript.partial_data", "data": {} }).to_string();
        match parse_stream_frame(&raw).unwrap() {
            StreamEvent::Ignored { event } => assert_eq!(event, "transcript.partial_data"),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_missing_bot_id_is_rejected() {
        let raw = serde_json::json!({
            "event": "transcript.data",
            "data": { "data": { "words": [{ "text": "hi" }] } }
        })
        .to_string();
        let err = parse_stream_frame(&raw).unwrap_err();
        assert!(matches!(err, FrameError::MissingField("data.bot.id")));
    }

    #[test]
    fn test_missing_words_is_rejected() {
        let raw = serde_json::json!({
            "event": "transcript.data",
            "data": { "bot": { "id": "bot-123" }, "data": { "participant": { "name": "Ada" } } }
        })
        .to_string();
        let err = parse_stream_frame(&raw).unwrap_err();
        assert!(matches!(err, FrameError::MissingField("data.data.words")));
    }

    #[test]
    fn test_absent_participant_gets_default_speaker() {
        let event = parse_stream_frame(&frame(&["hi"], None)).unwrap();
        match event {
            StreamEvent::Transcript(f) => assert_eq!(f.speaker, UNKNOWN_SPEAKER),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_whitespace_words_join_to_empty_text() {
        let event = parse_stream_frame(&frame(&["", " ", ""], Some("Ada"))).unwrap();
        match event {
            StreamEvent::Transcript(f) => assert!(f.text.is_empty()),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn test_garbage_is_a_json_error() {
        assert!(matches!(
            parse_stream_frame("not json").unwrap_err(),
            FrameError::Json(_)
        ));
    }
}
