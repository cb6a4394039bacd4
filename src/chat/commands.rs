//! Command grammar and canned replies for the in-meeting assistant.
//!
//! A chat message is a command when it is exactly `?` or when it starts
//! with the assistant's name, optionally after a greeting word. Replies are
//! templated from a small snapshot of the conversation; anything smarter
//! lives outside this service.

use anyhow::{Context, Result};
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Bare `?`, a quick status poke.
    StatusQuery,
    /// Starts with the assistant's name, optionally after a greeting.
    Directed,
    Ordinary,
}

/// What the assistant knows about the conversation when replying.
#[derive(Debug, Clone, Copy)]
pub struct ConversationView {
    pub has_content: bool,
    pub speaker_count: usize,
}

#[derive(Clone)]
pub struct CommandGrammar {
    name: String,
    lower_name: String,
    directed_prefixes: [String; 4],
    question_re: Regex,
}

impl CommandGrammar {
    pub fn new(assistant_name: &str) -> Result<Self> {
        let lower_name = assistant_name.to_lowercase();
        let question_re = Regex::new(&format!(
            r"(?i){}[,:]?\s*(.+)",
            regex::escape(assistant_name)
        ))
        .context("Failed to compile assistant command pattern")?;

        Ok(Self {
            name: assistant_name.to_string(),
            directed_prefixes: [
                lower_name.clone(),
                format!("hi {}", lower_name),
                format!("hey {}", lower_name),
                format!("hello {}", lower_name),
            ],
            lower_name,
            question_re,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Messages the provider echoes back from the assistant itself.
    pub fn is_self_message(&self, sender: &str) -> bool {
        sender.to_lowercase().contains(&self.lower_name)
    }

    pub fn classify(&self, text: &str) -> MessageKind {
        let trimmed = text.trim();
        if trimmed == "?" {
            return MessageKind::StatusQuery;
        }
        let lower = trimmed.to_lowercase();
        if self
            .directed_prefixes
            .iter()
            .any(|prefix| lower.starts_with(prefix.as_str()))
        {
            MessageKind::Directed
        } else {
            MessageKind::Ordinary
        }
    }

    /// The question part of a directed message: whatever follows the
    /// assistant's name. Falls back to the whole trimmed message.
    pub fn extract_question<'a>(&self, text: &'a str) -> &'a str {
        self.question_re
            .captures(text)
            .and_then(|captures| captures.get(1))
            .map(|m| m.as_str().trim())
            .filter(|question| !question.is_empty())
            .unwrap_or_else(|| text.trim())
    }

    /// Build a reply for a command, or `None` for ordinary chatter.
    pub fn reply_for(&self, kind: MessageKind, text: &str, view: &ConversationView) -> Option<String> {
        match kind {
            MessageKind::Ordinary => None,
            MessageKind::StatusQuery => Some(self.status_reply(view)),
            MessageKind::Directed => Some(self.directed_reply(self.extract_question(text), view)),
        }
    }

    fn status_reply(&self, view: &ConversationView) -> String {
        if !view.has_content {
            return "I haven't captured any conversation yet - are people speaking with captions enabled?".to_string();
        }
        format!(
            "I'm listening. So far I've heard {} in this meeting. Start a message with {} to ask me something specific.",
            speakers_phrase(view.speaker_count),
            self.name
        )
    }

    fn directed_reply(&self, question: &str, view: &ConversationView) -> String {
        let lower = question.to_lowercase();

        if lower.contains("help") {
            return format!(
                "I keep a transcript of this meeting. Type ? for a status check, or start a message with {} to ask about the conversation.",
                self.name
            );
        }
        if lower.contains("respond") || lower.contains("question") {
            return format!(
                "I'm here. Start a message with {} and I'll answer with what I know about the conversation.",
                self.name
            );
        }
        if lower.contains("who") || lower.contains("what") {
            return if view.has_content {
                format!(
                    "So far I've heard {} in this conversation.",
                    speakers_phrase(view.speaker_count)
                )
            } else {
                "I haven't heard anyone speak yet - are captions enabled?".to_string()
            };
        }

        if view.has_content {
            format!(
                "I've been following the conversation ({} so far). I can only answer simple status questions right now.",
                speakers_phrase(view.speaker_count)
            )
        } else {
            "I haven't captured any conversation content yet. Keep talking and ask me again in a bit.".to_string()
        }
    }
}

fn speakers_phrase(count: usize) -> String {
    match count {
        0 => "no speakers".to_string(),
        1 => "1 speaker".to_string(),
        n => format!("{} speakers", n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grammar() -> CommandGrammar {
        CommandGrammar::new("Stenobot").unwrap()
    }

    #[test]
    fn test_bare_question_mark_is_a_command() {
        assert_eq!(grammar().classify("?"), MessageKind::StatusQuery);
        assert_eq!(grammar().classify(" ? "), MessageKind::StatusQuery);
    }

    #[test]
    fn test_repeated_question_marks_are_not() {
        assert_eq!(grammar().classify("???"), MessageKind::Ordinary);
    }

    #[test]
    fn test_name_prefix_with_leading_whitespace() {
        assert_eq!(
            grammar().classify("  Stenobot, are you there?"),
            MessageKind::Directed
        );
    }

    #[test]
    fn test_greeting_prefixes() {
        let g = grammar();
        assert_eq!(g.classify("hi stenobot"), MessageKind::Directed);
        assert_eq!(g.classify("Hey Stenobot what's up"), MessageKind::Directed);
        assert_eq!(g.classify("hello STENOBOT?"), MessageKind::Directed);
    }

    #[test]
    fn test_name_must_lead_the_message() {
        let g = grammar();
        assert_eq!(g.classify("nonstenobot help"), MessageKind::Ordinary);
        assert_eq!(g.classify("well stenobot, hmm"), MessageKind::Ordinary);
    }

    #[test]
    fn test_self_message_detection_is_contains_based() {
        let g = grammar();
        assert!(g.is_self_message("Stenobot"));
        assert!(g.is_self_message("STENOBOT (bot)"));
        assert!(!g.is_self_message("Ada"));
    }

    #[test]
    fn test_question_extraction() {
        let g = grammar();
        assert_eq!(
            g.extract_question("Stenobot, what time is it?"),
            "what time is it?"
        );
        assert_eq!(
            g.extract_question("hey Stenobot: summarize please"),
            "summarize please"
        );
        assert_eq!(g.extract_question("stenobot"), "stenobot");
    }

    #[test]
    fn test_status_reply_reflects_the_conversation() {
        let g = grammar();
        let silent = ConversationView {
            has_content: false,
            speaker_count: 0,
        };
        assert!(g.status_reply(&silent).contains("haven't captured"));

        let busy = ConversationView {
            has_content: true,
            speaker_count: 2,
        };
        assert!(g.status_reply(&busy).contains("2 speakers"));
    }

    #[test]
    fn test_directed_reply_branches_on_keywords() {
        let g = grammar();
        let view = ConversationView {
            has_content: true,
            speaker_count: 3,
        };
        assert!(g.directed_reply("help", &view).contains("Type ?"));
        assert!(g.directed_reply("who is talking", &view).contains("3 speakers"));
        assert!(g
            .directed_reply("can you respond", &view)
            .contains("Start a message with Stenobot"));
        assert!(g
            .directed_reply("summarize the budget", &view)
            .contains("3 speakers"));
    }

    #[test]
    fn test_ordinary_messages_get_no_reply() {
        let g = grammar();
        let view = ConversationView {
            has_content: true,
            speaker_count: 1,
        };
        assert!(g.reply_for(MessageKind::Ordinary, "just chatting", &view).is_none());
    }
}
