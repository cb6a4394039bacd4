//! Chat webhook handling: records inbound messages and answers commands.

pub mod commands;

use crate::db::MeetingStore;
use crate::meeting::liveness::LivenessTracker;
use crate::meeting::status::TERMINAL_STATUSES;
use crate::provider::BotProvider;
use crate::transcript::{chat_line, distinct_speakers, TranscriptAppender};
use anyhow::Result;
use commands::{CommandGrammar, ConversationView, MessageKind};
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

/// Sender label when the webhook omits the participant name.
const UNKNOWN_SENDER: &str = "Unknown";

/// How one webhook invocation was resolved.
#[derive(Debug)]
pub enum ChatOutcome {
    /// No live meeting for the bot id.
    UnknownBot,
    /// Self-message, dropped to avoid an echo loop.
    Ignored,
    /// Ordinary chatter, appended to the transcript.
    Recorded,
    /// Command answered; the reply reached the meeting and was recorded.
    Replied(String),
    /// Command answered but the provider send failed; nothing recorded.
    ReplyFailed,
}

#[derive(Clone)]
pub struct ChatCommandHandler {
    store: MeetingStore,
    appender: TranscriptAppender,
    liveness: LivenessTracker,
    provider: Arc<dyn BotProvider>,
    grammar: CommandGrammar,
}

impl ChatCommandHandler {
    pub fn new(
        store: MeetingStore,
        appender: TranscriptAppender,
        liveness: LivenessTracker,
        provider: Arc<dyn BotProvider>,
        assistant_name: &str,
    ) -> Result<Self> {
        Ok(Self {
            store,
            appender,
            liveness,
            provider,
            grammar: CommandGrammar::new(assistant_name)?,
        })
    }

    /// Handle one inbound chat message.
    ///
    /// The reply snapshot is taken before the message itself is appended, so
    /// a bare `?` in a silent meeting reports an empty conversation rather
    /// than counting itself.
    pub async fn handle(&self, bot_id: &str, sender: &str, text: &str) -> Result<ChatOutcome> {
        let Some(meeting) = self.store.get_by_bot_id(bot_id, &TERMINAL_STATUSES).await? else {
            return Ok(ChatOutcome::UnknownBot);
        };

        self.liveness.touch(bot_id);

        if self.grammar.is_self_message(sender) {
            debug!("Ignoring chat message from {} to avoid an echo loop", sender);
            return Ok(ChatOutcome::Ignored);
        }

        let kind = self.grammar.classify(text);
        let view = match kind {
            MessageKind::Ordinary => None,
            _ => Some(self.conversation_view(&meeting.id).await),
        };

        self.appender
            .append(&meeting.id, &chat_line(sender, text))
            .await;
        if let Err(e) = self.store.mark_active_if_joining(bot_id).await {
            warn!("Activation update for bot {} failed: {:#}", bot_id, e);
        }

        let Some(view) = view else {
            return Ok(ChatOutcome::Recorded);
        };
        let Some(reply) = self.grammar.reply_for(kind, text, &view) else {
            return Ok(ChatOutcome::Recorded);
        };

        if let Err(e) = self.provider.send_chat_message(bot_id, &reply).await {
            warn!("Chat reply for bot {} failed to send: {:#}", bot_id, e);
            return Ok(ChatOutcome::ReplyFailed);
        }

        // Only record what actually reached the meeting.
        self.appender
            .append(&meeting.id, &chat_line(self.grammar.name(), &reply))
            .await;
        Ok(ChatOutcome::Replied(reply))
    }

    async fn conversation_view(&self, meeting_id: &str) -> ConversationView {
        match self.store.transcript(meeting_id).await {
            Ok(entries) => {
                let entries = entries.unwrap_or_default();
                ConversationView {
                    has_content: !entries.is_empty(),
                    speaker_count: distinct_speakers(&entries, self.grammar.name()).len(),
                }
            }
            Err(e) => {
                warn!("Transcript read for meeting {} failed: {:#}", meeting_id, e);
                ConversationView {
                    has_content: false,
                    speaker_count: 0,
                }
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("missing field {0} in chat webhook")]
    Missing(&'static str),
}

/// Chat webhook envelope. Note the extra nesting level around the message
/// text compared to the streaming channel.
#[derive(Debug, Deserialize)]
pub struct ChatWebhook {
    data: Option<WebhookData>,
}

#[derive(Debug, Deserialize)]
struct WebhookData {
    bot: Option<WebhookBot>,
    data: Option<WebhookInner>,
}

#[derive(Debug, Deserialize)]
struct WebhookBot {
    id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WebhookInner {
    data: Option<WebhookText>,
    participant: Option<WebhookParticipant>,
}

#[derive(Debug, Deserialize)]
struct WebhookText {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WebhookParticipant {
    name: Option<String>,
}

/// A validated chat message, ready for [`ChatCommandHandler::handle`].
#[derive(Debug)]
pub struct ChatMessage {
    pub bot_id: String,
    pub sender: String,
    pub text: String,
}

impl ChatWebhook {
    pub fn into_message(self) -> Result<ChatMessage, WebhookError> {
        let data = self.data.ok_or(WebhookError::Missing("data"))?;
        let bot_id = data
            .bot
            .and_then(|b| b.id)
            .filter(|id| !id.is_empty())
            .ok_or(WebhookError::Missing("data.bot.id"))?;
        let inner = data.data.ok_or(WebhookError::Missing("data.data"))?;
        let text = inner
            .data
            .and_then(|d| d.text)
            .filter(|t| !t.is_empty())
            .ok_or(WebhookError::Missing("data.data.data.text"))?;
        let sender = inner
            .participant
            .and_then(|p| p.name)
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_SENDER.to_string());

        Ok(ChatMessage {
            bot_id,
            sender,
            text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::NewMeeting;
    use crate::meeting::status::{MeetingKind, MeetingStatus};
    use crate::provider::{CreateBotRequest, ProvisionedBot};
    use crate::transcript::{speech_line, TranscriptEntry};
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct StubProvider {
        sent: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    impl StubProvider {
        fn new(fail: bool) -> Arc<Self> {
            Arc::new(Self {
                sent: Mutex::new(Vec::new()),
                fail,
            })
        }

        fn sent_count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl BotProvider for StubProvider {
        async fn create_bot(&self, _request: CreateBotRequest<'_>) -> Result<ProvisionedBot> {
            anyhow::bail!("not used in these tests")
        }

        async fn send_chat_message(&self, bot_id: &str, message: &str) -> Result<()> {
            if self.fail {
                anyhow::bail!("provider unavailable");
            }
            self.sent
                .lock()
                .unwrap()
                .push((bot_id.to_string(), message.to_string()));
            Ok(())
        }
    }

    struct Fixture {
        _dir: TempDir,
        store: MeetingStore,
        liveness: LivenessTracker,
        provider: Arc<StubProvider>,
        handler: ChatCommandHandler,
    }

    fn fixture(fail_sends: bool) -> Fixture {
        let dir = TempDir::new().unwrap();
        let store = MeetingStore::open(dir.path().join("test.db")).unwrap();
        let liveness = LivenessTracker::new();
        let provider = StubProvider::new(fail_sends);
        let handler = ChatCommandHandler::new(
            store.clone(),
            TranscriptAppender::new(store.clone()),
            liveness.clone(),
            provider.clone(),
            "Stenobot",
        )
        .unwrap();
        Fixture {
            _dir: dir,
            store,
            liveness,
            provider,
            handler,
        }
    }

    async fn seed_meeting(fx: &Fixture, bot_id: &str) -> String {
        fx.store
            .create(NewMeeting {
                bot_id: bot_id.to_string(),
                kind: MeetingKind::Bot,
                name: None,
                meeting_url: None,
                transcript_email: None,
            })
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_self_message_is_dropped() {
        let fx = fixture(false);
        let meeting_id = seed_meeting(&fx, "bot-1").await;

        let outcome = fx
            .handler
            .handle("bot-1", "Stenobot Assistant", "echo of my own reply")
            .await
            .unwrap();
        assert!(matches!(outcome, ChatOutcome::Ignored));

        let entries = fx.store.transcript(&meeting_id).await.unwrap().unwrap();
        assert!(entries.is_empty());
        assert_eq!(fx.provider.sent_count(), 0);
        assert!(fx.liveness.contains("bot-1"));
    }

    #[tokio::test]
    async fn test_ordinary_message_is_recorded_without_reply() {
        let fx = fixture(false);
        let meeting_id = seed_meeting(&fx, "bot-1").await;

        let outcome = fx
            .handler
            .handle("bot-1", "Ada", "let's move to the next item")
            .await
            .unwrap();
        assert!(matches!(outcome, ChatOutcome::Recorded));

        let entries = fx.store.transcript(&meeting_id).await.unwrap().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].content, "[Ada via chat] let's move to the next item");
        assert_eq!(fx.provider.sent_count(), 0);

        let row = fx.store.get_by_bot_id("bot-1", &[]).await.unwrap().unwrap();
        assert_eq!(row.status, MeetingStatus::Active);
    }

    #[tokio::test]
    async fn test_status_query_in_silent_meeting() {
        let fx = fixture(false);
        let meeting_id = seed_meeting(&fx, "bot-1").await;

        let outcome = fx.handler.handle("bot-1", "Ada", "?").await.unwrap();
        let reply = match outcome {
            ChatOutcome::Replied(reply) => reply,
            other => panic!("unexpected outcome: {:?}", other),
        };
        assert!(reply.contains("haven't captured"));

        let entries = fx.store.transcript(&meeting_id).await.unwrap().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].content, "[Ada via chat] ?");
        assert!(entries[1].content.starts_with("[Stenobot via chat] "));
        assert_eq!(fx.provider.sent_count(), 1);
    }

    #[tokio::test]
    async fn test_directed_question_counts_speakers() {
        let fx = fixture(false);
        let meeting_id = seed_meeting(&fx, "bot-1").await;
        for (speaker, text) in [("Ada", "the budget looks fine"), ("Grace", "agreed")] {
            fx.store
                .append_transcript(&meeting_id, &TranscriptEntry::new(speech_line(speaker, text)))
                .await
                .unwrap();
        }

        let outcome = fx
            .handler
            .handle("bot-1", "Ada", "Stenobot, who is talking?")
            .await
            .unwrap();
        let reply = match outcome {
            ChatOutcome::Replied(reply) => reply,
            other => panic!("unexpected outcome: {:?}", other),
        };
        assert!(reply.contains("2 speakers"));
    }

    #[tokio::test]
    async fn test_failed_send_leaves_reply_unrecorded() {
        let fx = fixture(true);
        let meeting_id = seed_meeting(&fx, "bot-1").await;

        let outcome = fx.handler.handle("bot-1", "Ada", "?").await.unwrap();
        assert!(matches!(outcome, ChatOutcome::ReplyFailed));

        let entries = fx.store.transcript(&meeting_id).await.unwrap().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].content, "[Ada via chat] ?");
    }

    #[tokio::test]
    async fn test_unknown_bot_is_reported() {
        let fx = fixture(false);
        let outcome = fx.handler.handle("ghost", "Ada", "hello").await.unwrap();
        assert!(matches!(outcome, ChatOutcome::UnknownBot));
        assert!(!fx.liveness.contains("ghost"));
    }

    #[test]
    fn test_webhook_payload_extraction() {
        let payload = serde_json::json!({
            "data": {
                "bot": { "id": "bot-9" },
                "data": {
                    "data": { "text": "hi there" },
                    "participant": { "name": "Ada" }
                }
            }
        });
        let webhook: ChatWebhook = serde_json::from_value(payload).unwrap();
        let message = webhook.into_message().unwrap();
        assert_eq!(message.bot_id, "bot-9");
        assert_eq!(message.sender, "Ada");
        assert_eq!(message.text, "hi there");
    }

    #[test]
    fn test_webhook_missing_text_is_rejected() {
        let payload = serde_json::json!({
            "data": {
                "bot": { "id": "bot-9" },
                "data": { "participant": { "name": "Ada" } }
            }
        });
        let webhook: ChatWebhook = serde_json::from_value(payload).unwrap();
        let err = webhook.into_message().unwrap_err();
        assert!(err.to_string().contains("data.data"));
    }

    #[test]
    fn test_webhook_missing_participant_defaults_sender() {
        let payload = serde_json::json!({
            "data": {
                "bot": { "id": "bot-9" },
                "data": { "data": { "text": "anonymous note" } }
            }
        });
        let webhook: ChatWebhook = serde_json::from_value(payload).unwrap();
        let message = webhook.into_message().unwrap();
        assert_eq!(message.sender, UNKNOWN_SENDER);
    }
}
