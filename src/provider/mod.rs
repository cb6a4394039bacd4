//! Outbound calls to the meeting-bot provider (Recall.ai compatible).

use crate::config::{ProviderConfig, ServerConfig};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

/// What the caller supplies when asking for a bot.
pub struct CreateBotRequest<'a> {
    pub meeting_url: &'a str,
}

/// The provider-side identity of a freshly created bot.
#[derive(Debug, Clone)]
pub struct ProvisionedBot {
    pub id: String,
}

#[async_trait]
pub trait BotProvider: Send + Sync {
    async fn create_bot(&self, request: CreateBotRequest<'_>) -> Result<ProvisionedBot>;
    async fn send_chat_message(&self, bot_id: &str, message: &str) -> Result<()>;
}

pub struct RecallClient {
    http: Client,
    api_url: String,
    api_key: String,
    bot_name: String,
    transcript_ws_url: String,
    chat_webhook_url: String,
}

impl RecallClient {
    pub fn from_config(provider: &ProviderConfig, server: &ServerConfig) -> Result<Self> {
        let api_key = provider.api_key.trim().to_string();
        if api_key.is_empty() {
            anyhow::bail!("Provider API key is missing. Set provider.api_key in the config file.");
        }

        Ok(Self {
            http: Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .context("Failed to build provider HTTP client")?,
            api_url: provider.api_url.trim_end_matches('/').to_string(),
            api_key,
            bot_name: provider.bot_name.clone(),
            transcript_ws_url: server.transcript_ws_url(),
            chat_webhook_url: server.chat_webhook_url(),
        })
    }

    fn auth_header(&self) -> String {
        format!("Token {}", self.api_key)
    }

    fn greeting(&self) -> String {
        format!(
            "{} has joined the meeting. Type ? for a status check, or start a message with my name to ask a question.",
            self.bot_name
        )
    }
}

#[async_trait]
impl BotProvider for RecallClient {
    async fn create_bot(&self, request: CreateBotRequest<'_>) -> Result<ProvisionedBot> {
        let body = CreateBotBody {
            meeting_url: request.meeting_url,
            bot_name: &self.bot_name,
            recording_config: RecordingConfig {
                transcript: TranscriptConfig {
                    provider: TranscriptProviderConfig {
                        meeting_captions: MeetingCaptions {},
                    },
                },
                realtime_endpoints: vec![
                    RealtimeEndpoint {
                        kind: "websocket",
                        url: &self.transcript_ws_url,
                        events: vec!["transcript.data"],
                    },
                    RealtimeEndpoint {
                        kind: "webhook",
                        url: &self.chat_webhook_url,
                        events: vec!["participant_events.chat_message"],
                    },
                ],
            },
            chat: ChatConfig {
                on_bot_join: OnBotJoin {
                    send_to: "everyone",
                    message: self.greeting(),
                },
            },
        };

        let response = self
            .http
            .post(format!("{}/bot/", self.api_url))
            .header("Authorization", self.auth_header())
            .json(&body)
            .send()
            .await
            .context("Bot create request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            anyhow::bail!("Bot create failed with {}: {}", status, detail);
        }

        let bot: CreateBotResponse = response
            .json()
            .await
            .context("Failed to parse bot create response")?;

        info!("Provisioned bot {} for {}", bot.id, request.meeting_url);
        Ok(ProvisionedBot { id: bot.id })
    }

    async fn send_chat_message(&self, bot_id: &str, message: &str) -> Result<()> {
        let response = self
            .http
            .post(format!("{}/bot/{}/send_chat_message/", self.api_url, bot_id))
            .header("Authorization", self.auth_header())
            .json(&SendChatBody { message })
            .send()
            .await
            .context("Chat send request failed")?;

        response
            .error_for_status()
            .context("Chat send returned an error status")?;

        debug!("Chat message sent through bot {}", bot_id);
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct CreateBotBody<'a> {
    meeting_url: &'a str,
    bot_name: &'a str,
    recording_config: RecordingConfig<'a>,
    chat: ChatConfig<'a>,
}

#[derive(Debug, Serialize)]
struct RecordingConfig<'a> {
    transcript: TranscriptConfig,
    realtime_endpoints: Vec<RealtimeEndpoint<'a>>,
}

#[derive(Debug, Serialize)]
struct TranscriptConfig {
    provider: TranscriptProviderConfig,
}

#[derive(Debug, Serialize)]
struct TranscriptProviderConfig {
    meeting_captions: MeetingCaptions,
}

#[derive(Debug, Serialize)]
struct MeetingCaptions {}

#[derive(Debug, Serialize)]
struct RealtimeEndpoint<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
    url: &'a str,
    events: Vec<&'a str>,
}

#[derive(Debug, Serialize)]
struct ChatConfig<'a> {
    on_bot_join: OnBotJoin<'a>,
}

#[derive(Debug, Serialize)]
struct OnBotJoin<'a> {
    send_to: &'a str,
    message: String,
}

#[derive(Debug, Serialize)]
struct SendChatBody<'a> {
    message: &'a str,
}

#[derive(Debug, Deserialize)]
struct CreateBotResponse {
    id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> RecallClient {
        let provider = ProviderConfig {
            api_url: "https://example.recall.test/api/v1/".to_string(),
            api_key: "secret".to_string(),
            bot_name: "Stenobot".to_string(),
        };
        let server = ServerConfig {
            host: "0.0.0.0".to_string(),
            port: 3000,
            public_url: "https://bots.example.com".to_string(),
        };
        RecallClient::from_config(&provider, &server).unwrap()
    }

    #[test]
    fn test_missing_api_key_is_rejected() {
        let provider = ProviderConfig {
            api_key: "  ".to_string(),
            ..ProviderConfig::default()
        };
        let err = RecallClient::from_config(&provider, &ServerConfig::default())
            .err()
            .map(|e| e.to_string())
            .unwrap_or_default();
        assert!(err.contains("API key is missing"));
    }

    #[test]
    fn test_api_url_is_normalized() {
        let c = client();
        assert_eq!(c.api_url, "https://example.recall.test/api/v1");
    }

    #[test]
    fn test_create_body_wire_shape() {
        let c = client();
        let body = CreateBotBody {
            meeting_url: "https://meet.example.com/abc",
            bot_name: &c.bot_name,
            recording_config: RecordingConfig {
                transcript: TranscriptConfig {
                    provider: TranscriptProviderConfig {
                        meeting_captions: MeetingCaptions {},
                    },
                },
                realtime_endpoints: vec![RealtimeEndpoint {
                    kind: "websocket",
                    url: &c.transcript_ws_url,
                    events: vec!["transcript.data"],
                }],
            },
            chat: ChatConfig {
                on_bot_join: OnBotJoin {
                    send_to: "everyone",
                    message: c.greeting(),
                },
            },
        };

        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["meeting_url"], "https://meet.example.com/abc");
        assert_eq!(value["bot_name"], "Stenobot");
        assert_eq!(
            value["recording_config"]["transcript"]["provider"]["meeting_captions"],
            serde_json::json!({})
        );
        let endpoint = &value["recording_config"]["realtime_endpoints"][0];
        assert_eq!(endpoint["type"], "websocket");
        assert_eq!(endpoint["url"], "wss://bots.example.com/transcript");
        assert_eq!(endpoint["events"][0], "transcript.data");
        assert!(value["chat"]["on_bot_join"]["message"]
            .as_str()
            .unwrap()
            .starts_with("Stenobot has joined"));
    }

    #[test]
    fn test_greeting_names_the_bot() {
        let c = client();
        assert!(c.greeting().contains("Stenobot"));
        assert!(c.greeting().contains('?'));
    }
}
