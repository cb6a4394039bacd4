use crate::global;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub provider: ProviderConfig,
    pub mail: MailConfig,
    pub timing: TimingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Externally reachable base URL (scheme + host), used to build the
    /// realtime transcript and chat webhook endpoints handed to the provider.
    /// Empty means http://localhost:{port}.
    pub public_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            public_url: String::new(),
        }
    }
}

impl ServerConfig {
    pub fn public_base_url(&self) -> String {
        if self.public_url.is_empty() {
            format!("http://localhost:{}", self.port)
        } else {
            self.public_url.trim_end_matches('/').to_string()
        }
    }

    /// WebSocket URL the provider streams transcript data to.
    pub fn transcript_ws_url(&self) -> String {
        let base = self.public_base_url();
        let ws_base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            format!("ws://{}", base)
        };
        format!("{}/transcript", ws_base)
    }

    pub fn chat_webhook_url(&self) -> String {
        format!("{}/webhook/chat", self.public_base_url())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub api_url: String,
    pub api_key: String,
    /// Display name the bot joins meetings under. Also the name chat
    /// commands are addressed to, so keep it a single word.
    pub bot_name: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_url: "https://us-west-2.recall.ai/api/v1".to_string(),
            api_key: String::new(),
            bot_name: "Stenobot".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    /// From address for transcript emails. Empty falls back to smtp_username.
    pub from_address: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            smtp_host: String::new(),
            smtp_port: 587,
            smtp_username: String::new(),
            smtp_password: String::new(),
            from_address: String::new(),
        }
    }
}

impl MailConfig {
    pub fn is_configured(&self) -> bool {
        !self.smtp_host.is_empty()
    }

    pub fn effective_from(&self) -> &str {
        if self.from_address.is_empty() {
            &self.smtp_username
        } else {
            &self.from_address
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub sweep_interval_seconds: u64,
    pub sweep_initial_delay_seconds: u64,
    pub idle_timeout_seconds: u64,
    pub max_meeting_duration_seconds: u64,
    pub disconnect_grace_seconds: u64,
    pub leave_delay_seconds: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            sweep_interval_seconds: 300,
            sweep_initial_delay_seconds: 10,
            idle_timeout_seconds: 600,
            max_meeting_duration_seconds: 14_400,
            disconnect_grace_seconds: 30,
            leave_delay_seconds: 2,
        }
    }
}

impl TimingConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }

    pub fn sweep_initial_delay(&self) -> Duration {
        Duration::from_secs(self.sweep_initial_delay_seconds)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_seconds)
    }

    pub fn max_meeting_duration(&self) -> Duration {
        Duration::from_secs(self.max_meeting_duration_seconds)
    }

    pub fn disconnect_grace(&self) -> Duration {
        Duration::from_secs(self.disconnect_grace_seconds)
    }

    pub fn leave_delay(&self) -> Duration {
        Duration::from_secs(self.leave_delay_seconds)
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        Self::load_from(&config_path)
    }

    /// Load from an explicit path, creating a default file there if missing.
    pub fn load_from(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            info!(
                "Config file not found, creating default at {:?}",
                config_path
            );
            let config = Self::default();
            config.save_to(config_path)?;
            return Ok(config);
        }

        let content =
            std::fs::read_to_string(config_path).context("Failed to read config file")?;

        let config: Self = toml::from_str(&content).context("Failed to parse config file")?;

        info!("Loaded config from {:?}", config_path);
        Ok(config)
    }

    pub fn save_to(&self, config_path: &Path) -> Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        global::config_file()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_round_trip() {
        let config = Config::default();
        let toml_text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_text).unwrap();
        assert_eq!(parsed.server.port, 3000);
        assert_eq!(parsed.provider.bot_name, "Stenobot");
        assert_eq!(parsed.timing.sweep_interval_seconds, 300);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str("[server]\nport = 9999\n").unwrap();
        assert_eq!(config.server.port, 9999);
        assert_eq!(config.timing.idle_timeout_seconds, 600);
        assert!(config.mail.smtp_host.is_empty());
    }

    #[test]
    fn test_transcript_ws_url_schemes() {
        let mut server = ServerConfig::default();
        assert_eq!(server.transcript_ws_url(), "ws://localhost:3000/transcript");

        server.public_url = "https://bots.example.com".to_string();
        assert_eq!(
            server.transcript_ws_url(),
            "wss://bots.example.com/transcript"
        );
        assert_eq!(
            server.chat_webhook_url(),
            "https://bots.example.com/webhook/chat"
        );
    }

    #[test]
    fn test_effective_from_falls_back_to_username() {
        let mut mail = MailConfig::default();
        mail.smtp_username = "bot@example.com".to_string();
        assert_eq!(mail.effective_from(), "bot@example.com");

        mail.from_address = "notes@example.com".to_string();
        assert_eq!(mail.effective_from(), "notes@example.com");
    }
}
