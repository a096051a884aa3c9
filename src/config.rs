use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::event::ChatKind;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    #[serde(default = "default_server_config")]
    pub server: ServerConfig,
    #[serde(default = "default_moderation_config")]
    pub moderation: ModerationConfig,
    #[serde(default = "default_broadcast_config")]
    pub broadcast: BroadcastConfig,
    /// Without a `[storage]` section the registry and audit log are disabled.
    #[serde(default)]
    pub storage: Option<StorageConfig>,
    #[serde(default = "default_timeout_config")]
    pub timeouts: TimeoutConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    pub bot_token: String,
    /// Users allowed to run `/broadcast`
    #[serde(default)]
    pub operator_ids: Vec<i64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_webhook_path")]
    pub webhook_path: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModerationConfig {
    /// Whether `channel` chats are moderated alongside groups and supergroups.
    #[serde(default = "default_true")]
    pub moderate_channels: bool,
    /// Skip moderation for chat creators and administrators.
    #[serde(default)]
    pub exempt_admins: bool,
    #[serde(default = "default_warning_text")]
    pub warning_text: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BroadcastConfig {
    /// Upper bound on in-flight sends during a broadcast
    #[serde(default = "default_broadcast_concurrency")]
    pub concurrency: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub database_path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TimeoutConfig {
    #[serde(default = "default_telegram_secs")]
    pub telegram_secs: u64,
    #[serde(default = "default_storage_secs")]
    pub storage_secs: u64,
}

fn default_true() -> bool {
    true
}

fn default_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_webhook_path() -> String {
    "/api/telegram".to_string()
}

fn default_warning_text() -> String {
    "Only Telegram group/channel links are allowed (one link per message).".to_string()
}

fn default_broadcast_concurrency() -> usize {
    8
}

fn default_db_path() -> PathBuf {
    PathBuf::from("linkguard.db")
}

fn default_telegram_secs() -> u64 {
    10
}

fn default_storage_secs() -> u64 {
    5
}

fn default_server_config() -> ServerConfig {
    ServerConfig {
        bind_address: default_bind_address(),
        webhook_path: default_webhook_path(),
    }
}

fn default_moderation_config() -> ModerationConfig {
    ModerationConfig {
        moderate_channels: true,
        exempt_admins: false,
        warning_text: default_warning_text(),
    }
}

fn default_broadcast_config() -> BroadcastConfig {
    BroadcastConfig {
        concurrency: default_broadcast_concurrency(),
    }
}

fn default_timeout_config() -> TimeoutConfig {
    TimeoutConfig {
        telegram_secs: default_telegram_secs(),
        storage_secs: default_storage_secs(),
    }
}

impl ModerationConfig {
    /// Chat kinds that go through the moderation pipeline.
    pub fn moderated_kinds(&self) -> Vec<ChatKind> {
        let mut kinds = vec![ChatKind::Group, ChatKind::Supergroup];
        if self.moderate_channels {
            kinds.push(ChatKind::Channel);
        }
        kinds
    }
}

impl TimeoutConfig {
    pub fn telegram(&self) -> Duration {
        Duration::from_secs(self.telegram_secs)
    }

    pub fn storage(&self) -> Duration {
        Duration::from_secs(self.storage_secs)
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Invalid configuration")?;

        if config.telegram.bot_token.trim().is_empty() {
            anyhow::bail!("telegram.bot_token must not be empty");
        }
        if config.broadcast.concurrency == 0 {
            anyhow::bail!("broadcast.concurrency must be at least 1");
        }
        if !config.server.webhook_path.starts_with('/') {
            anyhow::bail!(
                "server.webhook_path must start with '/': {}",
                config.server.webhook_path
            );
        }

        Ok(config)
    }
}
