pub mod telegram;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

use crate::event::ChatKind;

/// How the platform should render an outgoing message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFormat {
    Plain,
    Html,
}

/// Response of a `getChat` lookup: `{ok, result?: {type, ...}}`
#[derive(Debug, Clone, Deserialize)]
pub struct GetChatResponse {
    pub ok: bool,
    pub result: Option<ChatSummary>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatSummary {
    #[serde(rename = "type")]
    pub kind: ChatKind,
}

/// A user's standing inside a chat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Creator,
    Administrator,
    Member,
    Restricted,
    Left,
    Kicked,
    #[serde(other)]
    Unknown,
}

impl MemberStatus {
    pub fn is_privileged(self) -> bool {
        matches!(self, MemberStatus::Creator | MemberStatus::Administrator)
    }
}

/// Outbound calls the bot makes against the messaging platform.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    async fn send_message(&self, chat_id: i64, text: &str, format: TextFormat) -> Result<()>;

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<()>;

    /// Look up a chat by id or `@username`.
    async fn get_chat(&self, identifier: &str) -> Result<GetChatResponse>;

    async fn member_status(&self, chat_id: i64, user_id: i64) -> Result<MemberStatus>;
}
