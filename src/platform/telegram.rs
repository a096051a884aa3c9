use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use teloxide::prelude::*;
use teloxide::types::{ChatId, MessageId, ParseMode};
use tracing::debug;

use super::{ChatPlatform, ChatSummary, GetChatResponse, MemberStatus, TextFormat};

/// Bot API envelope shared by every method
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMemberSummary {
    status: MemberStatus,
}

/// Telegram Bot API client.
///
/// Sends and deletes go through teloxide. Lookups only need the chat `type`
/// and member `status`, so they are posted as plain JSON through the same
/// reqwest client the bot uses.
pub struct TelegramPlatform {
    bot: Bot,
}

/// `<api>/bot<token>/<method>`. Segments are pushed rather than joined so the
/// `:` in the token is never read as a URL scheme.
fn method_url(api_url: &reqwest::Url, token: &str, method: &str) -> Result<reqwest::Url> {
    let mut url = api_url.clone();
    url.path_segments_mut()
        .map_err(|_| anyhow::anyhow!("Telegram API URL cannot be a base: {}", api_url))?
        .pop_if_empty()
        .push(&format!("bot{}", token))
        .push(method);
    Ok(url)
}

impl TelegramPlatform {
    pub fn new(bot_token: &str, timeout: Duration) -> Result<Self> {
        let client: reqwest::Client = teloxide::net::default_reqwest_settings()
            .timeout(timeout)
            .build()
            .context("Failed to build Telegram HTTP client")?;

        Ok(Self {
            bot: Bot::with_client(bot_token, client),
        })
    }

    async fn call_api<T: DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<ApiResponse<T>> {
        let url = method_url(&self.bot.api_url(), self.bot.token(), method)?;

        debug!("Calling Telegram method {}", method);

        let response: reqwest::Response = self
            .bot
            .client()
            .post(url)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("Failed to send {} request", method))?;

        // 4xx answers still carry the `{ok: false, description}` envelope;
        // 5xx ones usually come from a proxy and do not.
        let status = response.status();
        if status.is_server_error() {
            anyhow::bail!("{} failed with HTTP {}", method, status);
        }

        response
            .json::<ApiResponse<T>>()
            .await
            .with_context(|| format!("Failed to parse {} response", method))
    }
}

#[async_trait]
impl ChatPlatform for TelegramPlatform {
    async fn send_message(&self, chat_id: i64, text: &str, format: TextFormat) -> Result<()> {
        let request = self.bot.send_message(ChatId(chat_id), text.to_string());
        match format {
            TextFormat::Html => request.parse_mode(ParseMode::Html).await,
            TextFormat::Plain => request.await,
        }
        .with_context(|| format!("sendMessage to chat {} failed", chat_id))?;
        Ok(())
    }

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<()> {
        let message_id = i32::try_from(message_id)
            .with_context(|| format!("Message id out of range: {}", message_id))?;
        self.bot
            .delete_message(ChatId(chat_id), MessageId(message_id))
            .await
            .with_context(|| {
                format!("deleteMessage {} in chat {} failed", message_id, chat_id)
            })?;
        Ok(())
    }

    async fn get_chat(&self, identifier: &str) -> Result<GetChatResponse> {
        let response: ApiResponse<ChatSummary> = self
            .call_api("getChat", json!({ "chat_id": identifier }))
            .await?;

        if !response.ok {
            debug!(
                "getChat {} rejected: {}",
                identifier,
                response.description.as_deref().unwrap_or("no description")
            );
        }

        Ok(GetChatResponse {
            ok: response.ok,
            result: response.result,
        })
    }

    async fn member_status(&self, chat_id: i64, user_id: i64) -> Result<MemberStatus> {
        let response: ApiResponse<ChatMemberSummary> = self
            .call_api(
                "getChatMember",
                json!({ "chat_id": chat_id, "user_id": user_id }),
            )
            .await?;

        match response.result {
            Some(member) if response.ok => Ok(member.status),
            _ => anyhow::bail!(
                "getChatMember {} in chat {} failed: {}",
                user_id,
                chat_id,
                response.description.unwrap_or_default()
            ),
        }
    }
}
