use chrono::Utc;
use teloxide::utils::html;
use tracing::{info, warn};

use super::RejectReason;
use crate::event::InboundEvent;
use crate::platform::{ChatPlatform, TextFormat};
use crate::store::{AuditAction, AuditRecord, AuditTrail};

/// Delete the offending message, warn the sender, record the action.
///
/// The three steps always run in that order and none of them stops the next
/// one from running.
pub async fn enforce(
    platform: &dyn ChatPlatform,
    audit: &AuditTrail,
    event: &InboundEvent,
    reason: RejectReason,
    warning_text: &str,
) {
    info!(
        "Removing message {} from user {} in chat {} ({})",
        event.message_id, event.sender_id, event.chat_id, reason
    );

    if let Err(e) = platform
        .delete_message(event.chat_id, event.message_id)
        .await
    {
        warn!(
            "Could not delete message {} in chat {}: {:#}",
            event.message_id, event.chat_id, e
        );
    }

    let warning = warning_message(event, warning_text);
    if let Err(e) = platform
        .send_message(event.chat_id, &warning, TextFormat::Html)
        .await
    {
        warn!("Could not warn user {} in chat {}: {:#}", event.sender_id, event.chat_id, e);
    }

    audit
        .record(AuditRecord {
            chat_id: event.chat_id,
            user_id: event.sender_id,
            username: event.sender.username.clone(),
            action: AuditAction::Deleted,
            reason: Some(reason.as_str().to_string()),
            timestamp: Utc::now(),
        })
        .await;
}

/// Users are mentioned by link. Chats posting as themselves have negative
/// ids and are named without one.
fn warning_message(event: &InboundEvent, warning_text: &str) -> String {
    let name = html::escape(&event.sender.display_name());
    let sender = if event.sender_id > 0 {
        format!("<a href=\"tg://user?id={}\">{}</a>", event.sender_id, name)
    } else {
        format!("<b>{}</b>", name)
    };
    format!("⚠️ {}, {}", sender, html::escape(warning_text))
}
