use serde::Deserialize;

/// Chat type as reported by Telegram
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    Private,
    Group,
    Supergroup,
    Channel,
    #[serde(other)]
    Unknown,
}

impl ChatKind {
    /// Group-like chats a public invite link may point at
    pub fn is_public_target(self) -> bool {
        matches!(self, ChatKind::Group | ChatKind::Supergroup | ChatKind::Channel)
    }
}

// ── Webhook wire types ─────────────────────────────────────────────────────────
//
// Only the fields the bot reads are modelled; everything else in the update
// payload is ignored by serde.

#[derive(Debug, Deserialize)]
pub struct Update {
    #[serde(default)]
    pub update_id: i64,
    pub message: Option<WireMessage>,
    pub channel_post: Option<WireMessage>,
}

#[derive(Debug, Deserialize)]
pub struct WireMessage {
    pub message_id: i64,
    pub chat: WireChat,
    pub from: Option<WireUser>,
    /// Set when a message is sent on behalf of a chat, as channel posts are
    pub sender_chat: Option<WireSenderChat>,
    pub text: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WireChat {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: ChatKind,
}

#[derive(Debug, Deserialize)]
pub struct WireUser {
    pub id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct WireSenderChat {
    pub id: i64,
    pub title: Option<String>,
    pub username: Option<String>,
}

// ── Domain event ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderProfile {
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
}

impl SenderProfile {
    pub fn display_name(&self) -> String {
        match &self.last_name {
            Some(last) if !last.is_empty() => format!("{} {}", self.first_name, last),
            _ => self.first_name.clone(),
        }
    }
}

/// One inbound chat message, built once per webhook call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundEvent {
    pub chat_id: i64,
    pub chat_kind: ChatKind,
    pub sender_id: i64,
    pub sender: SenderProfile,
    /// `None` for photos, stickers and other non-text content
    pub text: Option<String>,
    pub message_id: i64,
}

impl InboundEvent {
    /// Extract the event from an update. A channel post is attributed to the
    /// chat it was sent as. Updates without a message or without any sender
    /// carry nothing the bot acts on.
    pub fn from_update(update: Update) -> Option<Self> {
        let message = update.message.or(update.channel_post)?;

        let (sender_id, sender) = match (message.from, message.sender_chat) {
            (Some(from), _) => (
                from.id,
                SenderProfile {
                    first_name: from.first_name,
                    last_name: from.last_name,
                    username: from.username,
                },
            ),
            (None, Some(chat)) => (
                chat.id,
                SenderProfile {
                    first_name: chat.title.unwrap_or_default(),
                    last_name: None,
                    username: chat.username,
                },
            ),
            (None, None) => return None,
        };

        Some(Self {
            chat_id: message.chat.id,
            chat_kind: message.chat.kind,
            sender_id,
            sender,
            text: message.text,
            message_id: message.message_id,
        })
    }
}
