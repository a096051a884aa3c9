use tracing::{debug, warn};

use crate::event::ChatKind;
use crate::platform::ChatPlatform;

/// What the platform knows about a linked username.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteChatInfo {
    pub exists: bool,
    pub kind: ChatKind,
}

impl RemoteChatInfo {
    pub const UNRESOLVED: Self = Self {
        exists: false,
        kind: ChatKind::Unknown,
    };
}

/// Resolve `@username` with a single `getChat` call. Any failure reads as
/// "does not exist".
pub async fn resolve(platform: &dyn ChatPlatform, username: &str) -> RemoteChatInfo {
    let identifier = format!("@{}", username);

    match platform.get_chat(&identifier).await {
        Ok(response) => match response.result {
            Some(chat) if response.ok => {
                debug!("Resolved {} as {:?}", identifier, chat.kind);
                RemoteChatInfo {
                    exists: true,
                    kind: chat.kind,
                }
            }
            _ => {
                debug!("{} not found", identifier);
                RemoteChatInfo::UNRESOLVED
            }
        },
        Err(e) => {
            warn!("Lookup of {} failed: {:#}", identifier, e);
            RemoteChatInfo::UNRESOLVED
        }
    }
}
