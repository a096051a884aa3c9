pub mod enforcer;
pub mod validator;
pub mod verifier;

use std::fmt;

use tracing::debug;

use crate::event::InboundEvent;
use crate::platform::ChatPlatform;
use validator::LinkVerdict;

/// Why a group message was removed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    NonTextContent,
    MultiLine,
    InvalidLinkFormat,
    UnverifiableOrPersonalLink,
}

impl RejectReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectReason::NonTextContent => "non_text_content",
            RejectReason::MultiLine => "multi_line",
            RejectReason::InvalidLinkFormat => "invalid_link_format",
            RejectReason::UnverifiableOrPersonalLink => "unverifiable_or_personal_link",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final decision for one group message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Allow,
    Reject(RejectReason),
}

/// Run the validator and, for bare usernames, the remote lookup.
/// An unresolvable or personal target is rejected.
pub async fn decide(platform: &dyn ChatPlatform, event: &InboundEvent) -> Disposition {
    match validator::validate(event.text.as_deref()) {
        LinkVerdict::Allow => Disposition::Allow,
        LinkVerdict::Reject(reason) => Disposition::Reject(reason),
        LinkVerdict::NeedsRemoteCheck(username) => {
            let info = verifier::resolve(platform, &username).await;
            if info.exists && info.kind.is_public_target() {
                Disposition::Allow
            } else {
                debug!(
                    "Link to @{} in chat {} points at {:?}",
                    username, event.chat_id, info.kind
                );
                Disposition::Reject(RejectReason::UnverifiableOrPersonalLink)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ChatKind;
    use crate::testing::{group_event, MockPlatform};

    #[tokio::test]
    async fn test_invite_link_allowed_without_lookup() {
        let platform = MockPlatform::new();
        for text in ["https://t.me/+AbCdEfGh123", "t.me/joinchat/abc123"] {
            let event = group_event(Some(text));
            assert_eq!(decide(&platform, &event).await, Disposition::Allow);
        }
        assert!(platform.lookups().is_empty());
    }

    #[tokio::test]
    async fn test_public_targets_allowed() {
        for kind in [ChatKind::Group, ChatKind::Supergroup, ChatKind::Channel] {
            let platform = MockPlatform::new().with_chat("@somegroup", kind);
            let event = group_event(Some("t.me/somegroup"));
            assert_eq!(decide(&platform, &event).await, Disposition::Allow);
            assert_eq!(platform.lookups().len(), 1);
        }
    }

    #[tokio::test]
    async fn test_private_target_rejected() {
        let platform = MockPlatform::new().with_chat("@johndoe", ChatKind::Private);
        let event = group_event(Some("t.me/johndoe"));
        assert_eq!(
            decide(&platform, &event).await,
            Disposition::Reject(RejectReason::UnverifiableOrPersonalLink)
        );
        assert_eq!(platform.lookups(), vec!["@johndoe".to_string()]);
    }

    #[tokio::test]
    async fn test_failed_lookup_rejected() {
        let platform = MockPlatform::new();
        let event = group_event(Some("https://t.me/somegroup"));
        assert_eq!(
            decide(&platform, &event).await,
            Disposition::Reject(RejectReason::UnverifiableOrPersonalLink)
        );
    }

    #[tokio::test]
    async fn test_unknown_kind_rejected() {
        let platform = MockPlatform::new().with_chat("@oddchat", ChatKind::Unknown);
        let event = group_event(Some("t.me/oddchat"));
        assert_eq!(
            decide(&platform, &event).await,
            Disposition::Reject(RejectReason::UnverifiableOrPersonalLink)
        );
    }

    #[tokio::test]
    async fn test_multi_line_skips_lookup() {
        let platform = MockPlatform::new().with_chat("@mygroup", ChatKind::Group);
        let event = group_event(Some("check this out\nt.me/mygroup"));
        assert_eq!(
            decide(&platform, &event).await,
            Disposition::Reject(RejectReason::MultiLine)
        );
        assert!(platform.lookups().is_empty());
    }

    #[tokio::test]
    async fn test_non_text_rejected() {
        let platform = MockPlatform::new();
        assert_eq!(
            decide(&platform, &group_event(None)).await,
            Disposition::Reject(RejectReason::NonTextContent)
        );
    }
}
