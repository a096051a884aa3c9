use std::sync::LazyLock;

use regex::Regex;

use super::RejectReason;

/// Whole-message Telegram link: optional scheme, `t.me/` or `telegram.me/`,
/// then either an invite token or a bare username. Case folding is ASCII-only
/// so lookalike letters such as the Kelvin sign never match.
static LINK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i-u)^(?:https?://)?(?:t\.me|telegram\.me)/(?:(?:\+|joinchat/)(?P<invite>[a-z0-9_-]+)|(?P<username>[a-z0-9_]{5,}))$",
    )
    .expect("link pattern is valid")
});

/// Local classification of a message, before any network call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkVerdict {
    Allow,
    Reject(RejectReason),
    /// Syntactically fine, but the username could belong to a person.
    NeedsRemoteCheck(String),
}

pub fn validate(text: Option<&str>) -> LinkVerdict {
    let Some(text) = text else {
        return LinkVerdict::Reject(RejectReason::NonTextContent);
    };

    let mut lines = text.lines().map(str::trim).filter(|line| !line.is_empty());
    let line = lines.next().unwrap_or_default();
    if lines.next().is_some() {
        return LinkVerdict::Reject(RejectReason::MultiLine);
    }

    let Some(captures) = LINK_PATTERN.captures(line) else {
        return LinkVerdict::Reject(RejectReason::InvalidLinkFormat);
    };

    match captures.name("username") {
        Some(username) => LinkVerdict::NeedsRemoteCheck(username.as_str().to_string()),
        None => LinkVerdict::Allow,
    }
}
