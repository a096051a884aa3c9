use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future;
use futures::stream::StreamExt;
use tracing::{debug, info, warn};

use crate::broadcast::{self, BroadcastResult};
use crate::config::Config;
use crate::event::{ChatKind, InboundEvent};
use crate::moderation::{self, enforcer, Disposition, RejectReason};
use crate::platform::{ChatPlatform, TextFormat};
use crate::store::{AuditAction, AuditRecord, AuditTrail, SubscriberRegistry};
use crate::util::{bounded, bounded_stream};

const WELCOME_TEXT: &str =
    "Welcome! I am a moderation bot. Add me to a group as an admin to start filtering links.";

/// Settings the router needs from the configuration file
#[derive(Debug, Clone)]
pub struct RouterSettings {
    pub operator_ids: Vec<i64>,
    pub moderated_kinds: Vec<ChatKind>,
    pub exempt_admins: bool,
    pub warning_text: String,
    pub broadcast_concurrency: usize,
    pub store_timeout: Duration,
}

impl RouterSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            operator_ids: config.telegram.operator_ids.clone(),
            moderated_kinds: config.moderation.moderated_kinds(),
            exempt_admins: config.moderation.exempt_admins,
            warning_text: config.moderation.warning_text.clone(),
            broadcast_concurrency: config.broadcast.concurrency,
            store_timeout: config.timeouts.storage(),
        }
    }

    pub fn is_operator(&self, user_id: i64) -> bool {
        self.operator_ids.contains(&user_id)
    }
}

/// Private-chat commands the bot understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command<'a> {
    Start,
    Broadcast(&'a str),
}

fn parse_command(text: &str) -> Option<Command<'_>> {
    if text == "/start" {
        return Some(Command::Start);
    }
    text.strip_prefix("/broadcast ")
        .map(|body| Command::Broadcast(body.trim()))
}

/// Where an event goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route<'a> {
    Subscribe,
    Broadcast(&'a str),
    Moderate,
    Ignore,
}

/// What handling an event ended up doing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ignored,
    Subscribed,
    Broadcast(BroadcastResult),
    Allowed,
    Exempt,
    Removed(RejectReason),
}

pub struct EventRouter {
    platform: Arc<dyn ChatPlatform>,
    subscribers: Arc<dyn SubscriberRegistry>,
    audit: AuditTrail,
    settings: RouterSettings,
}

impl EventRouter {
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        subscribers: Arc<dyn SubscriberRegistry>,
        audit: AuditTrail,
        settings: RouterSettings,
    ) -> Self {
        Self {
            platform,
            subscribers,
            audit,
            settings,
        }
    }

    fn route<'a>(&self, event: &'a InboundEvent) -> Route<'a> {
        match event.chat_kind {
            ChatKind::Private => match event.text.as_deref().and_then(parse_command) {
                Some(Command::Start) => Route::Subscribe,
                Some(Command::Broadcast(_)) if !self.settings.is_operator(event.sender_id) => {
                    debug!("Ignoring /broadcast from non-operator {}", event.sender_id);
                    Route::Ignore
                }
                Some(Command::Broadcast("")) => Route::Ignore,
                Some(Command::Broadcast(body)) => Route::Broadcast(body),
                None => Route::Ignore,
            },
            kind if self.settings.moderated_kinds.contains(&kind) => Route::Moderate,
            _ => Route::Ignore,
        }
    }

    pub async fn handle(&self, event: &InboundEvent) -> Outcome {
        match self.route(event) {
            Route::Subscribe => {
                self.subscribe(event).await;
                Outcome::Subscribed
            }
            Route::Broadcast(body) => Outcome::Broadcast(self.broadcast(event, body).await),
            Route::Moderate => self.moderate(event).await,
            Route::Ignore => Outcome::Ignored,
        }
    }

    async fn subscribe(&self, event: &InboundEvent) {
        info!("/start from user {}", event.sender_id);

        if let Err(e) = bounded(
            self.settings.store_timeout,
            "subscriber upsert",
            self.subscribers
                .upsert(event.sender_id, &event.sender, Utc::now()),
        )
        .await
        {
            warn!("Failed to record subscriber {}: {:#}", event.sender_id, e);
        }

        if let Err(e) = self
            .platform
            .send_message(event.chat_id, WELCOME_TEXT, TextFormat::Plain)
            .await
        {
            warn!("Failed to welcome user {}: {:#}", event.sender_id, e);
        }
    }

    async fn broadcast(&self, event: &InboundEvent, body: &str) -> BroadcastResult {
        info!("Broadcast requested by operator {}", event.sender_id);

        let result = match bounded(
            self.settings.store_timeout,
            "subscriber listing",
            self.subscribers.subscriber_ids(),
        )
        .await
        {
            Ok(ids) => {
                let ids = bounded_stream(self.settings.store_timeout, "subscriber page", ids);
                let recipients = ids.filter_map(|id| {
                    future::ready(match id {
                        Ok(id) => Some(id),
                        Err(e) => {
                            warn!("Skipping unreadable subscriber page: {:#}", e);
                            None
                        }
                    })
                });
                broadcast::broadcast(
                    self.platform.as_ref(),
                    body,
                    recipients,
                    self.settings.broadcast_concurrency,
                )
                .await
            }
            Err(e) => {
                warn!("Failed to list subscribers: {:#}", e);
                BroadcastResult::default()
            }
        };

        let summary = format!(
            "Broadcast sent to {} of {} users.",
            result.delivered, result.attempted
        );
        if let Err(e) = self
            .platform
            .send_message(event.chat_id, &summary, TextFormat::Plain)
            .await
        {
            warn!("Failed to report broadcast to {}: {:#}", event.sender_id, e);
        }

        self.audit
            .record(AuditRecord {
                chat_id: event.chat_id,
                user_id: event.sender_id,
                username: event.sender.username.clone(),
                action: AuditAction::Broadcast,
                reason: Some(format!(
                    "delivered {} of {}",
                    result.delivered, result.attempted
                )),
                timestamp: Utc::now(),
            })
            .await;

        result
    }

    async fn moderate(&self, event: &InboundEvent) -> Outcome {
        if self.settings.exempt_admins && self.is_exempt(event).await {
            debug!(
                "User {} is an admin of chat {}, skipping moderation",
                event.sender_id, event.chat_id
            );
            return Outcome::Exempt;
        }

        match moderation::decide(self.platform.as_ref(), event).await {
            Disposition::Allow => Outcome::Allowed,
            Disposition::Reject(reason) => {
                enforcer::enforce(
                    self.platform.as_ref(),
                    &self.audit,
                    event,
                    reason,
                    &self.settings.warning_text,
                )
                .await;
                Outcome::Removed(reason)
            }
        }
    }

    /// A failed status lookup counts as "not exempt".
    async fn is_exempt(&self, event: &InboundEvent) -> bool {
        match self
            .platform
            .member_status(event.chat_id, event.sender_id)
            .await
        {
            Ok(status) => status.is_privileged(),
            Err(e) => {
                warn!(
                    "Member status lookup for {} in chat {} failed: {:#}",
                    event.sender_id, event.chat_id, e
                );
                false
            }
        }
    }
}
