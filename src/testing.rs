//! Test doubles for the platform and the stores.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future;
use futures::stream::{self, BoxStream, StreamExt};

use crate::event::{ChatKind, InboundEvent, SenderProfile};
use crate::platform::{ChatPlatform, ChatSummary, GetChatResponse, MemberStatus, TextFormat};
use crate::store::{AuditError, AuditLog, AuditRecord, SubscriberRegistry};

pub fn group_event(text: Option<&str>) -> InboundEvent {
    InboundEvent {
        chat_id: -100200,
        chat_kind: ChatKind::Group,
        sender_id: 42,
        sender: SenderProfile {
            first_name: "Ann".to_string(),
            last_name: None,
            username: Some("ann_k".to_string()),
        },
        text: text.map(str::to_string),
        message_id: 314,
    }
}

pub fn private_event(user_id: i64, text: Option<&str>) -> InboundEvent {
    InboundEvent {
        chat_id: user_id,
        chat_kind: ChatKind::Private,
        sender_id: user_id,
        sender: SenderProfile {
            first_name: format!("User{}", user_id),
            last_name: None,
            username: None,
        },
        text: text.map(str::to_string),
        message_id: 1,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Send {
        chat_id: i64,
        text: String,
        format: TextFormat,
    },
    Delete {
        chat_id: i64,
        message_id: i64,
    },
    GetChat {
        identifier: String,
    },
    MemberStatus {
        chat_id: i64,
        user_id: i64,
    },
}

impl Call {
    pub fn send_target(&self) -> Option<i64> {
        match self {
            Call::Send { chat_id, .. } => Some(*chat_id),
            _ => None,
        }
    }
}

/// Records every call. Lookups without a scripted answer fail like a
/// network error would.
#[derive(Default)]
pub struct MockPlatform {
    calls: Mutex<Vec<Call>>,
    /// `None` answers "chat not found"
    chats: HashMap<String, Option<ChatKind>>,
    failing_sends: HashSet<i64>,
    fail_deletes: bool,
    member_status: Option<MemberStatus>,
    send_delay: Option<Duration>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_chat(mut self, identifier: &str, kind: ChatKind) -> Self {
        self.chats.insert(identifier.to_string(), Some(kind));
        self
    }

    pub fn with_missing_chat(mut self, identifier: &str) -> Self {
        self.chats.insert(identifier.to_string(), None);
        self
    }

    pub fn failing_sends_to(mut self, chat_id: i64) -> Self {
        self.failing_sends.insert(chat_id);
        self
    }

    pub fn failing_deletes(mut self) -> Self {
        self.fail_deletes = true;
        self
    }

    pub fn with_member_status(mut self, status: MemberStatus) -> Self {
        self.member_status = Some(status);
        self
    }

    pub fn with_send_delay(mut self, delay: Duration) -> Self {
        self.send_delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn lookups(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::GetChat { identifier } => Some(identifier),
                _ => None,
            })
            .collect()
    }

    /// Texts sent (or attempted) to `chat_id`, in order
    pub fn sent_to(&self, chat_id: i64) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Send {
                    chat_id: target,
                    text,
                    ..
                } if target == chat_id => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    fn push(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl ChatPlatform for MockPlatform {
    async fn send_message(&self, chat_id: i64, text: &str, format: TextFormat) -> Result<()> {
        self.push(Call::Send {
            chat_id,
            text: text.to_string(),
            format,
        });

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.send_delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing_sends.contains(&chat_id) {
            anyhow::bail!("Forbidden: bot was blocked by the user");
        }
        Ok(())
    }

    async fn delete_message(&self, chat_id: i64, message_id: i64) -> Result<()> {
        self.push(Call::Delete {
            chat_id,
            message_id,
        });
        if self.fail_deletes {
            anyhow::bail!("Bad Request: message to delete not found");
        }
        Ok(())
    }

    async fn get_chat(&self, identifier: &str) -> Result<GetChatResponse> {
        self.push(Call::GetChat {
            identifier: identifier.to_string(),
        });
        match self.chats.get(identifier) {
            Some(Some(kind)) => Ok(GetChatResponse {
                ok: true,
                result: Some(ChatSummary { kind: *kind }),
            }),
            Some(None) => Ok(GetChatResponse {
                ok: false,
                result: None,
            }),
            None => anyhow::bail!("connection reset"),
        }
    }

    async fn member_status(&self, chat_id: i64, user_id: i64) -> Result<MemberStatus> {
        self.push(Call::MemberStatus { chat_id, user_id });
        match self.member_status {
            Some(status) => Ok(status),
            None => anyhow::bail!("connection reset"),
        }
    }
}

/// In-memory registry that counts reads and writes
#[derive(Default)]
pub struct MemoryRegistry {
    subscribers: Mutex<Vec<(i64, DateTime<Utc>)>>,
    reads: AtomicUsize,
    upserts: AtomicUsize,
}

impl MemoryRegistry {
    pub fn insert_all(&self, ids: impl IntoIterator<Item = i64>) {
        let mut subscribers = self.subscribers.lock().unwrap();
        subscribers.extend(ids.into_iter().map(|id| (id, Utc::now())));
    }

    pub fn ids(&self) -> Vec<i64> {
        self.subscribers
            .lock()
            .unwrap()
            .iter()
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn upserts(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SubscriberRegistry for MemoryRegistry {
    async fn upsert(
        &self,
        user_id: i64,
        _profile: &SenderProfile,
        started_at: DateTime<Utc>,
    ) -> Result<()> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        let mut subscribers = self.subscribers.lock().unwrap();
        if !subscribers.iter().any(|(id, _)| *id == user_id) {
            subscribers.push((user_id, started_at));
        }
        Ok(())
    }

    async fn subscriber_ids(&self) -> Result<BoxStream<'static, Result<i64>>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let ids: Vec<Result<i64>> = self.ids().into_iter().map(Ok).collect();
        Ok(stream::iter(ids).boxed())
    }
}

pub struct FailingAuditLog;

#[async_trait]
impl AuditLog for FailingAuditLog {
    async fn append(&self, _record: &AuditRecord) -> Result<(), AuditError> {
        Err(AuditError::Storage(rusqlite::Error::QueryReturnedNoRows))
    }
}

/// Where a [`StallingRegistry`] stops answering
#[derive(Debug, Clone)]
pub enum Stall {
    /// `subscriber_ids` never returns
    Listing,
    /// The id stream yields these ids, then never yields again
    AfterIds(Vec<i64>),
}

/// Registry whose writes never complete and whose reads stall as scripted
pub struct StallingRegistry(pub Stall);

#[async_trait]
impl SubscriberRegistry for StallingRegistry {
    async fn upsert(
        &self,
        _user_id: i64,
        _profile: &SenderProfile,
        _started_at: DateTime<Utc>,
    ) -> Result<()> {
        future::pending().await
    }

    async fn subscriber_ids(&self) -> Result<BoxStream<'static, Result<i64>>> {
        match &self.0 {
            Stall::Listing => future::pending().await,
            Stall::AfterIds(ids) => {
                let ids: Vec<Result<i64>> = ids.iter().copied().map(Ok).collect();
                Ok(stream::iter(ids).chain(stream::pending()).boxed())
            }
        }
    }
}
