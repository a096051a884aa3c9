pub mod audit;
pub mod subscribers;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::event::SenderProfile;

/// A user who has started a private conversation with the bot
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(dead_code)]
pub struct Subscriber {
    pub id: i64,
    pub first_name: String,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    Deleted,
    #[allow(dead_code)]
    Warning,
    Broadcast,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::Deleted => "DELETED",
            AuditAction::Warning => "WARNING",
            AuditAction::Broadcast => "BROADCAST",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "DELETED" => Some(AuditAction::Deleted),
            "WARNING" => Some(AuditAction::Warning),
            "BROADCAST" => Some(AuditAction::Broadcast),
            _ => None,
        }
    }
}

/// One enforcement action or broadcast, never modified once written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    pub chat_id: i64,
    pub user_id: i64,
    pub username: Option<String>,
    pub action: AuditAction,
    pub reason: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit storage error: {0}")]
    Storage(#[from] rusqlite::Error),
    #[error("audit log is not configured")]
    Unavailable,
    #[error("audit append timed out after {0:?}")]
    TimedOut(Duration),
}

/// Subscriber persistence needed by `/start` and `/broadcast`.
#[async_trait]
pub trait SubscriberRegistry: Send + Sync {
    /// Insert or refresh a subscriber. The first `started_at` is kept.
    async fn upsert(
        &self,
        user_id: i64,
        profile: &SenderProfile,
        started_at: DateTime<Utc>,
    ) -> Result<()>;

    /// Stream every subscriber id present when this is called.
    async fn subscriber_ids(&self) -> Result<BoxStream<'static, Result<i64>>>;
}

#[async_trait]
pub trait AuditLog: Send + Sync {
    async fn append(&self, record: &AuditRecord) -> Result<(), AuditError>;
}

/// Best-effort writer in front of an [`AuditLog`]. `record` cannot fail;
/// problems are logged and dropped.
#[derive(Clone)]
pub struct AuditTrail {
    log: Arc<dyn AuditLog>,
    timeout: Duration,
}

impl AuditTrail {
    pub fn new(log: Arc<dyn AuditLog>, timeout: Duration) -> Self {
        Self { log, timeout }
    }

    pub async fn record(&self, record: AuditRecord) {
        let outcome = match tokio::time::timeout(self.timeout, self.log.append(&record)).await {
            Ok(result) => result,
            Err(_) => Err(AuditError::TimedOut(self.timeout)),
        };

        match outcome {
            Ok(()) => debug!(
                "Audit {} recorded for user {} in chat {}",
                record.action.as_str(),
                record.user_id,
                record.chat_id
            ),
            Err(e) => warn!(
                "Dropping audit {} for user {} in chat {}: {}",
                record.action.as_str(),
                record.user_id,
                record.chat_id,
                e
            ),
        }
    }
}

/// Stand-in used when no `[storage]` section is configured.
pub struct DisabledStore;

#[async_trait]
impl SubscriberRegistry for DisabledStore {
    async fn upsert(
        &self,
        user_id: i64,
        _profile: &SenderProfile,
        _started_at: DateTime<Utc>,
    ) -> Result<()> {
        debug!("Storage disabled, not recording subscriber {}", user_id);
        Ok(())
    }

    async fn subscriber_ids(&self) -> Result<BoxStream<'static, Result<i64>>> {
        Ok(stream::empty().boxed())
    }
}

#[async_trait]
impl AuditLog for DisabledStore {
    async fn append(&self, _record: &AuditRecord) -> Result<(), AuditError> {
        Err(AuditError::Unavailable)
    }
}

/// SQLite-backed subscriber registry and audit log
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        // journal_mode PRAGMA returns the resulting mode, so use query_row
        let _: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;

        Self::run_migrations(&conn)?;

        info!("Store initialized at: {}", path.display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::run_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn run_migrations(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            -- seq fixes enumeration order and bounds broadcast snapshots
            CREATE TABLE IF NOT EXISTS subscribers (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id INTEGER NOT NULL UNIQUE,
                first_name TEXT NOT NULL,
                last_name TEXT,
                username TEXT,
                started_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS audit_log (
                id TEXT PRIMARY KEY,
                chat_id INTEGER NOT NULL,
                user_id INTEGER NOT NULL,
                username TEXT,
                action TEXT NOT NULL,
                reason TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_audit_log_created
                ON audit_log(created_at);
            ",
        )
        .context("Failed to run migrations")?;
        Ok(())
    }
}

/// Fixed-width RFC 3339 so stored timestamps sort as text.
pub(crate) fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse an RFC 3339 column written by this store.
pub(crate) fn parse_timestamp(idx: usize, value: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}
