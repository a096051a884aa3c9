use anyhow::{Context, Result};
use async_trait::async_trait;
use uuid::Uuid;

use super::{format_timestamp, parse_timestamp, AuditAction, AuditError, AuditLog, AuditRecord, SqliteStore};

#[async_trait]
impl AuditLog for SqliteStore {
    async fn append(&self, record: &AuditRecord) -> Result<(), AuditError> {
        let id = Uuid::new_v4().to_string();
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO audit_log (id, chat_id, user_id, username, action, reason, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                &id,
                record.chat_id,
                record.user_id,
                &record.username,
                record.action.as_str(),
                &record.reason,
                format_timestamp(record.timestamp),
            ],
        )?;
        Ok(())
    }
}

impl SqliteStore {
    /// Most recent audit records, newest first
    #[allow(dead_code)]
    pub async fn recent_audit(&self, limit: usize) -> Result<Vec<AuditRecord>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT chat_id, user_id, username, action, reason, created_at
                 FROM audit_log
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?1",
            )
            .context("Failed to prepare audit query")?;
        let records = stmt
            .query_map(rusqlite::params![limit as i64], |row| {
                let action: String = row.get(3)?;
                let action = AuditAction::parse(&action).ok_or_else(|| {
                    rusqlite::Error::InvalidColumnType(
                        3,
                        format!("unknown audit action {}", action),
                        rusqlite::types::Type::Text,
                    )
                })?;
                Ok(AuditRecord {
                    chat_id: row.get(0)?,
                    user_id: row.get(1)?,
                    username: row.get(2)?,
                    action,
                    reason: row.get(4)?,
                    timestamp: parse_timestamp(5, row.get(5)?)?,
                })
            })
            .context("Failed to map audit rows")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to load audit records")?;
        Ok(records)
    }
}
