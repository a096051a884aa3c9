use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::{self, BoxStream, StreamExt};
use rusqlite::Connection;

use super::{format_timestamp, parse_timestamp, SqliteStore, Subscriber, SubscriberRegistry};
use crate::event::SenderProfile;

/// Ids fetched per query while streaming a broadcast snapshot
const ID_PAGE_SIZE: i64 = 500;

#[async_trait]
impl SubscriberRegistry for SqliteStore {
    async fn upsert(
        &self,
        user_id: i64,
        profile: &SenderProfile,
        started_at: DateTime<Utc>,
    ) -> Result<()> {
        let now = format_timestamp(started_at);
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO subscribers (id, first_name, last_name, username, started_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(id) DO UPDATE SET
                first_name = excluded.first_name,
                last_name = excluded.last_name,
                username = excluded.username,
                updated_at = excluded.updated_at",
            rusqlite::params![
                user_id,
                &profile.first_name,
                &profile.last_name,
                &profile.username,
                &now,
            ],
        )
        .with_context(|| format!("Failed to upsert subscriber {}", user_id))?;
        Ok(())
    }

    async fn subscriber_ids(&self) -> Result<BoxStream<'static, Result<i64>>> {
        // Subscribers added after this point are not part of the snapshot.
        let ceiling: i64 = {
            let conn = self.conn.lock().await;
            conn.query_row("SELECT COALESCE(MAX(seq), 0) FROM subscribers", [], |row| {
                row.get(0)
            })
            .context("Failed to read subscriber snapshot bound")?
        };

        let store = self.clone();
        let pages = stream::unfold(Some(0i64), move |cursor| {
            let store = store.clone();
            async move {
                let after = cursor?;
                match store.id_page(after, ceiling).await {
                    Ok(page) if page.is_empty() => None,
                    Ok(page) => {
                        let next = page.last().map(|(seq, _)| *seq);
                        let ids: Vec<Result<i64>> =
                            page.into_iter().map(|(_, id)| Ok(id)).collect();
                        Some((stream::iter(ids), next))
                    }
                    Err(e) => Some((stream::iter(vec![Err(e)]), None)),
                }
            }
        });

        Ok(pages.flatten().boxed())
    }
}

impl SqliteStore {
    async fn id_page(&self, after_seq: i64, ceiling: i64) -> Result<Vec<(i64, i64)>> {
        let conn = self.conn.lock().await;
        query_id_page(&conn, after_seq, ceiling)
    }

    /// Look up a single subscriber
    #[allow(dead_code)]
    pub async fn subscriber(&self, user_id: i64) -> Result<Option<Subscriber>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT id, first_name, last_name, username, started_at
                 FROM subscribers WHERE id = ?1",
            )
            .context("Failed to prepare subscriber query")?;
        let mut rows = stmt
            .query_map(rusqlite::params![user_id], |row| {
                Ok(Subscriber {
                    id: row.get(0)?,
                    first_name: row.get(1)?,
                    last_name: row.get(2)?,
                    username: row.get(3)?,
                    started_at: parse_timestamp(4, row.get(4)?)?,
                })
            })
            .context("Failed to query subscriber")?;
        match rows.next() {
            Some(Ok(subscriber)) => Ok(Some(subscriber)),
            Some(Err(e)) => Err(e).context("Failed to read subscriber"),
            None => Ok(None),
        }
    }

    pub async fn count_subscribers(&self) -> Result<i64> {
        let conn = self.conn.lock().await;
        conn.query_row("SELECT COUNT(*) FROM subscribers", [], |row| row.get(0))
            .context("Failed to count subscribers")
    }
}

// Takes &Connection directly (caller already holds the lock).
fn query_id_page(conn: &Connection, after_seq: i64, ceiling: i64) -> Result<Vec<(i64, i64)>> {
    let mut stmt = conn
        .prepare_cached(
            "SELECT seq, id FROM subscribers
             WHERE seq > ?1 AND seq <= ?2
             ORDER BY seq ASC
             LIMIT ?3",
        )
        .context("Failed to prepare id page query")?;
    let page = stmt
        .query_map(rusqlite::params![after_seq, ceiling, ID_PAGE_SIZE], |row| {
            Ok((row.get(0)?, row.get(1)?))
        })
        .context("Failed to map id rows")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("Failed to collect id rows")?;
    Ok(page)
}
