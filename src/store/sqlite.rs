use crate::errors::VeribotResult;
use crate::model::{User, VerificationRecord, VerificationStatus};
use crate::store::{MessageRecord, MessageStore, UserStore};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

fn open(db_path: &Path) -> Result<Connection> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).with_context(|| {
            format!(
                "failed to create database parent directory: {}",
                parent.display()
            )
        })?;
    }
    let conn = Connection::open(db_path)
        .with_context(|| format!("failed to open database at: {}", db_path.display()))?;
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA synchronous=NORMAL;
         PRAGMA busy_timeout=3000;
         PRAGMA foreign_keys=ON;",
    )?;
    Ok(conn)
}

fn micros(at: DateTime<Utc>) -> i64 {
    at.timestamp_micros()
}

fn from_micros(us: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(us).unwrap_or_else(Utc::now)
}

pub struct SqliteUserStore {
    conn: Mutex<Connection>,
}

impl SqliteUserStore {
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = open(db_path.as_ref())?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS users (
                channel_id TEXT PRIMARY KEY,
                body TEXT NOT NULL,
                updated_us INTEGER NOT NULL
            )",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

#[async_trait]
impl UserStore for SqliteUserStore {
    async fn get(&self, channel_id: &str) -> VeribotResult<Option<User>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow!("user db lock poisoned: {e}"))?;
        let body: Option<String> = conn
            .query_row(
                "SELECT body FROM users WHERE channel_id = ?1",
                params![channel_id],
                |row| row.get(0),
            )
            .optional()
            .context("user lookup failed")?;
        match body {
            Some(body) => {
                let user = serde_json::from_str(&body).context("stored user is unreadable")?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }

    async fn upsert(&self, user: &User) -> VeribotResult<()> {
        let body = serde_json::to_string(user).context("user serialization failed")?;
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow!("user db lock poisoned: {e}"))?;
        conn.execute(
            "INSERT INTO users (channel_id, body, updated_us) VALUES (?1, ?2, ?3)
             ON CONFLICT(channel_id) DO UPDATE SET body = ?2, updated_us = ?3",
            params![user.channel_id, body, micros(Utc::now())],
        )
        .context("user upsert failed")?;
        Ok(())
    }
}

pub struct SqliteMessageStore {
    conn: Mutex<Connection>,
}

impl SqliteMessageStore {
    pub fn new(db_path: impl AsRef<Path>) -> Result<Self> {
        let conn = open(db_path.as_ref())?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                envelope TEXT NOT NULL,
                v_status TEXT,
                v_original TEXT,
                v_answer TEXT,
                v_resolver TEXT,
                v_created_us INTEGER,
                v_waiting_us INTEGER,
                v_resolved_us INTEGER,
                v_reminded_us INTEGER,
                stored_us INTEGER NOT NULL
            )",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_messages_v_status ON messages (v_status)",
            [],
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, RawRow)> {
        Ok((
            row.get(0)?,
            RawRow {
                envelope: row.get(1)?,
                v_status: row.get(2)?,
                v_original: row.get(3)?,
                v_answer: row.get(4)?,
                v_resolver: row.get(5)?,
                v_created_us: row.get(6)?,
                v_waiting_us: row.get(7)?,
                v_resolved_us: row.get(8)?,
                v_reminded_us: row.get(9)?,
                stored_us: row.get(10)?,
            },
        ))
    }
}

struct RawRow {
    envelope: String,
    v_status: Option<String>,
    v_original: Option<String>,
    v_answer: Option<String>,
    v_resolver: Option<String>,
    v_created_us: Option<i64>,
    v_waiting_us: Option<i64>,
    v_resolved_us: Option<i64>,
    v_reminded_us: Option<i64>,
    stored_us: i64,
}

impl RawRow {
    fn into_record(self, id: &str) -> Result<MessageRecord> {
        let envelope = serde_json::from_str(&self.envelope)
            .with_context(|| format!("stored envelope {id} is unreadable"))?;
        let verification = match self.v_status {
            Some(status) => {
                let status = VerificationStatus::parse(&status)
                    .with_context(|| format!("unknown verification status '{status}'"))?;
                Some(VerificationRecord {
                    expert_message_id: id.to_string(),
                    original_question_id: self.v_original.unwrap_or_default(),
                    answer_text: self.v_answer.unwrap_or_default(),
                    status,
                    resolved_by: self.v_resolver,
                    created_at: self.v_created_us.map(from_micros).unwrap_or_else(Utc::now),
                    waiting_at: self.v_waiting_us.map(from_micros),
                    resolved_at: self.v_resolved_us.map(from_micros),
                    last_reminded_at: self.v_reminded_us.map(from_micros),
                })
            }
            None => None,
        };
        Ok(MessageRecord {
            envelope,
            verification,
            stored_at: from_micros(self.stored_us),
        })
    }
}

#[async_trait]
impl MessageStore for SqliteMessageStore {
    async fn insert(&self, record: &MessageRecord) -> VeribotResult<()> {
        let envelope =
            serde_json::to_string(&record.envelope).context("envelope serialization failed")?;
        let v = record.verification.as_ref();
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow!("message db lock poisoned: {e}"))?;
        conn.execute(
            "INSERT OR REPLACE INTO messages
                (id, envelope, v_status, v_original, v_answer, v_resolver,
                 v_created_us, v_waiting_us, v_resolved_us, v_reminded_us, stored_us)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                record.envelope.message_id,
                envelope,
                v.map(|v| v.status.as_str()),
                v.map(|v| v.original_question_id.as_str()),
                v.map(|v| v.answer_text.as_str()),
                v.and_then(|v| v.resolved_by.as_deref()),
                v.map(|v| micros(v.created_at)),
                v.and_then(|v| v.waiting_at.map(micros)),
                v.and_then(|v| v.resolved_at.map(micros)),
                v.and_then(|v| v.last_reminded_at.map(micros)),
                micros(record.stored_at),
            ],
        )
        .context("message insert failed")?;
        Ok(())
    }

    async fn get(&self, message_id: &str) -> VeribotResult<Option<MessageRecord>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow!("message db lock poisoned: {e}"))?;
        let row = conn
            .query_row(
                "SELECT id, envelope, v_status, v_original, v_answer, v_resolver,
                        v_created_us, v_waiting_us, v_resolved_us, v_reminded_us, stored_us
                 FROM messages WHERE id = ?1",
                params![message_id],
                Self::row_to_record,
            )
            .optional()
            .context("message lookup failed")?;
        match row {
            Some((id, raw)) => Ok(Some(raw.into_record(&id)?)),
            None => Ok(None),
        }
    }

    async fn remap(&self, old_id: &str, new_id: &str) -> VeribotResult<bool> {
        let mut conn = self
            .conn
            .lock()
            .map_err(|e| anyhow!("message db lock poisoned: {e}"))?;
        let tx = conn.transaction().context("remap transaction failed")?;

        let envelope: Option<String> = tx
            .query_row(
                "SELECT envelope FROM messages WHERE id = ?1",
                params![old_id],
                |row| row.get(0),
            )
            .optional()
            .context("remap lookup failed")?;
        let Some(envelope) = envelope else {
            return Ok(false);
        };

        // The envelope body carries its own id; keep it consistent with the key.
        let mut value: serde_json::Value =
            serde_json::from_str(&envelope).context("stored envelope is unreadable")?;
        value["message_id"] = serde_json::Value::String(new_id.to_string());
        let envelope = serde_json::to_string(&value).context("envelope serialization failed")?;

        tx.execute(
            "UPDATE messages SET id = ?1, envelope = ?2 WHERE id = ?3",
            params![new_id, envelope, old_id],
        )
        .context("remap update failed")?;
        tx.commit().context("remap commit failed")?;
        debug!("remapped message {} -> {}", old_id, new_id);
        Ok(true)
    }

    async fn transition_verification(
        &self,
        expert_message_id: &str,
        expected: VerificationStatus,
        next: VerificationStatus,
        answer: Option<&str>,
        resolver: &str,
    ) -> VeribotResult<bool> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow!("message db lock poisoned: {e}"))?;
        // Single conditional UPDATE; the status guard makes the transition a
        // compare-and-swap, so exactly one racing caller wins.
        let changed = conn
            .execute(
                "UPDATE messages
                 SET v_status = ?1,
                     v_resolved_us = ?2,
                     v_answer = COALESCE(?3, v_answer),
                     v_resolver = ?4
                 WHERE id = ?5 AND v_status = ?6",
                params![
                    next.as_str(),
                    micros(Utc::now()),
                    answer,
                    resolver,
                    expert_message_id,
                    expected.as_str(),
                ],
            )
            .context("verification transition failed")?;
        Ok(changed == 1)
    }

    async fn due_for_reminder(
        &self,
        older_than: DateTime<Utc>,
    ) -> VeribotResult<Vec<MessageRecord>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow!("message db lock poisoned: {e}"))?;
        let mut stmt = conn
            .prepare(
                "SELECT id, envelope, v_status, v_original, v_answer, v_resolver,
                        v_created_us, v_waiting_us, v_resolved_us, v_reminded_us, stored_us
                 FROM messages
                 WHERE v_status = 'waiting'
                   AND max(coalesce(v_waiting_us, v_created_us, 0),
                           coalesce(v_reminded_us, 0)) < ?1
                 ORDER BY stored_us",
            )
            .context("reminder query failed")?;
        let rows = stmt
            .query_map(params![micros(older_than)], Self::row_to_record)
            .context("reminder query failed")?;

        let mut due = Vec::new();
        for row in rows {
            let (id, raw) = row.context("reminder row failed")?;
            due.push(raw.into_record(&id)?);
        }
        Ok(due)
    }

    async fn mark_reminded(
        &self,
        expert_message_id: &str,
        at: DateTime<Utc>,
    ) -> VeribotResult<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow!("message db lock poisoned: {e}"))?;
        conn.execute(
            "UPDATE messages SET v_reminded_us = ?1 WHERE id = ?2",
            params![micros(at), expert_message_id],
        )
        .context("mark_reminded failed")?;
        Ok(())
    }
}
