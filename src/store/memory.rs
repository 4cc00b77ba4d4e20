use crate::errors::VeribotResult;
use crate::model::{User, VerificationStatus};
use crate::store::{MessageRecord, MessageStore, UserStore};
use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Default)]
pub struct InMemoryUserStore {
    users: Mutex<HashMap<String, User>>,
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn get(&self, channel_id: &str) -> VeribotResult<Option<User>> {
        let users = self.users.lock().map_err(|e| anyhow!("user store lock poisoned: {e}"))?;
        Ok(users.get(channel_id).cloned())
    }

    async fn upsert(&self, user: &User) -> VeribotResult<()> {
        let mut users = self.users.lock().map_err(|e| anyhow!("user store lock poisoned: {e}"))?;
        users.insert(user.channel_id.clone(), user.clone());
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryMessageStore {
    records: Mutex<HashMap<String, MessageRecord>>,
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn insert(&self, record: &MessageRecord) -> VeribotResult<()> {
        let mut records = self
            .records
            .lock()
            .map_err(|e| anyhow!("message store lock poisoned: {e}"))?;
        records.insert(record.envelope.message_id.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, message_id: &str) -> VeribotResult<Option<MessageRecord>> {
        let records = self
            .records
            .lock()
            .map_err(|e| anyhow!("message store lock poisoned: {e}"))?;
        Ok(records.get(message_id).cloned())
    }

    async fn remap(&self, old_id: &str, new_id: &str) -> VeribotResult<bool> {
        let mut records = self
            .records
            .lock()
            .map_err(|e| anyhow!("message store lock poisoned: {e}"))?;
        let Some(mut record) = records.remove(old_id) else {
            return Ok(false);
        };
        record.envelope.message_id = new_id.to_string();
        if let Some(verification) = record.verification.as_mut() {
            verification.expert_message_id = new_id.to_string();
        }
        records.insert(new_id.to_string(), record);
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
        let mut records = self
            .records
            .lock()
            .map_err(|e| anyhow!("message store lock poisoned: {e}"))?;
        let Some(record) = records.get_mut(expert_message_id) else {
            return Ok(false);
        };
        let Some(verification) = record.verification.as_mut() else {
            return Ok(false);
        };
        if verification.status != expected {
            return Ok(false);
        }
        verification.status = next;
        verification.resolved_by = Some(resolver.to_string());
        verification.resolved_at = Some(Utc::now());
        if let Some(answer) = answer {
            verification.answer_text = answer.to_string();
        }
        Ok(true)
    }

    async fn due_for_reminder(
        &self,
        older_than: DateTime<Utc>,
    ) -> VeribotResult<Vec<MessageRecord>> {
        let records = self
            .records
            .lock()
            .map_err(|e| anyhow!("message store lock poisoned: {e}"))?;
        let mut due: Vec<MessageRecord> = records
            .values()
            .filter(|r| {
                let Some(v) = r.verification.as_ref() else {
                    return false;
                };
                if v.status != VerificationStatus::Waiting {
                    return false;
                }
                let last_activity = match (v.waiting_at, v.last_reminded_at) {
                    (Some(w), Some(r)) => w.max(r),
                    (Some(w), None) => w,
                    (None, Some(r)) => r,
                    (None, None) => v.created_at,
                };
                last_activity < older_than
            })
            .cloned()
            .collect();
        due.sort_by(|a, b| a.stored_at.cmp(&b.stored_at));
        Ok(due)
    }

    async fn mark_reminded(
        &self,
        expert_message_id: &str,
        at: DateTime<Utc>,
    ) -> VeribotResult<()> {
        let mut records = self
            .records
            .lock()
            .map_err(|e| anyhow!("message store lock poisoned: {e}"))?;
        if let Some(record) = records.get_mut(expert_message_id) {
            if let Some(verification) = record.verification.as_mut() {
                verification.last_reminded_at = Some(at);
            }
        }
        Ok(())
    }
}
