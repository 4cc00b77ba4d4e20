//! Durable state: users and messages with their verification lifecycle.
//!
//! Two backends behind the same traits. The in-memory stores back tests and
//! single-node smoke runs; the SQLite stores are the durable default.

pub mod memory;
pub mod sqlite;

pub use memory::{InMemoryMessageStore, InMemoryUserStore};
pub use sqlite::{SqliteMessageStore, SqliteUserStore};

use crate::errors::VeribotResult;
use crate::model::{Envelope, User, VerificationRecord, VerificationStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// One persisted message plus its verification state, if any.
#[derive(Debug, Clone)]
pub struct MessageRecord {
    pub envelope: Envelope,
    pub verification: Option<VerificationRecord>,
    pub stored_at: DateTime<Utc>,
}

impl MessageRecord {
    pub fn new(envelope: Envelope) -> Self {
        Self {
            envelope,
            verification: None,
            stored_at: Utc::now(),
        }
    }

    pub fn with_verification(envelope: Envelope, verification: VerificationRecord) -> Self {
        Self {
            envelope,
            verification: Some(verification),
            stored_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get(&self, channel_id: &str) -> VeribotResult<Option<User>>;
    async fn upsert(&self, user: &User) -> VeribotResult<()>;
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn insert(&self, record: &MessageRecord) -> VeribotResult<()>;

    async fn get(&self, message_id: &str) -> VeribotResult<Option<MessageRecord>>;

    /// Rekey a record after the channel assigns its own message id. After a
    /// successful remap, lookups by `new_id` hit and lookups by `old_id`
    /// miss. Returns false when `old_id` is unknown.
    async fn remap(&self, old_id: &str, new_id: &str) -> VeribotResult<bool>;

    /// Compare-and-swap on verification status. Succeeds only when the
    /// record's current status equals `expected`; losers of a concurrent
    /// race observe false and must not apply their side effects. When
    /// `answer` is given it replaces the stored answer text (an expert
    /// correction). `resolver` is stamped on the winning transition so a
    /// redelivery of the same reply can be recognized later.
    async fn transition_verification(
        &self,
        expert_message_id: &str,
        expected: VerificationStatus,
        next: VerificationStatus,
        answer: Option<&str>,
        resolver: &str,
    ) -> VeribotResult<bool>;

    /// Records still Waiting whose last activity (waiting or reminder,
    /// whichever is later) is older than `older_than`.
    async fn due_for_reminder(
        &self,
        older_than: DateTime<Utc>,
    ) -> VeribotResult<Vec<MessageRecord>>;

    async fn mark_reminded(
        &self,
        expert_message_id: &str,
        at: DateTime<Utc>,
    ) -> VeribotResult<()>;
}
