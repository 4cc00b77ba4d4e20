use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Recent-history cap per user. Oldest entries are dropped first.
pub const MAX_RECENT_CONVERSATIONS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    Regular,
    Expert,
}

/// One person on a channel. Created on first contact, updated on every
/// interaction, never hard-deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    /// Channel-level identifier (phone number id for WhatsApp/Qikchat).
    pub channel_id: String,
    pub user_type: UserType,
    /// BCP-47-ish language code ("en", "hi", ...).
    pub language: String,
    #[serde(default)]
    pub last_conversations: Vec<String>,
    pub last_active_at: DateTime<Utc>,
}

impl User {
    pub fn new(channel_id: impl Into<String>, user_type: UserType, language: impl Into<String>) -> Self {
        Self {
            user_id: Uuid::new_v4().to_string(),
            channel_id: channel_id.into(),
            user_type,
            language: language.into(),
            last_conversations: Vec::new(),
            last_active_at: Utc::now(),
        }
    }

    pub fn is_expert(&self) -> bool {
        self.user_type == UserType::Expert
    }

    pub fn touch(&mut self) {
        self.last_active_at = Utc::now();
    }

    /// Append to the bounded recent history.
    pub fn record_conversation(&mut self, text: impl Into<String>) {
        self.last_conversations.push(text.into());
        if self.last_conversations.len() > MAX_RECENT_CONVERSATIONS {
            let overflow = self.last_conversations.len() - MAX_RECENT_CONVERSATIONS;
            self.last_conversations.drain(..overflow);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_is_bounded() {
        let mut user = User::new("919999000001", UserType::Regular, "hi");
        for i in 0..25 {
            user.record_conversation(format!("question {}", i));
        }
        assert_eq!(user.last_conversations.len(), MAX_RECENT_CONVERSATIONS);
        assert_eq!(user.last_conversations[0], "question 15");
        assert_eq!(
            user.last_conversations.last().map(String::as_str),
            Some("question 24")
        );
    }

    #[test]
    fn expert_flag() {
        let user = User::new("919999000002", UserType::Expert, "en");
        assert!(user.is_expert());
        let user = User::new("919999000003", UserType::Regular, "en");
        assert!(!user.is_expert());
    }
}
