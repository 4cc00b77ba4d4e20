use crate::model::user::User;
use crate::model::verification::VerificationStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Chat platform a message arrived on or is bound for. Determines which
/// client formats and sends the outbound payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    Whatsapp,
    Qikchat,
}

impl ChannelType {
    pub fn as_str(self) -> &'static str {
        match self {
            ChannelType::Whatsapp => "whatsapp",
            ChannelType::Qikchat => "qikchat",
        }
    }
}

impl std::fmt::Display for ChannelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Conversation leg a message belongs to. Assigned exactly once when the
/// message enters the pipeline and never changed afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageCategory {
    UserToBot,
    BotToUserResponse,
    BotToExpertVerification,
    ExpertToBot,
    BotToExpert,
    ReadReceipt,
}

/// Reference to an audio/image attachment on the originating channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaInfo {
    pub media_id: String,
    pub mime_type: String,
}

/// Stage-specific payload riding on an envelope. One variant per message
/// sub-kind instead of an open key-value bag, so matches are exhaustive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MessagePayload {
    #[default]
    Empty,
    InteractiveList {
        description: String,
        options: Vec<String>,
    },
    Template {
        name: String,
        language: String,
        parameters: Vec<String>,
    },
    Audio {
        url: String,
        mime_type: String,
    },
    Verification {
        status: VerificationStatus,
        answer_text: String,
    },
}

/// Back-reference threading a message to the one it logically answers.
/// Immutable once set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplyContext {
    pub reply_id: String,
    pub reply_english_text: Option<String>,
    #[serde(default)]
    pub reply_payload: MessagePayload,
}

impl ReplyContext {
    pub fn to_message(id: impl Into<String>) -> Self {
        Self {
            reply_id: id.into(),
            reply_english_text: None,
            reply_payload: MessagePayload::Empty,
        }
    }
}

/// Canonical in-flight representation of one channel message.
///
/// Content moves between the three text fields as the pipeline runs:
/// `source_text` is what the sender wrote, `english_text` the working-language
/// form, `translated_text` the outbound form in the recipient's language. At
/// most one of them is authoritative at any stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub message_id: String,
    pub channel: ChannelType,
    pub category: MessageCategory,
    pub source_text: Option<String>,
    pub english_text: Option<String>,
    pub translated_text: Option<String>,
    pub media: Option<MediaInfo>,
    #[serde(default)]
    pub payload: MessagePayload,
    pub reply: Option<ReplyContext>,
    pub user: User,
    pub incoming_at: DateTime<Utc>,
}

impl Envelope {
    /// A fresh locally-generated envelope. The id is provisional until the
    /// channel assigns its own after send (see `MessageStore::remap`).
    pub fn outgoing(channel: ChannelType, category: MessageCategory, user: User) -> Self {
        Self {
            message_id: Uuid::new_v4().to_string(),
            channel,
            category,
            source_text: None,
            english_text: None,
            translated_text: None,
            media: None,
            payload: MessagePayload::Empty,
            reply: None,
            user,
            incoming_at: Utc::now(),
        }
    }

    /// Best available text for processing: working language first, then the
    /// raw source.
    pub fn text(&self) -> Option<&str> {
        self.english_text
            .as_deref()
            .or(self.source_text.as_deref())
    }

    /// Best available text for sending: recipient language first.
    pub fn outbound_text(&self) -> Option<&str> {
        self.translated_text
            .as_deref()
            .or(self.source_text.as_deref())
            .or(self.english_text.as_deref())
    }

    pub fn reply_id(&self) -> Option<&str> {
        self.reply.as_ref().map(|r| r.reply_id.as_str())
    }
}
