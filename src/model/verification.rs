use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of a generated answer with respect to expert sign-off.
///
/// `Pending` means the answer is directly deliverable with no expert
/// involved; it is terminal. `Waiting` answers have been dispatched to an
/// expert and resolve to `Verified` or `Rejected` exactly once. Terminal
/// states are never reopened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Pending,
    Waiting,
    Verified,
    Rejected,
}

impl VerificationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::Waiting => "waiting",
            VerificationStatus::Verified => "verified",
            VerificationStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(VerificationStatus::Pending),
            "waiting" => Some(VerificationStatus::Waiting),
            "verified" => Some(VerificationStatus::Verified),
            "rejected" => Some(VerificationStatus::Rejected),
            _ => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, VerificationStatus::Waiting)
    }
}

/// Durable state of one answer awaiting (or done with) expert sign-off.
/// Keyed in the store by the expert-facing message's own id, so an expert
/// reply threading to that message resolves the record directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationRecord {
    pub expert_message_id: String,
    /// The user question this answer belongs to. The final delivery threads
    /// to this id, not to the expert's message.
    pub original_question_id: String,
    pub answer_text: String,
    pub status: VerificationStatus,
    /// Channel id of the expert whose reply committed the terminal
    /// transition. Distinguishes a redelivery of the winning reply (replay
    /// the final answer) from a different expert arriving late (tell them
    /// the question is resolved).
    #[serde(default)]
    pub resolved_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub waiting_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub last_reminded_at: Option<DateTime<Utc>>,
}

impl VerificationRecord {
    /// A record for an answer just dispatched to the expert pool.
    pub fn waiting(
        expert_message_id: impl Into<String>,
        original_question_id: impl Into<String>,
        answer_text: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            expert_message_id: expert_message_id.into(),
            original_question_id: original_question_id.into(),
            answer_text: answer_text.into(),
            status: VerificationStatus::Waiting,
            resolved_by: None,
            created_at: now,
            waiting_at: Some(now),
            resolved_at: None,
            last_reminded_at: None,
        }
    }
}
