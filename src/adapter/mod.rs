//! Webhook payload normalization.
//!
//! Each channel adapter is a pure transformation from the channel's opaque
//! webhook JSON into a canonical [`Envelope`]. Anything ambiguous or
//! partially malformed fails closed: the adapter returns `None` and the
//! caller answers the webhook with success while dropping the payload, so
//! the channel does not enter a redelivery storm.

pub mod qikchat;
pub mod whatsapp;

use crate::model::Envelope;
use serde_json::Value;

/// What an inbound payload turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundKind {
    /// Delivery/read status update.
    Status,
    RegularText,
    RegularAudio,
    InteractiveReply,
}

/// A recognized payload: its classification and canonical envelope.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub kind: InboundKind,
    pub envelope: Envelope,
}

/// Try each channel's adapter in turn. Qikchat first: its `event` wrapper is
/// unambiguous, whereas WhatsApp's nested shape needs deeper probing.
pub fn normalize_any(payload: &Value) -> Option<Normalized> {
    qikchat::normalize(payload).or_else(|| whatsapp::normalize(payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unrecognized_payload_is_dropped() {
        assert!(normalize_any(&json!({"hello": "world"})).is_none());
        assert!(normalize_any(&json!([1, 2, 3])).is_none());
        assert!(normalize_any(&json!(null)).is_none());
        assert!(normalize_any(&json!("just a string")).is_none());
    }
}
