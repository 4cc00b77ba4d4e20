//! WhatsApp Cloud API webhook adapter.
//!
//! Payload shape: `entry[0].changes[0].value` holding either `messages[0]`
//! (text / audio / interactive) or `statuses[0]` (delivery receipts).

use crate::adapter::{InboundKind, Normalized};
use crate::model::{
    ChannelType, Envelope, MediaInfo, MessageCategory, MessagePayload, ReplyContext, User,
    UserType,
};
use chrono::{DateTime, Utc};
use serde_json::Value;

pub fn normalize(payload: &Value) -> Option<Normalized> {
    // The event wrapper marks a Qikchat payload; bail early.
    if payload.get("event").is_some() {
        return None;
    }
    let value = payload
        .get("entry")?
        .get(0)?
        .get("changes")?
        .get(0)?
        .get("value")?;

    if let Some(status) = value.get("statuses").and_then(|s| s.get(0)) {
        return normalize_status(status);
    }
    let message = value.get("messages")?.get(0)?;
    normalize_message(message)
}

fn normalize_status(status: &Value) -> Option<Normalized> {
    let message_id = status.get("id")?.as_str()?.to_string();
    let recipient = status.get("recipient_id")?.as_str()?.to_string();

    let mut envelope = Envelope::outgoing(
        ChannelType::Whatsapp,
        MessageCategory::ReadReceipt,
        User::new(recipient, UserType::Regular, "en"),
    );
    envelope.message_id = message_id;
    Some(Normalized {
        kind: InboundKind::Status,
        envelope,
    })
}

fn normalize_message(message: &Value) -> Option<Normalized> {
    let message_id = message.get("id")?.as_str()?.to_string();
    let from = message.get("from")?.as_str()?.to_string();
    let incoming_at = parse_timestamp(message.get("timestamp"));

    let (kind, source_text, media) = match message.get("type")?.as_str()? {
        "text" => {
            let body = message.get("text")?.get("body")?.as_str()?.to_string();
            (InboundKind::RegularText, Some(body), None)
        }
        "audio" => {
            let audio = message.get("audio")?;
            let media = MediaInfo {
                media_id: audio.get("id")?.as_str()?.to_string(),
                mime_type: audio
                    .get("mime_type")
                    .and_then(Value::as_str)
                    .unwrap_or("audio/ogg")
                    .to_string(),
            };
            (InboundKind::RegularAudio, None, Some(media))
        }
        "interactive" => {
            let interactive = message.get("interactive")?;
            let title = interactive
                .get("list_reply")
                .or_else(|| interactive.get("button_reply"))?
                .get("title")?
                .as_str()?
                .to_string();
            (InboundKind::InteractiveReply, Some(title), None)
        }
        _ => return None,
    };

    let reply = message
        .get("context")
        .and_then(|c| c.get("id"))
        .and_then(Value::as_str)
        .map(ReplyContext::to_message);

    let mut envelope = Envelope::outgoing(
        ChannelType::Whatsapp,
        MessageCategory::UserToBot,
        User::new(from, UserType::Regular, "en"),
    );
    envelope.message_id = message_id;
    envelope.source_text = source_text;
    envelope.media = media;
    envelope.payload = MessagePayload::Empty;
    envelope.reply = reply;
    envelope.incoming_at = incoming_at;
    Some(Normalized { kind, envelope })
}

fn parse_timestamp(value: Option<&Value>) -> DateTime<Utc> {
    value
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<i64>().ok())
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .unwrap_or_else(Utc::now)
}
