//! Qikchat webhook adapter.
//!
//! Qikchat wraps everything in `{ event, payload }`. Message events carry
//! `payload.message`; status events carry `payload.status` with no message
//! body. Audio arrives as a direct URL rather than a media id.

use crate::adapter::{InboundKind, Normalized};
use crate::model::{
    ChannelType, Envelope, MediaInfo, MessageCategory, MessagePayload, ReplyContext, User,
    UserType,
};
use serde_json::Value;

pub fn normalize(payload: &Value) -> Option<Normalized> {
    payload.get("event")?.as_str()?;
    let inner = payload.get("payload")?;

    if let Some(status) = inner.get("status") {
        if inner.get("message").is_none() {
            return normalize_status(status);
        }
    }
    normalize_message(inner.get("message")?)
}

fn normalize_status(status: &Value) -> Option<Normalized> {
    let message_id = status
        .get("message_id")
        .or_else(|| status.get("id"))?
        .as_str()?
        .to_string();
    let recipient = status
        .get("recipient")
        .or_else(|| status.get("to"))?
        .as_str()?
        .to_string();

    let mut envelope = Envelope::outgoing(
        ChannelType::Qikchat,
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

    let (kind, source_text, media) = match message.get("type")?.as_str()? {
        "text" => {
            let body = message.get("text")?.get("body")?.as_str()?.to_string();
            (InboundKind::RegularText, Some(body), None)
        }
        "audio" => {
            let audio = message.get("audio")?;
            // Qikchat serves audio by URL; keep it in media_id so the channel
            // client downloads it the same way either field arrives.
            let media = MediaInfo {
                media_id: audio
                    .get("url")
                    .or_else(|| audio.get("id"))?
                    .as_str()?
                    .to_string(),
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
        .and_then(|c| c.get("message_id"))
        .and_then(Value::as_str)
        .map(ReplyContext::to_message);

    let mut envelope = Envelope::outgoing(
        ChannelType::Qikchat,
        MessageCategory::UserToBot,
        User::new(from, UserType::Regular, "en"),
    );
    envelope.message_id = message_id;
    envelope.source_text = source_text;
    envelope.media = media;
    envelope.payload = MessagePayload::Empty;
    envelope.reply = reply;
    Some(Normalized { kind, envelope })
}

#[cfg(test)]
mod tests;
