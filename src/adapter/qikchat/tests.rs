use super::*;
use serde_json::json;

#[test]
fn text_message() {
    let payload = json!({
        "event": "message.received",
        "payload": {
            "message": {
                "id": "qc-msg-1",
                "from": "+919999000001",
                "type": "text",
                "text": { "body": "When is the next dose due?" }
            }
        }
    });

    let normalized = normalize(&payload).unwrap();
    assert_eq!(normalized.kind, InboundKind::RegularText);
    assert_eq!(normalized.envelope.channel, ChannelType::Qikchat);
    assert_eq!(normalized.envelope.message_id, "qc-msg-1");
    assert_eq!(normalized.envelope.user.channel_id, "+919999000001");
    assert_eq!(
        normalized.envelope.source_text.as_deref(),
        Some("When is the next dose due?")
    );
}

#[test]
fn audio_message_by_url() {
    let payload = json!({
        "event": "message.received",
        "payload": {
            "message": {
                "id": "qc-msg-2",
                "from": "+919999000001",
                "type": "audio",
                "audio": {
                    "url": "https://cdn.qikchat.example/audio/abc.ogg",
                    "mime_type": "audio/ogg"
                }
            }
        }
    });

    let normalized = normalize(&payload).unwrap();
    assert_eq!(normalized.kind, InboundKind::RegularAudio);
    let media = normalized.envelope.media.unwrap();
    assert_eq!(media.media_id, "https://cdn.qikchat.example/audio/abc.ogg");
}

#[test]
fn interactive_reply_threads_to_context() {
    let payload = json!({
        "event": "message.received",
        "payload": {
            "message": {
                "id": "qc-msg-3",
                "from": "+919999000001",
                "type": "interactive",
                "interactive": {
                    "list_reply": { "id": "opt-2", "title": "How long does immunity last?" }
                },
                "context": { "message_id": "qc-msg-0" }
            }
        }
    });

    let normalized = normalize(&payload).unwrap();
    assert_eq!(normalized.kind, InboundKind::InteractiveReply);
    assert_eq!(normalized.envelope.reply_id(), Some("qc-msg-0"));
}

#[test]
fn status_without_message_is_receipt() {
    let payload = json!({
        "event": "message.status",
        "payload": {
            "status": {
                "message_id": "qc-sent-7",
                "state": "delivered",
                "recipient": "+919999000001"
            }
        }
    });

    let normalized = normalize(&payload).unwrap();
    assert_eq!(normalized.kind, InboundKind::Status);
    assert_eq!(normalized.envelope.message_id, "qc-sent-7");
    assert_eq!(normalized.envelope.category, MessageCategory::ReadReceipt);
}

#[test]
fn missing_event_wrapper_fails_closed() {
    let payload = json!({
        "payload": {
            "message": { "id": "x", "from": "y", "type": "text", "text": { "body": "z" } }
        }
    });
    assert!(normalize(&payload).is_none());
}

#[test]
fn unknown_message_type_is_dropped() {
    let payload = json!({
        "event": "message.received",
        "payload": {
            "message": { "id": "qc-msg-4", "from": "+919999000001", "type": "location" }
        }
    });
    assert!(normalize(&payload).is_none());
}
