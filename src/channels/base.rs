use crate::errors::VeribotResult;
use crate::model::{ChannelType, Envelope, MessageCategory, MessagePayload};
use async_trait::async_trait;

/// What a channel client needs to put one message on the wire.
#[derive(Debug, Clone)]
pub struct ChannelMessage {
    pub channel: ChannelType,
    /// Recipient's channel-level id.
    pub to: String,
    pub body: String,
    pub kind: MessagePayload,
    /// Platform message id this one threads under, when the platform
    /// supports reply context.
    pub reply_to: Option<String>,
}

impl ChannelMessage {
    /// Project an outbound envelope onto the wire shape. Reply threading is
    /// only surfaced for the categories where the recipient should see it.
    pub fn from_envelope(envelope: &Envelope) -> Self {
        let reply_to = match envelope.category {
            MessageCategory::BotToUserResponse | MessageCategory::BotToExpert => envelope
                .reply_id()
                .map(str::to_string),
            _ => None,
        };
        Self {
            channel: envelope.channel,
            to: envelope.user.channel_id.clone(),
            body: envelope.outbound_text().unwrap_or_default().to_string(),
            kind: envelope.payload.clone(),
            reply_to,
        }
    }
}

/// Platform-assigned id of a sent message.
#[derive(Debug, Clone)]
pub struct SendReceipt {
    pub message_id: String,
}

#[derive(Debug, Clone)]
pub struct MediaDownload {
    pub data: Vec<u8>,
    pub mime_type: String,
}

#[async_trait]
pub trait ChannelClient: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, message: &ChannelMessage) -> VeribotResult<SendReceipt>;

    /// Fetch inbound media by the reference the webhook carried (media id or
    /// direct URL, depending on the platform).
    async fn download_media(&self, media_id: &str) -> VeribotResult<MediaDownload>;

    /// Mark an inbound message read. Default no-op for platforms without
    /// read receipts.
    async fn mark_read(&self, _message_id: &str) -> VeribotResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ReplyContext, User, UserType};

    fn envelope(category: MessageCategory) -> Envelope {
        let mut env = Envelope::outgoing(
            ChannelType::Whatsapp,
            category,
            User::new("919999000001", UserType::Regular, "hi"),
        );
        env.translated_text = Some("translated".to_string());
        env.english_text = Some("english".to_string());
        env.reply = Some(ReplyContext::to_message("wamid.original"));
        env
    }

    #[test]
    fn reply_context_only_for_threaded_categories() {
        let msg = ChannelMessage::from_envelope(&envelope(MessageCategory::BotToUserResponse));
        assert_eq!(msg.reply_to.as_deref(), Some("wamid.original"));

        let msg =
            ChannelMessage::from_envelope(&envelope(MessageCategory::BotToExpertVerification));
        assert!(msg.reply_to.is_none());
    }

    #[test]
    fn body_prefers_translated_text() {
        let msg = ChannelMessage::from_envelope(&envelope(MessageCategory::BotToUserResponse));
        assert_eq!(msg.body, "translated");
    }
}
