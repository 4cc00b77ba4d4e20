use crate::channels::base::{ChannelClient, ChannelMessage, MediaDownload, SendReceipt};
use crate::errors::{VeribotError, VeribotResult};
use crate::model::MessagePayload;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://graph.facebook.com/v20.0";

/// WhatsApp Cloud API client.
pub struct WhatsappClient {
    client: reqwest::Client,
    base_url: String,
    phone_number_id: String,
    access_token: String,
}

impl WhatsappClient {
    pub fn new(
        phone_number_id: impl Into<String>,
        access_token: impl Into<String>,
        base_url: Option<String>,
        timeout: Duration,
    ) -> VeribotResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VeribotError::Config(format!("whatsapp client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            phone_number_id: phone_number_id.into(),
            access_token: access_token.into(),
        })
    }

    fn wire_body(message: &ChannelMessage) -> Value {
        let mut body = match &message.kind {
            MessagePayload::InteractiveList {
                description,
                options,
            } => json!({
                "type": "interactive",
                "interactive": {
                    "type": "list",
                    "body": { "text": format!("{}\n\n{}", message.body, description) },
                    "action": {
                        "button": "Select",
                        "sections": [{
                            "rows": options.iter().enumerate().map(|(i, title)| json!({
                                "id": format!("opt-{i}"),
                                "title": title,
                            })).collect::<Vec<_>>()
                        }]
                    }
                }
            }),
            MessagePayload::Template {
                name,
                language,
                parameters,
            } => json!({
                "type": "template",
                "template": {
                    "name": name,
                    "language": { "code": language },
                    "components": [{
                        "type": "body",
                        "parameters": parameters.iter().map(|p| json!({
                            "type": "text", "text": p,
                        })).collect::<Vec<_>>()
                    }]
                }
            }),
            MessagePayload::Audio { url, .. } => json!({
                "type": "audio",
                "audio": { "link": url }
            }),
            MessagePayload::Empty | MessagePayload::Verification { .. } => json!({
                "type": "text",
                "text": { "body": message.body }
            }),
        };
        body["messaging_product"] = json!("whatsapp");
        body["to"] = json!(message.to);
        if let Some(reply_to) = &message.reply_to {
            body["context"] = json!({ "message_id": reply_to });
        }
        body
    }

    async fn post_messages(&self, body: &Value) -> VeribotResult<Value> {
        let response = self
            .client
            .post(format!(
                "{}/{}/messages",
                self.base_url, self.phone_number_id
            ))
            .bearer_auth(&self.access_token)
            .json(body)
            .send()
            .await
            .map_err(|e| VeribotError::transient("whatsapp", e.to_string()))?
            .error_for_status()
            .map_err(|e| VeribotError::transient("whatsapp", e.to_string()))?;
        response
            .json()
            .await
            .map_err(|e| VeribotError::transient("whatsapp", e.to_string()))
    }
}

#[async_trait]
impl ChannelClient for WhatsappClient {
    fn name(&self) -> &str {
        "whatsapp"
    }

    async fn send(&self, message: &ChannelMessage) -> VeribotResult<SendReceipt> {
        let body = Self::wire_body(message);
        let data = self.post_messages(&body).await?;
        let message_id = data
            .get("messages")
            .and_then(|m| m.get(0))
            .and_then(|m| m.get("id"))
            .and_then(Value::as_str)
            .ok_or_else(|| VeribotError::transient("whatsapp", "send response missing id"))?
            .to_string();
        debug!("whatsapp send to {} -> {}", message.to, message_id);
        Ok(SendReceipt { message_id })
    }

    async fn download_media(&self, media_id: &str) -> VeribotResult<MediaDownload> {
        // Two hops: resolve the media id to a short-lived URL, then fetch it.
        let meta: Value = self
            .client
            .get(format!("{}/{}", self.base_url, media_id))
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| VeribotError::transient("whatsapp", e.to_string()))?
            .error_for_status()
            .map_err(|e| VeribotError::transient("whatsapp", e.to_string()))?
            .json()
            .await
            .map_err(|e| VeribotError::transient("whatsapp", e.to_string()))?;

        let url = meta
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| VeribotError::transient("whatsapp", "media meta missing url"))?;
        let mime_type = meta
            .get("mime_type")
            .and_then(Value::as_str)
            .unwrap_or("audio/ogg")
            .to_string();

        let data = self
            .client
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| VeribotError::transient("whatsapp", e.to_string()))?
            .error_for_status()
            .map_err(|e| VeribotError::transient("whatsapp", e.to_string()))?
            .bytes()
            .await
            .map_err(|e| VeribotError::transient("whatsapp", e.to_string()))?;

        Ok(MediaDownload {
            data: data.to_vec(),
            mime_type,
        })
    }

    async fn mark_read(&self, message_id: &str) -> VeribotResult<()> {
        let body = json!({
            "messaging_product": "whatsapp",
            "status": "read",
            "message_id": message_id,
        });
        self.post_messages(&body).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChannelType;

    fn message(kind: MessagePayload) -> ChannelMessage {
        ChannelMessage {
            channel: ChannelType::Whatsapp,
            to: "919999000001".to_string(),
            body: "hello".to_string(),
            kind,
            reply_to: Some("wamid.original".to_string()),
        }
    }

    #[test]
    fn text_body_carries_context() {
        let body = WhatsappClient::wire_body(&message(MessagePayload::Empty));
        assert_eq!(body["type"], "text");
        assert_eq!(body["text"]["body"], "hello");
        assert_eq!(body["context"]["message_id"], "wamid.original");
        assert_eq!(body["messaging_product"], "whatsapp");
    }

    #[test]
    fn interactive_list_has_one_row_per_option() {
        let body = WhatsappClient::wire_body(&message(MessagePayload::InteractiveList {
            description: "You can also ask:".to_string(),
            options: vec!["Q1".to_string(), "Q2".to_string(), "Q3".to_string()],
        }));
        assert_eq!(body["type"], "interactive");
        let rows = body["interactive"]["action"]["sections"][0]["rows"]
            .as_array()
            .unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1]["title"], "Q2");
    }

    #[test]
    fn audio_sends_link() {
        let body = WhatsappClient::wire_body(&message(MessagePayload::Audio {
            url: "https://blobs.example/a.ogg".to_string(),
            mime_type: "audio/ogg".to_string(),
        }));
        assert_eq!(body["type"], "audio");
        assert_eq!(body["audio"]["link"], "https://blobs.example/a.ogg");
    }
}
