use crate::channels::base::{ChannelClient, ChannelMessage, MediaDownload, SendReceipt};
use crate::errors::{VeribotError, VeribotResult};
use crate::model::MessagePayload;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.qikchat.in/v1";

/// Qikchat API client. Authenticates with a static key header and serves
/// media over direct URLs, so downloads are a single fetch.
pub struct QikchatClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl QikchatClient {
    pub fn new(
        api_key: impl Into<String>,
        base_url: Option<String>,
        timeout: Duration,
    ) -> VeribotResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VeribotError::Config(format!("qikchat client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key: api_key.into(),
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
                    "language": language,
                    "parameters": parameters,
                }
            }),
            MessagePayload::Audio { url, mime_type } => json!({
                "type": "audio",
                "audio": { "url": url, "mime_type": mime_type }
            }),
            MessagePayload::Empty | MessagePayload::Verification { .. } => json!({
                "type": "text",
                "text": { "body": message.body }
            }),
        };
        body["to"] = json!(message.to);
        if let Some(reply_to) = &message.reply_to {
            body["context"] = json!({ "message_id": reply_to });
        }
        body
    }
}

#[async_trait]
impl ChannelClient for QikchatClient {
    fn name(&self) -> &str {
        "qikchat"
    }

    async fn send(&self, message: &ChannelMessage) -> VeribotResult<SendReceipt> {
        let body = Self::wire_body(message);
        let data: Value = self
            .client
            .post(format!("{}/messages", self.base_url))
            .header("QIKCHAT-API-KEY", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| VeribotError::transient("qikchat", e.to_string()))?
            .error_for_status()
            .map_err(|e| VeribotError::transient("qikchat", e.to_string()))?
            .json()
            .await
            .map_err(|e| VeribotError::transient("qikchat", e.to_string()))?;

        let message_id = data
            .get("data")
            .and_then(|d| d.get("id"))
            .or_else(|| data.get("id"))
            .and_then(Value::as_str)
            .ok_or_else(|| VeribotError::transient("qikchat", "send response missing id"))?
            .to_string();
        debug!("qikchat send to {} -> {}", message.to, message_id);
        Ok(SendReceipt { message_id })
    }

    async fn download_media(&self, media_id: &str) -> VeribotResult<MediaDownload> {
        // Inbound webhooks carry a direct URL in the media reference.
        let response = self
            .client
            .get(media_id)
            .header("QIKCHAT-API-KEY", &self.api_key)
            .send()
            .await
            .map_err(|e| VeribotError::transient("qikchat", e.to_string()))?
            .error_for_status()
            .map_err(|e| VeribotError::transient("qikchat", e.to_string()))?;

        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("audio/ogg")
            .to_string();
        let data = response
            .bytes()
            .await
            .map_err(|e| VeribotError::transient("qikchat", e.to_string()))?;
        Ok(MediaDownload {
            data: data.to_vec(),
            mime_type,
        })
    }
}
