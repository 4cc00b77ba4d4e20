use crate::errors::{VeribotError, VeribotResult};
use async_trait::async_trait;
use std::time::Duration;

/// Speech recognition and synthesis in the user's own language.
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    async fn speech_to_text(
        &self,
        audio: &[u8],
        mime_type: &str,
        language: &str,
    ) -> VeribotResult<String>;

    async fn text_to_speech(&self, text: &str, language: &str) -> VeribotResult<Vec<u8>>;
}

pub struct HttpSpeechEngine {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSpeechEngine {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> VeribotResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VeribotError::Config(format!("speech client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl SpeechEngine for HttpSpeechEngine {
    async fn speech_to_text(
        &self,
        audio: &[u8],
        mime_type: &str,
        language: &str,
    ) -> VeribotResult<String> {
        let part = reqwest::multipart::Part::bytes(audio.to_vec())
            .file_name("audio")
            .mime_str(mime_type)
            .map_err(|e| VeribotError::Validation(format!("bad mime type: {e}")))?;
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("language", language.to_string());

        let response = self
            .client
            .post(format!("{}/speech-to-text", self.base_url))
            .multipart(form)
            .send()
            .await
            .map_err(|e| VeribotError::transient("speech", e.to_string()))?
            .error_for_status()
            .map_err(|e| VeribotError::transient("speech", e.to_string()))?;

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| VeribotError::transient("speech", e.to_string()))?;
        body.get("text")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| VeribotError::transient("speech", "missing text in response"))
    }

    async fn text_to_speech(&self, text: &str, language: &str) -> VeribotResult<Vec<u8>> {
        let response = self
            .client
            .post(format!("{}/text-to-speech", self.base_url))
            .json(&serde_json::json!({ "text": text, "language": language }))
            .send()
            .await
            .map_err(|e| VeribotError::transient("speech", e.to_string()))?
            .error_for_status()
            .map_err(|e| VeribotError::transient("speech", e.to_string()))?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| VeribotError::transient("speech", e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
