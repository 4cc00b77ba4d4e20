use crate::errors::{VeribotError, VeribotResult};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

#[async_trait]
pub trait Translator: Send + Sync {
    /// Translate `text` between two language codes. Implementations must
    /// treat `source == target` as the identity and skip any remote call.
    async fn translate(&self, text: &str, source: &str, target: &str) -> VeribotResult<String>;
}

pub struct HttpTranslator {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTranslator {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> VeribotResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VeribotError::Config(format!("translator client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl Translator for HttpTranslator {
    async fn translate(&self, text: &str, source: &str, target: &str) -> VeribotResult<String> {
        if source == target || text.trim().is_empty() {
            return Ok(text.to_string());
        }
        debug!("translating {} -> {}", source, target);

        let response = self
            .client
            .post(format!("{}/translate", self.base_url))
            .json(&json!({ "text": text, "source": source, "target": target }))
            .send()
            .await
            .map_err(|e| VeribotError::transient("translator", e.to_string()))?
            .error_for_status()
            .map_err(|e| VeribotError::transient("translator", e.to_string()))?;

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| VeribotError::transient("translator", e.to_string()))?;
        body.get("text")
            .and_then(serde_json::Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| VeribotError::transient("translator", "missing text in response"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn identity_translation_never_hits_network() {
        // Unroutable base url: a remote call would error, the identity path
        // must not.
        let translator =
            HttpTranslator::new("http://127.0.0.1:1", Duration::from_millis(50)).unwrap();
        let out = translator
            .translate("Hello, how are you?", "en", "en")
            .await
            .unwrap();
        assert_eq!(out, "Hello, how are you?");
    }

    #[tokio::test]
    async fn empty_text_short_circuits() {
        let translator =
            HttpTranslator::new("http://127.0.0.1:1", Duration::from_millis(50)).unwrap();
        assert_eq!(translator.translate("", "hi", "en").await.unwrap(), "");
    }
}
