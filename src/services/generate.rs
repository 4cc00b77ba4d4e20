use crate::errors::{VeribotError, VeribotResult};
use crate::services::retrieval::Chunk;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

/// A grounded draft answer and the model's own confidence in it.
/// `needs_verification` decides whether the answer goes straight to the user
/// or waits on expert sign-off.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Draft {
    pub answer: String,
    #[serde(default)]
    pub related_questions: Vec<String>,
    pub needs_verification: bool,
}

#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, question: &str, chunks: &[Chunk]) -> VeribotResult<Draft>;
}

pub struct HttpGenerator {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGenerator {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> VeribotResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VeribotError::Config(format!("generator client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    async fn generate(&self, question: &str, chunks: &[Chunk]) -> VeribotResult<Draft> {
        let context: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let response = self
            .client
            .post(format!("{}/generate", self.base_url))
            .json(&json!({ "question": question, "context": context }))
            .send()
            .await
            .map_err(|e| VeribotError::transient("generator", e.to_string()))?
            .error_for_status()
            .map_err(|e| VeribotError::transient("generator", e.to_string()))?;

        let draft: Draft = response
            .json()
            .await
            .map_err(|e| VeribotError::transient("generator", e.to_string()))?;
        Ok(draft)
    }
}
