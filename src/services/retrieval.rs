use crate::errors::{VeribotError, VeribotResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;

/// One knowledge-base chunk returned for a query.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub chunk_id: String,
    pub text: String,
    pub source: String,
    #[serde(default)]
    pub related_questions: Vec<String>,
}

#[async_trait]
pub trait Retriever: Send + Sync {
    /// Top-`k` chunks most relevant to the query, best first.
    async fn retrieve(&self, query: &str, k: usize) -> VeribotResult<Vec<Chunk>>;
}

pub struct HttpRetriever {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRetriever {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> VeribotResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VeribotError::Config(format!("retriever client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl Retriever for HttpRetriever {
    async fn retrieve(&self, query: &str, k: usize) -> VeribotResult<Vec<Chunk>> {
        let response = self
            .client
            .post(format!("{}/search", self.base_url))
            .json(&json!({ "query": query, "k": k }))
            .send()
            .await
            .map_err(|e| VeribotError::transient("retriever", e.to_string()))?
            .error_for_status()
            .map_err(|e| VeribotError::transient("retriever", e.to_string()))?;

        let chunks: Vec<Chunk> = response
            .json()
            .await
            .map_err(|e| VeribotError::transient("retriever", e.to_string()))?;
        Ok(chunks)
    }
}
