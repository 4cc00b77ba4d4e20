use crate::errors::VeribotResult;
use anyhow::anyhow;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// Where synthesized audio lands before the channel fetches it by URL.
#[async_trait]
pub trait MediaStorage: Send + Sync {
    /// Store an audio blob and return a channel-fetchable URL.
    async fn put_audio(&self, data: Vec<u8>, mime_type: &str) -> VeribotResult<String>;
}

/// Keeps blobs in memory and hands out synthetic URLs. Backs tests and
/// single-node runs; the trait is the seam for a blob store.
#[derive(Default)]
pub struct InMemoryMediaStorage {
    blobs: Mutex<HashMap<String, (Vec<u8>, String)>>,
}

impl InMemoryMediaStorage {
    pub fn len(&self) -> usize {
        self.blobs.lock().expect("storage lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl MediaStorage for InMemoryMediaStorage {
    async fn put_audio(&self, data: Vec<u8>, mime_type: &str) -> VeribotResult<String> {
        let key = Uuid::new_v4().to_string();
        let url = format!("memory://audio/{key}");
        self.blobs
            .lock()
            .map_err(|e| anyhow!("storage lock poisoned: {e}"))?
            .insert(key, (data, mime_type.to_string()));
        Ok(url)
    }
}
