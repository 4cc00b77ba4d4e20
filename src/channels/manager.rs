use crate::channels::base::ChannelClient;
use crate::channels::{QikchatClient, WhatsappClient};
use crate::config::ChannelsConfig;
use crate::errors::{VeribotError, VeribotResult};
use crate::model::ChannelType;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::info;

/// Lazily-built registry of channel clients, one per platform. Tests preload
/// fakes instead of letting the manager construct real clients.
pub struct ChannelManager {
    config: ChannelsConfig,
    timeout: Duration,
    clients: Mutex<HashMap<ChannelType, Arc<dyn ChannelClient>>>,
}

impl ChannelManager {
    pub fn new(config: ChannelsConfig, timeout: Duration) -> Self {
        Self {
            config,
            timeout,
            clients: Mutex::new(HashMap::new()),
        }
    }

    /// Install a client for a channel ahead of time. Used by tests and by
    /// deployments wiring custom transports.
    pub async fn preload(&self, channel: ChannelType, client: Arc<dyn ChannelClient>) {
        self.clients.lock().await.insert(channel, client);
    }

    pub async fn get(&self, channel: ChannelType) -> VeribotResult<Arc<dyn ChannelClient>> {
        let mut clients = self.clients.lock().await;
        if let Some(client) = clients.get(&channel) {
            return Ok(client.clone());
        }
        let client = self.build(channel)?;
        info!("initialized {} channel client", channel);
        clients.insert(channel, client.clone());
        Ok(client)
    }

    fn build(&self, channel: ChannelType) -> VeribotResult<Arc<dyn ChannelClient>> {
        match channel {
            ChannelType::Whatsapp => {
                let cfg = self.config.whatsapp.as_ref().ok_or_else(|| {
                    VeribotError::Config("whatsapp channel is not configured".to_string())
                })?;
                Ok(Arc::new(WhatsappClient::new(
                    cfg.phone_number_id.clone(),
                    cfg.access_token.clone(),
                    cfg.base_url.clone(),
                    self.timeout,
                )?))
            }
            ChannelType::Qikchat => {
                let cfg = self.config.qikchat.as_ref().ok_or_else(|| {
                    VeribotError::Config("qikchat channel is not configured".to_string())
                })?;
                Ok(Arc::new(QikchatClient::new(
                    cfg.api_key.clone(),
                    cfg.base_url.clone(),
                    self.timeout,
                )?))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::base::{ChannelMessage, MediaDownload, SendReceipt};
    use async_trait::async_trait;

    struct NullClient;

    #[async_trait]
    impl ChannelClient for NullClient {
        fn name(&self) -> &str {
            "null"
        }
        async fn send(&self, _message: &ChannelMessage) -> VeribotResult<SendReceipt> {
            Ok(SendReceipt {
                message_id: "null-1".to_string(),
            })
        }
        async fn download_media(&self, _media_id: &str) -> VeribotResult<MediaDownload> {
            Ok(MediaDownload {
                data: Vec::new(),
                mime_type: "audio/ogg".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn preloaded_client_wins_over_config() {
        let manager = ChannelManager::new(ChannelsConfig::default(), Duration::from_secs(5));
        manager
            .preload(ChannelType::Whatsapp, Arc::new(NullClient))
            .await;
        let client = manager.get(ChannelType::Whatsapp).await.unwrap();
        assert_eq!(client.name(), "null");
    }

    #[tokio::test]
    async fn unconfigured_channel_is_a_config_error() {
        let manager = ChannelManager::new(ChannelsConfig::default(), Duration::from_secs(5));
        let err = manager.get(ChannelType::Qikchat).await.err().unwrap();
        assert!(matches!(err, VeribotError::Config(_)));
    }
}
