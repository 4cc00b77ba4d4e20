use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub app: AppConfig,
    /// Channel ids of the expert pool. Verification requests go to the first
    /// entry; the rest are recognized as experts when they write in.
    pub experts: Vec<String>,
    pub reminder: ReminderConfig,
    pub channels: ChannelsConfig,
    pub services: ServicesConfig,
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Parallel pipeline workers per topic.
    pub workers: usize,
    /// Max deliveries leased per poll.
    pub batch_size: usize,
    /// Deliveries per message before it is parked as poison.
    pub retry_ceiling: u32,
    /// Knowledge-base chunks fetched per question.
    pub retrieval_k: usize,
    /// Working language of the pipeline.
    pub default_language: String,
    pub bind_addr: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workers: 2,
            batch_size: 8,
            retry_ceiling: 5,
            retrieval_k: 3,
            default_language: "en".to_string(),
            bind_addr: "0.0.0.0:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReminderConfig {
    pub enabled: bool,
    /// A Waiting verification with no activity for this long gets a nudge.
    pub threshold_secs: u64,
    /// How often the scheduler scans for due records.
    pub interval_secs: u64,
}

impl Default for ReminderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold_secs: 24 * 60 * 60,
            interval_secs: 15 * 60,
        }
    }
}

impl ReminderConfig {
    pub fn threshold(&self) -> Duration {
        Duration::from_secs(self.threshold_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelsConfig {
    pub whatsapp: Option<WhatsappChannelConfig>,
    pub qikchat: Option<QikchatChannelConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhatsappChannelConfig {
    pub phone_number_id: String,
    pub access_token: String,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QikchatChannelConfig {
    pub api_key: String,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServicesConfig {
    pub translator_url: String,
    pub speech_url: String,
    pub retriever_url: String,
    pub generator_url: String,
    pub timeout_secs: u64,
}

impl Default for ServicesConfig {
    fn default() -> Self {
        Self {
            translator_url: "http://127.0.0.1:9101".to_string(),
            speech_url: "http://127.0.0.1:9102".to_string(),
            retriever_url: "http://127.0.0.1:9103".to_string(),
            generator_url: "http://127.0.0.1:9104".to_string(),
            timeout_secs: 30,
        }
    }
}

impl ServicesConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the SQLite databases.
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: "data".to_string(),
        }
    }
}
