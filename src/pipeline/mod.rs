//! The message consumer pipeline: ordered stage chains over queue batches.

pub mod consumer;
pub mod dispatch;
pub mod generate;
pub mod outbound;
pub mod process;
pub mod stage;
pub mod verify;

pub use consumer::Consumer;
pub use outbound::OutboundWorker;
pub use stage::{Chain, Stage, StageOutcome};

use crate::bus::MessageQueue;
use crate::channels::ChannelManager;
use crate::config::Config;
use crate::services::{Generator, MediaStorage, Retriever, SpeechEngine, Translator};
use crate::store::{MessageStore, UserStore};
use std::sync::Arc;

/// Everything the stages need, constructed once at startup and passed
/// explicitly. No ambient state.
pub struct PipelineContext {
    pub config: Config,
    pub queue: Arc<dyn MessageQueue>,
    pub users: Arc<dyn UserStore>,
    pub messages: Arc<dyn MessageStore>,
    pub channels: Arc<ChannelManager>,
    pub translator: Arc<dyn Translator>,
    pub speech: Arc<dyn SpeechEngine>,
    pub retriever: Arc<dyn Retriever>,
    pub generator: Arc<dyn Generator>,
    pub media: Arc<dyn MediaStorage>,
}

impl PipelineContext {
    /// Verification requests go to the first configured expert.
    pub fn primary_expert(&self) -> Option<&str> {
        self.config.experts.first().map(String::as_str)
    }

    pub fn is_expert(&self, channel_id: &str) -> bool {
        self.config.experts.iter().any(|e| e == channel_id)
    }

    /// Working language of retrieval and generation.
    pub fn working_language(&self) -> &str {
        &self.config.app.default_language
    }
}
