//! Shared fakes for the end-to-end pipeline tests.
// Each test binary uses a subset of these helpers.
#![allow(dead_code)]

use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use veribot::bus::InMemoryQueue;
use veribot::channels::{
    ChannelClient, ChannelManager, ChannelMessage, MediaDownload, SendReceipt,
};
use veribot::config::{ChannelsConfig, Config};
use veribot::errors::{VeribotError, VeribotResult};
use veribot::model::ChannelType;
use veribot::pipeline::PipelineContext;
use veribot::services::{
    Chunk, Draft, Generator, InMemoryMediaStorage, Retriever, SpeechEngine, Translator,
};
use veribot::store::{InMemoryMessageStore, InMemoryUserStore};

/// Identity translator that records which language pairs were requested.
/// Can be armed to fail exactly once, to exercise the redelivery paths.
#[derive(Default)]
pub struct FakeTranslator {
    pub calls: Mutex<Vec<(String, String)>>,
    fail_once_on: Mutex<Option<String>>,
}

impl FakeTranslator {
    /// The next translation whose text contains `needle` fails with a
    /// transient error; every call after that succeeds again.
    pub fn fail_once_on(&self, needle: &str) {
        *self.fail_once_on.lock().unwrap() = Some(needle.to_string());
    }
}

#[async_trait]
impl Translator for FakeTranslator {
    async fn translate(&self, text: &str, source: &str, target: &str) -> VeribotResult<String> {
        {
            let mut armed = self.fail_once_on.lock().unwrap();
            if armed.as_deref().is_some_and(|needle| text.contains(needle)) {
                *armed = None;
                return Err(VeribotError::transient("translator", "request timed out"));
            }
        }
        if source != target {
            self.calls
                .lock()
                .unwrap()
                .push((source.to_string(), target.to_string()));
        }
        Ok(text.to_string())
    }
}

pub struct FakeSpeech {
    pub transcript: String,
    pub tts_calls: Mutex<Vec<String>>,
}

impl FakeSpeech {
    pub fn new(transcript: impl Into<String>) -> Self {
        Self {
            transcript: transcript.into(),
            tts_calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl SpeechEngine for FakeSpeech {
    async fn speech_to_text(&self, _: &[u8], _: &str, _: &str) -> VeribotResult<String> {
        Ok(self.transcript.clone())
    }

    async fn text_to_speech(&self, text: &str, _: &str) -> VeribotResult<Vec<u8>> {
        self.tts_calls.lock().unwrap().push(text.to_string());
        Ok(b"synthesized-audio".to_vec())
    }
}

pub struct FakeRetriever {
    pub chunks: Vec<Chunk>,
}

impl FakeRetriever {
    pub fn with_related(related: Vec<&str>) -> Self {
        Self {
            chunks: vec![Chunk {
                chunk_id: "chunk-1".to_string(),
                text: "Cancer is a disease of uncontrolled cell growth.".to_string(),
                source: "handbook.pdf".to_string(),
                related_questions: related.into_iter().map(str::to_string).collect(),
            }],
        }
    }
}

#[async_trait]
impl Retriever for FakeRetriever {
    async fn retrieve(&self, _: &str, k: usize) -> VeribotResult<Vec<Chunk>> {
        Ok(self.chunks.iter().take(k).cloned().collect())
    }
}

pub struct FakeGenerator {
    pub answer: String,
    pub needs_verification: bool,
}

#[async_trait]
impl Generator for FakeGenerator {
    async fn generate(&self, _: &str, chunks: &[Chunk]) -> VeribotResult<Draft> {
        Ok(Draft {
            answer: self.answer.clone(),
            related_questions: chunks
                .iter()
                .flat_map(|c| c.related_questions.clone())
                .collect(),
            needs_verification: self.needs_verification,
        })
    }
}

/// Records everything sent and hands out channel-style ids, so tests can
/// observe the remap from local ids to channel ids.
#[derive(Default)]
pub struct FakeChannel {
    pub sent: Mutex<Vec<(ChannelMessage, String)>>,
    pub media: Mutex<Vec<String>>,
    next_id: AtomicU64,
}

impl FakeChannel {
    pub fn sent_messages(&self) -> Vec<(ChannelMessage, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, channel_id: &str) -> Vec<ChannelMessage> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m.to == channel_id)
            .map(|(m, _)| m.clone())
            .collect()
    }
}

#[async_trait]
impl ChannelClient for FakeChannel {
    fn name(&self) -> &str {
        "fake"
    }

    async fn send(&self, message: &ChannelMessage) -> VeribotResult<SendReceipt> {
        let id = format!("ch-{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        self.sent
            .lock()
            .unwrap()
            .push((message.clone(), id.clone()));
        Ok(SendReceipt { message_id: id })
    }

    async fn download_media(&self, media_id: &str) -> VeribotResult<MediaDownload> {
        self.media.lock().unwrap().push(media_id.to_string());
        Ok(MediaDownload {
            data: b"ogg-bytes".to_vec(),
            mime_type: "audio/ogg".to_string(),
        })
    }
}

pub struct TestHarness {
    pub ctx: Arc<PipelineContext>,
    pub queue: Arc<InMemoryQueue>,
    pub users: Arc<InMemoryUserStore>,
    pub messages: Arc<InMemoryMessageStore>,
    pub channel: Arc<FakeChannel>,
    pub translator: Arc<FakeTranslator>,
    pub speech: Arc<FakeSpeech>,
    pub media: Arc<InMemoryMediaStorage>,
}

pub async fn harness(generator: FakeGenerator, experts: Vec<&str>) -> TestHarness {
    let mut config = Config::default();
    config.experts = experts.into_iter().map(str::to_string).collect();

    let queue = Arc::new(InMemoryQueue::default());
    let users = Arc::new(InMemoryUserStore::default());
    let messages = Arc::new(InMemoryMessageStore::default());
    let channel = Arc::new(FakeChannel::default());
    let translator = Arc::new(FakeTranslator::default());
    let speech = Arc::new(FakeSpeech::new("What is cancer?"));
    let media = Arc::new(InMemoryMediaStorage::default());

    let channels = Arc::new(ChannelManager::new(
        ChannelsConfig::default(),
        Duration::from_secs(5),
    ));
    channels
        .preload(ChannelType::Whatsapp, channel.clone())
        .await;
    channels.preload(ChannelType::Qikchat, channel.clone()).await;

    let ctx = Arc::new(PipelineContext {
        config,
        queue: queue.clone(),
        users: users.clone(),
        messages: messages.clone(),
        channels,
        translator: translator.clone(),
        speech: speech.clone(),
        retriever: Arc::new(FakeRetriever::with_related(vec![
            "Is cancer contagious?",
            "How is cancer treated?",
        ])),
        generator: Arc::new(generator),
        media: media.clone(),
    });
    TestHarness {
        ctx,
        queue,
        users,
        messages,
        channel,
        translator,
        speech,
        media,
    }
}
