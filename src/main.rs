use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use veribot::bus::InMemoryQueue;
use veribot::channels::ChannelManager;
use veribot::config;
use veribot::pipeline::{Consumer, OutboundWorker, PipelineContext};
use veribot::scheduler::ReminderScheduler;
use veribot::services::{
    HttpGenerator, HttpRetriever, HttpSpeechEngine, HttpTranslator, InMemoryMediaStorage,
};
use veribot::store::{SqliteMessageStore, SqliteUserStore};

#[tokio::main]
async fn main() -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".parse().expect("static filter"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config_path: Option<PathBuf> = std::env::args().nth(1).map(PathBuf::from);
    let config = config::load(config_path.as_deref())?;
    info!("veribot {} starting", veribot::VERSION);

    let timeout = config.services.timeout();
    let store_dir = Path::new(&config.store.path);
    let ctx = Arc::new(PipelineContext {
        queue: Arc::new(InMemoryQueue::default()),
        users: Arc::new(SqliteUserStore::new(store_dir.join("users.db"))?),
        messages: Arc::new(SqliteMessageStore::new(store_dir.join("messages.db"))?),
        channels: Arc::new(ChannelManager::new(config.channels.clone(), timeout)),
        translator: Arc::new(HttpTranslator::new(&config.services.translator_url, timeout)?),
        speech: Arc::new(HttpSpeechEngine::new(&config.services.speech_url, timeout)?),
        retriever: Arc::new(HttpRetriever::new(&config.services.retriever_url, timeout)?),
        generator: Arc::new(HttpGenerator::new(&config.services.generator_url, timeout)?),
        media: Arc::new(InMemoryMediaStorage::default()),
        config,
    });

    let mut consumers = Vec::new();
    for _ in 0..ctx.config.app.workers.max(1) {
        let consumer = Arc::new(Consumer::new(ctx.clone()));
        tokio::spawn(consumer.clone().run());
        consumers.push(consumer);
    }

    let outbound = Arc::new(OutboundWorker::new(ctx.clone()));
    tokio::spawn(outbound.clone().run());

    let scheduler = Arc::new(ReminderScheduler::new(ctx.clone()));
    tokio::spawn(scheduler.clone().run());

    tokio::spawn(veribot::gateway::serve(ctx.clone()));

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    for consumer in &consumers {
        consumer.stop();
    }
    outbound.stop();
    scheduler.stop();
    Ok(())
}
