use crate::bus::{Delivery, Topic};
use crate::errors::{VeribotError, VeribotResult};
use crate::model::{Envelope, MessageCategory, User, UserType};
use crate::pipeline::dispatch::DispatchStage;
use crate::pipeline::generate::GenerateStage;
use crate::pipeline::process::ProcessStage;
use crate::pipeline::stage::Chain;
use crate::pipeline::verify::VerifyStage;
use crate::pipeline::PipelineContext;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const IDLE_POLL: Duration = Duration::from_millis(500);

/// Worker over the Messages topic. Classifies each delivery, enriches its
/// reply context from the store, and runs it through the matching stage
/// chain with ack/nack/park semantics.
pub struct Consumer {
    ctx: Arc<PipelineContext>,
    user_chain: Chain,
    expert_chain: Chain,
    running: Arc<AtomicBool>,
}

impl Consumer {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        let user_chain = Chain::new(vec![
            Box::new(ProcessStage),
            Box::new(GenerateStage),
            Box::new(VerifyStage),
            Box::new(DispatchStage),
        ]);
        let expert_chain = Chain::new(vec![
            Box::new(ProcessStage),
            Box::new(VerifyStage),
            Box::new(DispatchStage),
        ]);
        Self {
            ctx,
            user_chain,
            expert_chain,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub async fn run(self: Arc<Self>) {
        self.running.store(true, Ordering::SeqCst);
        info!("consumer started");
        while self.running.load(Ordering::SeqCst) {
            match self.poll_once().await {
                Ok(0) => tokio::time::sleep(IDLE_POLL).await,
                Ok(n) => debug!("processed {} delivery(ies)", n),
                Err(e) => {
                    error!("consumer poll failed: {}", e);
                    tokio::time::sleep(IDLE_POLL).await;
                }
            }
        }
        info!("consumer stopped");
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// One batch, processed to completion. Returns how many deliveries were
    /// pulled. Exposed so tests can drive the pipeline deterministically.
    pub async fn poll_once(&self) -> VeribotResult<usize> {
        let batch = self
            .ctx
            .queue
            .dequeue_batch(Topic::Messages, self.ctx.config.app.batch_size)
            .await?;
        let pulled = batch.len();
        for delivery in batch {
            self.settle(delivery).await?;
        }
        Ok(pulled)
    }

    async fn settle(&self, delivery: Delivery) -> VeribotResult<()> {
        let id = delivery.id;
        match self.handle(delivery.envelope.clone()).await {
            Ok(()) => self.ctx.queue.ack(Topic::Messages, id).await,
            Err(VeribotError::Validation(reason)) => {
                // Malformed input never gets better; drop it with a trace.
                warn!("dropping message {}: {}", delivery.envelope.message_id, reason);
                self.ctx.queue.ack(Topic::Messages, id).await
            }
            Err(VeribotError::StateConflict(reason)) => {
                debug!("state conflict on {}: {}", delivery.envelope.message_id, reason);
                self.ctx.queue.ack(Topic::Messages, id).await
            }
            Err(e) if e.is_retryable() && delivery.attempt < self.ctx.config.app.retry_ceiling => {
                warn!(
                    "attempt {}/{} for {} failed: {}",
                    delivery.attempt,
                    self.ctx.config.app.retry_ceiling,
                    delivery.envelope.message_id,
                    e
                );
                self.ctx.queue.nack(Topic::Messages, id).await
            }
            Err(e) => {
                error!(
                    "parking {} after {} attempt(s): {}",
                    delivery.envelope.message_id, delivery.attempt, e
                );
                self.ctx.queue.park(Topic::Messages, id).await
            }
        }
    }

    async fn handle(&self, mut envelope: Envelope) -> VeribotResult<()> {
        self.ingest(&mut envelope).await?;
        self.enrich_reply(&mut envelope).await?;

        if envelope.category == MessageCategory::ExpertToBot {
            self.expert_chain.run(vec![envelope], &self.ctx).await
        } else {
            self.user_chain.run(vec![envelope], &self.ctx).await
        }
    }

    /// Resolve the sender against the user store and fix the message
    /// category. The category is assigned exactly once, here, before any
    /// stage runs.
    async fn ingest(&self, envelope: &mut Envelope) -> VeribotResult<()> {
        let channel_id = envelope.user.channel_id.clone();
        let expert = self.ctx.is_expert(&channel_id);

        let user = match self.ctx.users.get(&channel_id).await? {
            Some(mut known) => {
                if expert && !known.is_expert() {
                    known.user_type = UserType::Expert;
                }
                known
            }
            None => {
                let user_type = if expert { UserType::Expert } else { UserType::Regular };
                let user = User::new(
                    channel_id,
                    user_type,
                    self.ctx.config.app.default_language.clone(),
                );
                self.ctx.users.upsert(&user).await?;
                user
            }
        };
        envelope.user = user;
        envelope.category = if envelope.user.is_expert() {
            MessageCategory::ExpertToBot
        } else {
            MessageCategory::UserToBot
        };
        Ok(())
    }

    /// Copy the threaded-to message's text and payload into the reply
    /// context, so stages can act on what is being replied to without
    /// another lookup.
    async fn enrich_reply(&self, envelope: &mut Envelope) -> VeribotResult<()> {
        let Some(reply) = envelope.reply.as_mut() else {
            return Ok(());
        };
        if let Some(record) = self.ctx.messages.get(&reply.reply_id).await? {
            reply.reply_english_text = record.envelope.text().map(str::to_string);
            reply.reply_payload = record.envelope.payload.clone();
        }
        Ok(())
    }
}
