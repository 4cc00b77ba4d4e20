use crate::bus::{Delivery, Topic};
use crate::channels::ChannelMessage;
use crate::errors::{VeribotError, VeribotResult};
use crate::pipeline::PipelineContext;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const IDLE_POLL: Duration = Duration::from_millis(500);

/// Worker over the Outbound and Receipts topics. Puts envelopes on the wire
/// and rekeys stored messages to the channel-assigned ids, so later replies
/// resolve no matter which id the other side echoes back.
pub struct OutboundWorker {
    ctx: Arc<PipelineContext>,
    running: Arc<AtomicBool>,
}

impl OutboundWorker {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        Self {
            ctx,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub async fn run(self: Arc<Self>) {
        self.running.store(true, Ordering::SeqCst);
        info!("outbound worker started");
        while self.running.load(Ordering::SeqCst) {
            let sent = self.poll_outbound().await.unwrap_or_else(|e| {
                error!("outbound poll failed: {}", e);
                0
            });
            let receipts = self.poll_receipts().await.unwrap_or_else(|e| {
                error!("receipt poll failed: {}", e);
                0
            });
            if sent == 0 && receipts == 0 {
                tokio::time::sleep(IDLE_POLL).await;
            }
        }
        info!("outbound worker stopped");
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Drain one batch of sends. Exposed for deterministic tests.
    pub async fn poll_outbound(&self) -> VeribotResult<usize> {
        let batch = self
            .ctx
            .queue
            .dequeue_batch(Topic::Outbound, self.ctx.config.app.batch_size)
            .await?;
        let pulled = batch.len();
        for delivery in batch {
            self.send_one(delivery).await?;
        }
        Ok(pulled)
    }

    async fn send_one(&self, delivery: Delivery) -> VeribotResult<()> {
        let envelope = &delivery.envelope;
        let outcome = async {
            let client = self.ctx.channels.get(envelope.channel).await?;
            let receipt = client.send(&ChannelMessage::from_envelope(envelope)).await?;
            // The channel owns the id from here on; rekey our record so
            // reply lookups keep resolving.
            if !self
                .ctx
                .messages
                .remap(&envelope.message_id, &receipt.message_id)
                .await?
            {
                debug!("no stored record to remap for {}", envelope.message_id);
            }
            debug!(
                "sent {} as {} on {}",
                envelope.message_id, receipt.message_id, envelope.channel
            );
            Ok(())
        }
        .await;

        match outcome {
            Ok(()) => self.ctx.queue.ack(Topic::Outbound, delivery.id).await,
            Err(e) => self.retry_or_park(Topic::Outbound, delivery, e).await,
        }
    }

    /// Acknowledge read/delivery statuses from the channel. Status payloads
    /// carry no content to process, so the topic only needs draining with a
    /// trace for observability.
    pub async fn poll_receipts(&self) -> VeribotResult<usize> {
        let batch = self
            .ctx
            .queue
            .dequeue_batch(Topic::Receipts, self.ctx.config.app.batch_size)
            .await?;
        let pulled = batch.len();
        for delivery in batch {
            debug!(
                "message {} read by {}",
                delivery.envelope.message_id, delivery.envelope.user.channel_id
            );
            self.ctx.queue.ack(Topic::Receipts, delivery.id).await?;
        }
        Ok(pulled)
    }

    async fn retry_or_park(
        &self,
        topic: Topic,
        delivery: Delivery,
        error: VeribotError,
    ) -> VeribotResult<()> {
        if error.is_retryable() && delivery.attempt < self.ctx.config.app.retry_ceiling {
            warn!(
                "send attempt {}/{} for {} failed: {}",
                delivery.attempt,
                self.ctx.config.app.retry_ceiling,
                delivery.envelope.message_id,
                error
            );
            self.ctx.queue.nack(topic, delivery.id).await
        } else {
            error!(
                "parking outbound {} after {} attempt(s): {}",
                delivery.envelope.message_id, delivery.attempt, error
            );
            self.ctx.queue.park(topic, delivery.id).await
        }
    }
}
