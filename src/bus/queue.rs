use crate::errors::VeribotResult;
use crate::model::Envelope;
use anyhow::anyhow;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Default visibility window before an un-acked delivery is handed out again.
const DEFAULT_VISIBILITY: Duration = Duration::from_secs(60);

/// One logical topic per message category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    /// Regular inbound messages (user questions, expert replies).
    Messages,
    /// Delivery/read receipts.
    Receipts,
    /// Outbound channel sends.
    Outbound,
}

impl Topic {
    pub fn as_str(self) -> &'static str {
        match self {
            Topic::Messages => "messages",
            Topic::Receipts => "receipts",
            Topic::Outbound => "outbound",
        }
    }
}

/// One leased queue item. `attempt` counts deliveries, starting at 1; the
/// consumer uses it to enforce the poison-message ceiling.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub id: u64,
    pub attempt: u32,
    pub envelope: Envelope,
}

/// At-least-once queue contract. A consumer crash (or explicit nack) before
/// ack causes redelivery, so every state-mutating consumer must be idempotent
/// per message id.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    async fn enqueue(&self, topic: Topic, envelope: Envelope) -> VeribotResult<()>;

    /// Lease up to `max` items. Leased items invisible to other consumers
    /// until acked, nacked, or their visibility window lapses.
    async fn dequeue_batch(&self, topic: Topic, max: usize) -> VeribotResult<Vec<Delivery>>;

    async fn ack(&self, topic: Topic, delivery_id: u64) -> VeribotResult<()>;

    /// Return a leased item for immediate redelivery.
    async fn nack(&self, topic: Topic, delivery_id: u64) -> VeribotResult<()>;

    /// Remove a poison message from rotation. Parked items are acked and kept
    /// on a dead-letter list for inspection, never retried.
    async fn park(&self, topic: Topic, delivery_id: u64) -> VeribotResult<()>;
}

struct Leased {
    attempt: u32,
    envelope: Envelope,
    deadline: Instant,
}

#[derive(Default)]
struct TopicState {
    ready: VecDeque<(u64, u32, Envelope)>,
    leased: HashMap<u64, Leased>,
    parked: Vec<Envelope>,
}

impl TopicState {
    /// Move expired leases back to the ready queue with a bumped attempt.
    fn reclaim(&mut self, now: Instant) {
        let expired: Vec<u64> = self
            .leased
            .iter()
            .filter(|(_, l)| l.deadline <= now)
            .map(|(id, _)| *id)
            .collect();
        for id in expired {
            if let Some(lease) = self.leased.remove(&id) {
                debug!("queue lease {} expired, redelivering", id);
                self.ready
                    .push_back((id, lease.attempt + 1, lease.envelope));
            }
        }
    }
}

/// In-process queue with lease-based redelivery. The trait is the seam for a
/// durable provider; this implementation backs tests and single-node runs.
pub struct InMemoryQueue {
    topics: Mutex<HashMap<Topic, TopicState>>,
    visibility: Duration,
    next_id: AtomicU64,
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new(DEFAULT_VISIBILITY)
    }
}

impl InMemoryQueue {
    pub fn new(visibility: Duration) -> Self {
        Self {
            topics: Mutex::new(HashMap::new()),
            visibility,
            next_id: AtomicU64::new(1),
        }
    }

    /// Dead-letter contents of a topic, for observability and tests.
    pub fn parked(&self, topic: Topic) -> Vec<Envelope> {
        let topics = self.topics.lock().expect("queue lock poisoned");
        topics
            .get(&topic)
            .map(|t| t.parked.clone())
            .unwrap_or_default()
    }

    /// Items currently waiting in a topic (not leased, not parked).
    pub fn depth(&self, topic: Topic) -> usize {
        let topics = self.topics.lock().expect("queue lock poisoned");
        topics.get(&topic).map_or(0, |t| t.ready.len())
    }
}

#[async_trait]
impl MessageQueue for InMemoryQueue {
    async fn enqueue(&self, topic: Topic, envelope: Envelope) -> VeribotResult<()> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut topics = self
            .topics
            .lock()
            .map_err(|e| anyhow!("queue lock poisoned: {e}"))?;
        let state = topics.entry(topic).or_default();
        state.ready.push_back((id, 1, envelope));
        debug!("enqueued item {} on {}", id, topic.as_str());
        Ok(())
    }

    async fn dequeue_batch(&self, topic: Topic, max: usize) -> VeribotResult<Vec<Delivery>> {
        let now = Instant::now();
        let mut topics = self
            .topics
            .lock()
            .map_err(|e| anyhow!("queue lock poisoned: {e}"))?;
        let state = topics.entry(topic).or_default();
        state.reclaim(now);

        let mut batch = Vec::new();
        while batch.len() < max {
            let Some((id, attempt, envelope)) = state.ready.pop_front() else {
                break;
            };
            state.leased.insert(
                id,
                Leased {
                    attempt,
                    envelope: envelope.clone(),
                    deadline: now + self.visibility,
                },
            );
            batch.push(Delivery {
                id,
                attempt,
                envelope,
            });
        }
        Ok(batch)
    }

    async fn ack(&self, topic: Topic, delivery_id: u64) -> VeribotResult<()> {
        let mut topics = self
            .topics
            .lock()
            .map_err(|e| anyhow!("queue lock poisoned: {e}"))?;
        if let Some(state) = topics.get_mut(&topic) {
            state.leased.remove(&delivery_id);
        }
        Ok(())
    }

    async fn nack(&self, topic: Topic, delivery_id: u64) -> VeribotResult<()> {
        let mut topics = self
            .topics
            .lock()
            .map_err(|e| anyhow!("queue lock poisoned: {e}"))?;
        if let Some(state) = topics.get_mut(&topic) {
            if let Some(lease) = state.leased.remove(&delivery_id) {
                state
                    .ready
                    .push_back((delivery_id, lease.attempt + 1, lease.envelope));
            }
        }
        Ok(())
    }

    async fn park(&self, topic: Topic, delivery_id: u64) -> VeribotResult<()> {
        let mut topics = self
            .topics
            .lock()
            .map_err(|e| anyhow!("queue lock poisoned: {e}"))?;
        if let Some(state) = topics.get_mut(&topic) {
            if let Some(lease) = state.leased.remove(&delivery_id) {
                warn!(
                    "parking poison message {} on {} after {} attempts",
                    lease.envelope.message_id,
                    topic.as_str(),
                    lease.attempt
                );
                state.parked.push(lease.envelope);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
