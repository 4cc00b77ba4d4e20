use super::*;
use crate::model::{ChannelType, Envelope, MessageCategory, User, UserType};

fn make_envelope(text: &str) -> Envelope {
    let mut env = Envelope::outgoing(
        ChannelType::Whatsapp,
        MessageCategory::UserToBot,
        User::new("919999000001", UserType::Regular, "en"),
    );
    env.source_text = Some(text.to_string());
    env
}

#[tokio::test]
async fn enqueue_then_dequeue() {
    let queue = InMemoryQueue::default();
    queue
        .enqueue(Topic::Messages, make_envelope("hello"))
        .await
        .unwrap();

    let batch = queue.dequeue_batch(Topic::Messages, 10).await.unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].attempt, 1);
    assert_eq!(batch[0].envelope.source_text.as_deref(), Some("hello"));
}

#[tokio::test]
async fn leased_items_are_invisible() {
    let queue = InMemoryQueue::default();
    queue
        .enqueue(Topic::Messages, make_envelope("one"))
        .await
        .unwrap();

    let first = queue.dequeue_batch(Topic::Messages, 10).await.unwrap();
    assert_eq!(first.len(), 1);
    let second = queue.dequeue_batch(Topic::Messages, 10).await.unwrap();
    assert!(second.is_empty());
}

#[tokio::test]
async fn ack_removes_item() {
    let queue = InMemoryQueue::new(Duration::from_millis(1));
    queue
        .enqueue(Topic::Messages, make_envelope("done"))
        .await
        .unwrap();

    let batch = queue.dequeue_batch(Topic::Messages, 1).await.unwrap();
    queue.ack(Topic::Messages, batch[0].id).await.unwrap();

    tokio::time::sleep(Duration::from_millis(5)).await;
    let redelivered = queue.dequeue_batch(Topic::Messages, 10).await.unwrap();
    assert!(redelivered.is_empty());
}

#[tokio::test]
async fn nack_redelivers_with_bumped_attempt() {
    let queue = InMemoryQueue::default();
    queue
        .enqueue(Topic::Messages, make_envelope("retry me"))
        .await
        .unwrap();

    let batch = queue.dequeue_batch(Topic::Messages, 1).await.unwrap();
    queue.nack(Topic::Messages, batch[0].id).await.unwrap();

    let redelivered = queue.dequeue_batch(Topic::Messages, 1).await.unwrap();
    assert_eq!(redelivered.len(), 1);
    assert_eq!(redelivered[0].attempt, 2);
    assert_eq!(redelivered[0].id, batch[0].id);
}

#[tokio::test]
async fn expired_lease_is_redelivered() {
    let queue = InMemoryQueue::new(Duration::from_millis(1));
    queue
        .enqueue(Topic::Messages, make_envelope("crashed consumer"))
        .await
        .unwrap();

    let batch = queue.dequeue_batch(Topic::Messages, 1).await.unwrap();
    assert_eq!(batch.len(), 1);

    tokio::time::sleep(Duration::from_millis(5)).await;
    let redelivered = queue.dequeue_batch(Topic::Messages, 1).await.unwrap();
    assert_eq!(redelivered.len(), 1);
    assert_eq!(redelivered[0].attempt, 2);
}

#[tokio::test]
async fn park_moves_to_dead_letter() {
    let queue = InMemoryQueue::default();
    queue
        .enqueue(Topic::Messages, make_envelope("poison"))
        .await
        .unwrap();

    let batch = queue.dequeue_batch(Topic::Messages, 1).await.unwrap();
    queue.park(Topic::Messages, batch[0].id).await.unwrap();

    assert!(queue
        .dequeue_batch(Topic::Messages, 10)
        .await
        .unwrap()
        .is_empty());
    let parked = queue.parked(Topic::Messages);
    assert_eq!(parked.len(), 1);
    assert_eq!(parked[0].source_text.as_deref(), Some("poison"));
}

#[tokio::test]
async fn topics_are_isolated() {
    let queue = InMemoryQueue::default();
    queue
        .enqueue(Topic::Messages, make_envelope("inbound"))
        .await
        .unwrap();
    queue
        .enqueue(Topic::Outbound, make_envelope("outbound"))
        .await
        .unwrap();

    assert_eq!(queue.depth(Topic::Messages), 1);
    assert_eq!(queue.depth(Topic::Outbound), 1);
    assert_eq!(queue.depth(Topic::Receipts), 0);

    let inbound = queue.dequeue_batch(Topic::Messages, 10).await.unwrap();
    assert_eq!(inbound.len(), 1);
    assert_eq!(inbound[0].envelope.source_text.as_deref(), Some("inbound"));
}
