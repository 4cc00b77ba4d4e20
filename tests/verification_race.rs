mod common;

use common::{harness, FakeGenerator};
use veribot::bus::{MessageQueue, Topic};
use veribot::model::{
    ChannelType, Envelope, MessageCategory, ReplyContext, User, UserType, VerificationRecord,
    VerificationStatus,
};
use veribot::pipeline::{Consumer, OutboundWorker};
use veribot::store::{InMemoryMessageStore, MessageRecord, MessageStore};

fn expert_reply(channel_id: &str, id: &str, text: &str, reply_to: &str) -> Envelope {
    let mut env = Envelope::outgoing(
        ChannelType::Whatsapp,
        MessageCategory::UserToBot,
        User::new(channel_id, UserType::Expert, "en"),
    );
    env.message_id = id.to_string();
    env.source_text = Some(text.to_string());
    env.reply = Some(ReplyContext::to_message(reply_to));
    env
}

#[tokio::test]
async fn first_expert_reply_wins_second_is_a_noop() {
    let h = harness(
        FakeGenerator {
            answer: "Take 10mg daily.".to_string(),
            needs_verification: true,
        },
        vec!["expert-1", "expert-2"],
    )
    .await;

    let mut question = Envelope::outgoing(
        ChannelType::Whatsapp,
        MessageCategory::UserToBot,
        User::new("919999000001", UserType::Regular, "en"),
    );
    question.message_id = "q-1".to_string();
    question.source_text = Some("What is the dose?".to_string());
    h.queue.enqueue(Topic::Messages, question).await.unwrap();

    let consumer = Consumer::new(h.ctx.clone());
    consumer.poll_once().await.unwrap();
    let outbound = OutboundWorker::new(h.ctx.clone());
    outbound.poll_outbound().await.unwrap();

    let (_, expert_channel_id) = h
        .channel
        .sent_messages()
        .into_iter()
        .find(|(m, _)| m.to == "expert-1")
        .unwrap();

    // Two experts resolve the same record in the same batch: an approval
    // and a rejection.
    h.queue
        .enqueue(
            Topic::Messages,
            expert_reply("expert-1", "er-1", "Yes", &expert_channel_id),
        )
        .await
        .unwrap();
    h.queue
        .enqueue(
            Topic::Messages,
            expert_reply("expert-2", "er-2", "No", &expert_channel_id),
        )
        .await
        .unwrap();

    consumer.poll_once().await.unwrap();
    outbound.poll_outbound().await.unwrap();

    // The first reply resolved the record; the rejection lost the race.
    let verification = h
        .messages
        .get(&expert_channel_id)
        .await
        .unwrap()
        .unwrap()
        .verification
        .unwrap();
    assert_eq!(verification.status, VerificationStatus::Verified);

    // Exactly one final answer reached the user (plus the first delivery).
    let to_user = h.channel.sent_to("919999000001");
    assert_eq!(to_user.len(), 2);
    assert_eq!(to_user[1].reply_to.as_deref(), Some("q-1"));

    // The losing expert was told the question is already resolved.
    let to_loser = h.channel.sent_to("expert-2");
    assert_eq!(to_loser.len(), 1);
    assert!(to_loser[0].body.contains("already resolved"));
}

#[tokio::test]
async fn concurrent_transitions_apply_exactly_once() {
    let store = InMemoryMessageStore::default();
    let mut env = Envelope::outgoing(
        ChannelType::Whatsapp,
        MessageCategory::BotToExpertVerification,
        User::new("expert-1", UserType::Expert, "en"),
    );
    env.message_id = "expert-msg-1".to_string();
    store
        .insert(&MessageRecord::with_verification(
            env,
            VerificationRecord::waiting("expert-msg-1", "q-1", "draft"),
        ))
        .await
        .unwrap();

    let (approve, reject) = tokio::join!(
        store.transition_verification(
            "expert-msg-1",
            VerificationStatus::Waiting,
            VerificationStatus::Verified,
            None,
            "expert-1",
        ),
        store.transition_verification(
            "expert-msg-1",
            VerificationStatus::Waiting,
            VerificationStatus::Rejected,
            None,
            "expert-2",
        ),
    );
    let approve = approve.unwrap();
    let reject = reject.unwrap();
    assert!(approve ^ reject, "exactly one transition must win");

    let verification = store
        .get("expert-msg-1")
        .await
        .unwrap()
        .unwrap()
        .verification
        .unwrap();
    assert!(verification.status.is_terminal());
    let winner = if approve { "expert-1" } else { "expert-2" };
    assert_eq!(verification.resolved_by.as_deref(), Some(winner));
}
