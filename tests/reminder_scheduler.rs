mod common;

use chrono::{Duration, Utc};
use common::{harness, FakeGenerator};
use veribot::bus::Topic;
use veribot::model::{
    ChannelType, Envelope, MessageCategory, ReplyContext, User, UserType, VerificationRecord,
};
use veribot::pipeline::OutboundWorker;
use veribot::scheduler::ReminderScheduler;
use veribot::store::{MessageRecord, MessageStore};

async fn seed_waiting(h: &common::TestHarness, id: &str, age_hours: i64) {
    let mut env = Envelope::outgoing(
        ChannelType::Whatsapp,
        MessageCategory::BotToExpertVerification,
        User::new("expert-1", UserType::Expert, "en"),
    );
    env.message_id = id.to_string();
    env.reply = Some(ReplyContext {
        reply_id: "q-1".to_string(),
        reply_english_text: Some("What is the dose?".to_string()),
        reply_payload: veribot::model::MessagePayload::Empty,
    });

    let mut verification = VerificationRecord::waiting(id, "q-1", "draft answer");
    verification.waiting_at = Some(Utc::now() - Duration::hours(age_hours));
    h.messages
        .insert(&MessageRecord::with_verification(env, verification))
        .await
        .unwrap();
}

#[tokio::test]
async fn overdue_waiting_record_gets_one_reminder() {
    let h = harness(
        FakeGenerator {
            answer: "unused".to_string(),
            needs_verification: true,
        },
        vec!["expert-1"],
    )
    .await;
    // Default threshold is 24h; 48h old is overdue.
    seed_waiting(&h, "expert-msg-1", 48).await;

    let scheduler = ReminderScheduler::new(h.ctx.clone());
    let report = scheduler.run_once().await.unwrap();
    assert_eq!(report.reminded, vec!["expert-msg-1".to_string()]);

    // Immediate re-run: the stamp from the first pass makes nothing due.
    let report = scheduler.run_once().await.unwrap();
    assert!(report.reminded.is_empty());

    let outbound = OutboundWorker::new(h.ctx.clone());
    outbound.poll_outbound().await.unwrap();
    let to_expert = h.channel.sent_to("expert-1");
    assert_eq!(to_expert.len(), 1);
    assert!(to_expert[0].body.contains("still waiting"));
    assert!(to_expert[0].body.contains("What is the dose?"));
}

#[tokio::test]
async fn fresh_waiting_record_is_not_due() {
    let h = harness(
        FakeGenerator {
            answer: "unused".to_string(),
            needs_verification: true,
        },
        vec!["expert-1"],
    )
    .await;
    seed_waiting(&h, "expert-msg-1", 1).await;

    let scheduler = ReminderScheduler::new(h.ctx.clone());
    let report = scheduler.run_once().await.unwrap();
    assert!(report.reminded.is_empty());
    assert_eq!(h.queue.depth(Topic::Outbound), 0);
}
