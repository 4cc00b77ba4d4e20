use crate::bus::Topic;
use crate::errors::VeribotResult;
use crate::model::{Envelope, MessageCategory};
use crate::pipeline::PipelineContext;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info};

/// Which records one scan acted on.
#[derive(Debug, Default)]
pub struct ReminderReport {
    pub reminded: Vec<String>,
}

/// Periodically nudges the expert pool about verifications that have sat in
/// Waiting past the configured threshold. Each scan is idempotent: acting on
/// a record stamps it, so an immediate re-run finds nothing due.
pub struct ReminderScheduler {
    ctx: Arc<PipelineContext>,
    running: Arc<AtomicBool>,
}

impl ReminderScheduler {
    pub fn new(ctx: Arc<PipelineContext>) -> Self {
        Self {
            ctx,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub async fn run(self: Arc<Self>) {
        if !self.ctx.config.reminder.enabled {
            info!("reminder scheduler disabled");
            return;
        }
        self.running.store(true, Ordering::SeqCst);
        info!(
            "reminder scheduler started, interval {}s, threshold {}s",
            self.ctx.config.reminder.interval_secs, self.ctx.config.reminder.threshold_secs
        );
        while self.running.load(Ordering::SeqCst) {
            tokio::time::sleep(self.ctx.config.reminder.interval()).await;
            match self.run_once().await {
                Ok(report) if report.reminded.is_empty() => {}
                Ok(report) => info!("reminded experts about {} record(s)", report.reminded.len()),
                Err(e) => error!("reminder scan failed: {}", e),
            }
        }
        info!("reminder scheduler stopped");
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// One scan. Safe to call at any interval, including back to back.
    pub async fn run_once(&self) -> VeribotResult<ReminderReport> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.ctx.config.reminder.threshold())
                .unwrap_or_else(|_| chrono::Duration::hours(24));
        let due = self.ctx.messages.due_for_reminder(cutoff).await?;

        let mut report = ReminderReport::default();
        for record in due {
            let expert_message_id = record.envelope.message_id.clone();
            let question = record
                .envelope
                .reply
                .as_ref()
                .and_then(|r| r.reply_english_text.clone())
                .unwrap_or_else(|| "a pending question".to_string());

            let mut reminder = Envelope::outgoing(
                record.envelope.channel,
                MessageCategory::BotToExpert,
                record.envelope.user.clone(),
            );
            reminder.english_text = Some(format!(
                "Reminder: a verification request is still waiting for your review.\n\nQuestion: {question}"
            ));
            self.ctx.queue.enqueue(Topic::Outbound, reminder).await?;
            self.ctx
                .messages
                .mark_reminded(&expert_message_id, Utc::now())
                .await?;
            report.reminded.push(expert_message_id);
        }
        Ok(report)
    }
}
