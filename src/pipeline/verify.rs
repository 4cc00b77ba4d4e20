use crate::errors::{VeribotError, VeribotResult};
use crate::model::{
    Envelope, MessageCategory, MessagePayload, ReplyContext, VerificationRecord,
    VerificationStatus,
};
use crate::pipeline::stage::{Stage, StageOutcome};
use crate::pipeline::PipelineContext;
use crate::store::MessageRecord;
use async_trait::async_trait;
use tracing::{debug, info, warn};

const REJECTED_TEXT: &str =
    "An expert reviewed your question and the earlier answer was not accurate. \
     Please consult your health facility for guidance.";
const ALREADY_ANSWERED_TEXT: &str = "Another expert has already resolved this question. Thank you!";
const THANK_YOU_TEXT: &str = "Thank you, your review has been recorded.";

/// What an expert's free-text reply means for the record it resolves.
enum ExpertDecision {
    Approve,
    Reject,
    /// Anything that is neither an approval nor a rejection is treated as
    /// the expert writing the correct answer themselves.
    Correct(String),
}

fn classify(text: &str) -> ExpertDecision {
    match text.trim().to_lowercase().as_str() {
        "yes" | "y" | "approve" | "approved" | "correct" | "ok" => ExpertDecision::Approve,
        "no" | "n" | "reject" | "rejected" | "wrong" | "incorrect" => ExpertDecision::Reject,
        _ => ExpertDecision::Correct(text.trim().to_string()),
    }
}

/// Owns every verification-record transition. For bot-generated envelopes it
/// persists the records; for expert replies it resolves the matching record
/// with a compare-and-swap and composes the final user-facing answer.
pub struct VerifyStage;

#[async_trait]
impl Stage for VerifyStage {
    fn name(&self) -> &'static str {
        "verify"
    }

    async fn handle(
        &self,
        batch: Vec<Envelope>,
        ctx: &PipelineContext,
    ) -> VeribotResult<StageOutcome> {
        let mut out = Vec::new();
        for envelope in batch {
            match envelope.category {
                MessageCategory::BotToExpertVerification => {
                    self.persist_waiting(&envelope, ctx).await?;
                    out.push(envelope);
                }
                MessageCategory::ExpertToBot => {
                    self.resolve(envelope, ctx, &mut out).await?;
                }
                _ => {
                    ctx.messages.insert(&MessageRecord::new(envelope.clone())).await?;
                    out.push(envelope);
                }
            }
        }
        Ok(StageOutcome::Continue(out))
    }
}

impl VerifyStage {
    /// A new verification request: record it WAITING, keyed by the
    /// expert-facing message's own id. A redelivered request finds its
    /// record already present and leaves it alone, so a resolution an
    /// expert raced in meanwhile is never clobbered back to Waiting.
    async fn persist_waiting(&self, envelope: &Envelope, ctx: &PipelineContext) -> VeribotResult<()> {
        if let Some(existing) = ctx.messages.get(&envelope.message_id).await? {
            if existing.verification.is_some() {
                debug!(
                    "verification record {} already exists, keeping it",
                    envelope.message_id
                );
                return Ok(());
            }
        }
        let original_question_id = envelope.reply_id().ok_or_else(|| {
            VeribotError::Validation(format!(
                "verification request {} has no question reference",
                envelope.message_id
            ))
        })?;
        let MessagePayload::Verification { answer_text, .. } = &envelope.payload else {
            return Err(VeribotError::Validation(format!(
                "verification request {} carries no draft answer",
                envelope.message_id
            )));
        };
        let record = MessageRecord::with_verification(
            envelope.clone(),
            VerificationRecord::waiting(&envelope.message_id, original_question_id, answer_text),
        );
        ctx.messages.insert(&record).await?;
        Ok(())
    }

    /// An expert reply: transition the record it threads to, exactly once.
    async fn resolve(
        &self,
        envelope: Envelope,
        ctx: &PipelineContext,
        out: &mut Vec<Envelope>,
    ) -> VeribotResult<()> {
        let Some(reply_id) = envelope.reply_id().map(str::to_string) else {
            debug!(
                "expert message {} has no reply context, ignoring",
                envelope.message_id
            );
            return Ok(());
        };
        let Some(record) = ctx.messages.get(&reply_id).await? else {
            debug!("expert reply {} matches no stored message", envelope.message_id);
            return Ok(());
        };
        let Some(verification) = record.verification else {
            debug!("expert reply {} matches a non-verification message", envelope.message_id);
            return Ok(());
        };
        let expert_id = envelope.user.channel_id.clone();

        // A terminal record at read time means this reply is either a
        // redelivery of the one that resolved it, or a different expert
        // arriving late. The redelivery must re-send the final answer: a
        // transient failure downstream of the swap otherwise loses it
        // forever, since the swap itself cannot be won twice.
        if verification.status.is_terminal() {
            if verification.resolved_by.as_deref() == Some(expert_id.as_str()) {
                info!(
                    "replaying final answer for {} after redelivery of expert reply {}",
                    reply_id, envelope.message_id
                );
                let final_envelope = self
                    .compose_final(
                        ctx,
                        &reply_id,
                        &verification.original_question_id,
                        verification.status,
                        &verification.answer_text,
                    )
                    .await?;
                out.push(final_envelope);
                out.push(self.expert_note(&envelope, THANK_YOU_TEXT));
            } else {
                out.push(self.expert_note(&envelope, ALREADY_ANSWERED_TEXT));
            }
            return Ok(());
        }

        let text = envelope.text().unwrap_or_default().to_string();
        let (next, final_answer) = match classify(&text) {
            ExpertDecision::Approve => (VerificationStatus::Verified, verification.answer_text.clone()),
            ExpertDecision::Reject => (VerificationStatus::Rejected, String::new()),
            ExpertDecision::Correct(corrected) => (VerificationStatus::Verified, corrected),
        };

        let answer_update = (next == VerificationStatus::Verified
            && final_answer != verification.answer_text)
            .then_some(final_answer.as_str());
        let won = ctx
            .messages
            .transition_verification(
                &reply_id,
                VerificationStatus::Waiting,
                next,
                answer_update,
                &expert_id,
            )
            .await?;

        if !won {
            let resolver = ctx
                .messages
                .get(&reply_id)
                .await?
                .and_then(|r| r.verification)
                .and_then(|v| v.resolved_by);
            if resolver.as_deref() == Some(expert_id.as_str()) {
                // Another worker carried the same reply and won; it owns
                // the final delivery.
                debug!(
                    "expert reply {} already resolved {} on another delivery",
                    envelope.message_id, reply_id
                );
                return Ok(());
            }
            // Lost the race against another expert. Not an error; tell the
            // late expert and move on.
            warn!(
                "expert reply {} lost the resolution race for {}",
                envelope.message_id, reply_id
            );
            out.push(self.expert_note(&envelope, ALREADY_ANSWERED_TEXT));
            return Ok(());
        }
        info!(
            "verification {} resolved to {} by expert {}",
            reply_id,
            next.as_str(),
            expert_id
        );

        let final_envelope = self
            .compose_final(ctx, &reply_id, &verification.original_question_id, next, &final_answer)
            .await?;
        out.push(final_envelope);
        out.push(self.expert_note(&envelope, THANK_YOU_TEXT));
        Ok(())
    }

    /// Build the user-facing final answer for a resolved record. Threads to
    /// the original question and drops the related-questions prompt from
    /// the first delivery. Pure function of the record's terminal state, so
    /// a replay composes the identical envelope under the identical id.
    async fn compose_final(
        &self,
        ctx: &PipelineContext,
        expert_message_id: &str,
        original_question_id: &str,
        status: VerificationStatus,
        answer: &str,
    ) -> VeribotResult<Envelope> {
        let question = ctx
            .messages
            .get(original_question_id)
            .await?
            .ok_or_else(|| {
                VeribotError::Validation(format!(
                    "original question {original_question_id} missing for resolved verification {expert_message_id}"
                ))
            })?;

        let mut final_envelope = Envelope::outgoing(
            question.envelope.channel,
            MessageCategory::BotToUserResponse,
            question.envelope.user.clone(),
        );
        final_envelope.message_id = format!("{expert_message_id}:final");
        final_envelope.english_text = Some(match status {
            VerificationStatus::Verified => answer.to_string(),
            _ => REJECTED_TEXT.to_string(),
        });
        final_envelope.reply = Some(ReplyContext::to_message(original_question_id));
        final_envelope.media = question.envelope.media.clone();
        ctx.messages
            .insert(&MessageRecord::new(final_envelope.clone()))
            .await?;
        Ok(final_envelope)
    }

    fn expert_note(&self, expert_reply: &Envelope, text: &str) -> Envelope {
        let mut note = Envelope::outgoing(
            expert_reply.channel,
            MessageCategory::BotToExpert,
            expert_reply.user.clone(),
        );
        note.english_text = Some(text.to_string());
        note.reply = Some(ReplyContext::to_message(expert_reply.message_id.clone()));
        note
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_of_expert_replies() {
        assert!(matches!(classify("Yes"), ExpertDecision::Approve));
        assert!(matches!(classify("  ok "), ExpertDecision::Approve));
        assert!(matches!(classify("NO"), ExpertDecision::Reject));
        assert!(matches!(classify("incorrect"), ExpertDecision::Reject));
        match classify("The dose is 5mg, not 10mg.") {
            ExpertDecision::Correct(text) => assert_eq!(text, "The dose is 5mg, not 10mg."),
            _ => panic!("free text should be a correction"),
        }
    }
}
