use crate::errors::{VeribotError, VeribotResult};
use crate::model::{
    Envelope, MessageCategory, MessagePayload, ReplyContext, User, UserType, VerificationStatus,
};
use crate::pipeline::stage::{Stage, StageOutcome};
use crate::pipeline::PipelineContext;
use async_trait::async_trait;
use tracing::{debug, info};

const PENDING_NOTE: &str = "Note: this answer is awaiting expert review.";

/// Knowledge lookup and draft answering. Fans a user question out into the
/// user's answer and, when the draft needs sign-off, a verification request
/// to the expert pool.
pub struct GenerateStage;

#[async_trait]
impl Stage for GenerateStage {
    fn name(&self) -> &'static str {
        "generate"
    }

    async fn handle(
        &self,
        batch: Vec<Envelope>,
        ctx: &PipelineContext,
    ) -> VeribotResult<StageOutcome> {
        let mut out = Vec::new();
        for envelope in batch {
            if envelope.category != MessageCategory::UserToBot {
                out.push(envelope);
                continue;
            }
            self.answer(envelope, ctx, &mut out).await?;
        }
        Ok(StageOutcome::Continue(out))
    }
}

impl GenerateStage {
    async fn answer(
        &self,
        question: Envelope,
        ctx: &PipelineContext,
        out: &mut Vec<Envelope>,
    ) -> VeribotResult<()> {
        let text = question
            .text()
            .ok_or_else(|| {
                VeribotError::Validation(format!("question {} has no text", question.message_id))
            })?
            .to_string();

        let chunks = ctx.retriever.retrieve(&text, ctx.config.app.retrieval_k).await?;
        let draft = ctx.generator.generate(&text, &chunks).await?;
        debug!(
            "draft for {}: {} related question(s), needs_verification={}",
            question.message_id,
            draft.related_questions.len(),
            draft.needs_verification
        );

        // First delivery to the user. Unthreaded for directly-deliverable
        // answers; carries the related-questions prompt either way. The id
        // derives from the question so a redelivered question reproduces
        // the same outputs instead of minting new ones.
        let mut answer = Envelope::outgoing(
            question.channel,
            MessageCategory::BotToUserResponse,
            question.user.clone(),
        );
        answer.message_id = format!("{}:answer", question.message_id);
        answer.english_text = Some(if draft.needs_verification {
            format!("{}\n\n{}", draft.answer, PENDING_NOTE)
        } else {
            draft.answer.clone()
        });
        if !draft.related_questions.is_empty() {
            answer.payload = MessagePayload::InteractiveList {
                description: "You can also ask:".to_string(),
                options: draft.related_questions.clone(),
            };
        }
        // The answer inherits the question's media reference as a marker
        // that the reply should be spoken, not typed.
        answer.media = question.media.clone();
        out.push(answer);

        if draft.needs_verification {
            out.push(self.verification_request(&question, &text, &draft.answer, ctx).await?);
        }
        Ok(())
    }

    async fn verification_request(
        &self,
        question: &Envelope,
        question_text: &str,
        draft_answer: &str,
        ctx: &PipelineContext,
    ) -> VeribotResult<Envelope> {
        let expert_id = ctx.primary_expert().ok_or_else(|| {
            VeribotError::Config("verification required but no experts configured".to_string())
        })?;
        let expert = match ctx.users.get(expert_id).await? {
            Some(user) => user,
            None => {
                let user = User::new(expert_id, UserType::Expert, ctx.working_language());
                ctx.users.upsert(&user).await?;
                user
            }
        };

        let mut request = Envelope::outgoing(
            question.channel,
            MessageCategory::BotToExpertVerification,
            expert,
        );
        request.message_id = format!("{}:verify", question.message_id);
        request.english_text = Some(format!(
            "Please verify this answer.\n\nQuestion: {question_text}\nBot answer: {draft_answer}\n\n\
             Reply \"Yes\" if the answer is correct, \"No\" to reject it, or send the corrected answer."
        ));
        request.payload = MessagePayload::Verification {
            status: VerificationStatus::Waiting,
            answer_text: draft_answer.to_string(),
        };
        // Threads to the user's question in the store only; the expert's
        // channel message is not sent as a reply.
        request.reply = Some(ReplyContext {
            reply_id: question.message_id.clone(),
            reply_english_text: Some(question_text.to_string()),
            reply_payload: MessagePayload::Empty,
        });
        info!(
            "routing answer for {} to expert {} for verification",
            question.message_id, request.user.channel_id
        );
        Ok(request)
    }
}
