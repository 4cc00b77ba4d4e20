use crate::bus::Topic;
use crate::errors::VeribotResult;
use crate::model::{Envelope, MessageCategory, MessagePayload};
use crate::pipeline::stage::{Stage, StageOutcome};
use crate::pipeline::PipelineContext;
use async_trait::async_trait;
use tracing::debug;

/// Last stage: translate back into the recipient's language, attach audio
/// for spoken conversations, and hand the envelope to the outbound queue.
/// Always terminates the chain.
pub struct DispatchStage;

#[async_trait]
impl Stage for DispatchStage {
    fn name(&self) -> &'static str {
        "dispatch"
    }

    async fn handle(
        &self,
        batch: Vec<Envelope>,
        ctx: &PipelineContext,
    ) -> VeribotResult<StageOutcome> {
        // Prepare every envelope before enqueuing any. A transient failure
        // midway through preparation then leaves nothing half-dispatched
        // for the redelivery to duplicate.
        let mut ready = Vec::with_capacity(batch.len());
        for mut envelope in batch {
            if let Some(english) = envelope.english_text.clone() {
                envelope.translated_text = Some(
                    ctx.translator
                        .translate(&english, ctx.working_language(), &envelope.user.language)
                        .await?,
                );
            }

            // A carried media reference means the conversation is spoken:
            // synthesize the reply and send it as audio.
            if envelope.category == MessageCategory::BotToUserResponse && envelope.media.is_some() {
                if let Some(text) = envelope.outbound_text().map(str::to_string) {
                    let audio = ctx.speech.text_to_speech(&text, &envelope.user.language).await?;
                    let url = ctx.media.put_audio(audio, "audio/ogg").await?;
                    envelope.payload = MessagePayload::Audio {
                        url,
                        mime_type: "audio/ogg".to_string(),
                    };
                }
                envelope.media = None;
            }
            ready.push(envelope);
        }

        for envelope in ready {
            debug!(
                "dispatching {} to {} on {}",
                envelope.message_id, envelope.user.channel_id, envelope.channel
            );
            ctx.queue.enqueue(Topic::Outbound, envelope).await?;
        }
        Ok(StageOutcome::Terminate)
    }
}
