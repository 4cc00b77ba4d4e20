use crate::errors::{VeribotError, VeribotResult};
use crate::model::Envelope;
use crate::pipeline::stage::{Stage, StageOutcome};
use crate::pipeline::PipelineContext;
use crate::store::MessageRecord;
use async_trait::async_trait;
use tracing::debug;

/// Language and media normalization. After this stage every envelope has
/// `english_text` populated and its user record is current in the store.
pub struct ProcessStage;

#[async_trait]
impl Stage for ProcessStage {
    fn name(&self) -> &'static str {
        "process"
    }

    async fn handle(
        &self,
        batch: Vec<Envelope>,
        ctx: &PipelineContext,
    ) -> VeribotResult<StageOutcome> {
        let mut out = Vec::with_capacity(batch.len());
        for mut envelope in batch {
            self.process_one(&mut envelope, ctx).await?;
            out.push(envelope);
        }
        Ok(StageOutcome::Continue(out))
    }
}

impl ProcessStage {
    async fn process_one(&self, envelope: &mut Envelope, ctx: &PipelineContext) -> VeribotResult<()> {
        // Audio first: the transcript becomes the source text. A failed or
        // empty download aborts this message rather than skipping it.
        if let Some(media) = envelope.media.clone() {
            let client = ctx.channels.get(envelope.channel).await?;
            let download = client.download_media(&media.media_id).await?;
            if download.data.is_empty() {
                return Err(VeribotError::transient(
                    envelope.channel.as_str(),
                    format!("empty media download for {}", media.media_id),
                ));
            }
            let transcript = ctx
                .speech
                .speech_to_text(&download.data, &download.mime_type, &envelope.user.language)
                .await?;
            debug!("transcribed {} bytes of audio", download.data.len());
            envelope.source_text = Some(transcript);
        }

        let Some(source) = envelope.source_text.clone() else {
            return Err(VeribotError::Validation(format!(
                "message {} has no text after media normalization",
                envelope.message_id
            )));
        };
        envelope.english_text = Some(
            ctx.translator
                .translate(&source, &envelope.user.language, ctx.working_language())
                .await?,
        );

        let mut user = envelope.user.clone();
        user.touch();
        user.record_conversation(source);
        ctx.users.upsert(&user).await?;
        envelope.user = user;

        // Persist the inbound message so later replies can thread to it.
        ctx.messages.insert(&MessageRecord::new(envelope.clone())).await?;
        Ok(())
    }
}
