use crate::errors::VeribotResult;
use crate::model::Envelope;
use crate::pipeline::PipelineContext;
use async_trait::async_trait;
use tracing::debug;

/// What a stage hands back to the chain.
pub enum StageOutcome {
    /// Pass these envelopes to the next stage. A stage may mutate, merge, or
    /// fan out, so the list size can change.
    Continue(Vec<Envelope>),
    /// Stop the chain here. Nothing downstream runs.
    Terminate,
}

#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn handle(
        &self,
        batch: Vec<Envelope>,
        ctx: &PipelineContext,
    ) -> VeribotResult<StageOutcome>;
}

/// An explicit ordered list of stages built at startup. Stages signal
/// continuation through their return value instead of holding successor
/// references.
pub struct Chain {
    stages: Vec<Box<dyn Stage>>,
}

impl Chain {
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Self {
        Self { stages }
    }

    pub async fn run(&self, mut batch: Vec<Envelope>, ctx: &PipelineContext) -> VeribotResult<()> {
        for stage in &self.stages {
            if batch.is_empty() {
                return Ok(());
            }
            debug!("stage {} handling {} envelope(s)", stage.name(), batch.len());
            match stage.handle(batch, ctx).await? {
                StageOutcome::Continue(next) => batch = next,
                StageOutcome::Terminate => return Ok(()),
            }
        }
        Ok(())
    }
}
