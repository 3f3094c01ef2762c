use std::sync::Arc;

use tracing::{info, instrument};

use crate::agents::{AnswerComposer, Retriever};
use crate::error::TurnError;
use crate::models::PipelineResult;

/// Retrieval followed by composition. Holds no per-question state, so one
/// instance is shared by every session.
pub struct RagPipeline {
    retriever: Arc<dyn Retriever>,
    composer: AnswerComposer,
}

impl RagPipeline {
    pub fn new(retriever: Arc<dyn Retriever>, composer: AnswerComposer) -> Self {
        Self {
            retriever,
            composer,
        }
    }

    #[instrument(skip(self))]
    pub async fn answer(&self, question: &str) -> Result<PipelineResult, TurnError> {
        let chunks = self.retriever.retrieve(question).await?;
        let answer = self.composer.compose(question, &chunks).await?;
        info!("Pipeline: answered with {} citations", chunks.len());

        Ok(PipelineResult {
            answer,
            cited_chunks: chunks,
        })
    }
}
