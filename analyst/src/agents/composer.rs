// Composer: stuffs retrieved chunks into the analyst prompt and asks the model once

use std::sync::Arc;

use tracing::info;

use super::chat::{ChatModel, PromptMessage, PromptRole};
use crate::error::TurnError;
use crate::models::DocumentChunk;

pub const SYSTEM_PROMPT: &str = "You are a professional financial analyst. Use the provided context \
to answer the question. If the answer isn't in the context, \
say you don't know based on the documents. Always cite sources.\n\n\
Context: {context}";

const CHUNK_SEPARATOR: &str = "\n\n";
const TEMPERATURE: f32 = 0.0;

pub struct AnswerComposer {
    model: Arc<dyn ChatModel>,
}

impl AnswerComposer {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    pub async fn compose(&self, question: &str, chunks: &[DocumentChunk]) -> Result<String, TurnError> {
        info!("Composer: answering with {} context chunks", chunks.len());
        let messages = build_messages(question, chunks);
        self.model
            .complete(&messages, TEMPERATURE)
            .await
            .map_err(TurnError::Composition)
    }
}

pub fn build_messages(question: &str, chunks: &[DocumentChunk]) -> Vec<PromptMessage> {
    let context = chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join(CHUNK_SEPARATOR);

    vec![
        PromptMessage {
            role: PromptRole::System,
            content: SYSTEM_PROMPT.replace("{context}", &context),
        },
        PromptMessage {
            role: PromptRole::User,
            content: question.to_string(),
        },
    ]
}
