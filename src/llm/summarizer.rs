//! Answer Summarization
//!
//! Turns deduplicated policy text plus a question into an answer. The model
//! is instructed to answer strictly from the supplied text.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use super::client::{ChatMessage, OllamaClient, OllamaError};
use crate::context::tokens::count_tokens;

/// Default chat model for summarization
pub const DEFAULT_CHAT_MODEL: &str = "mistral";

#[derive(Error, Debug)]
pub enum SummarizationError {
    #[error("Summarization failed: {0}")]
    Model(#[from] OllamaError),
    #[error("Model returned an empty answer")]
    EmptyAnswer,
}

/// Anything that can answer a question from a block of context
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, context: &str, question: &str) -> Result<String, SummarizationError>;
}

/// Build the single-turn prompt sent to the model
pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "You are a helpful assistant.\n\
         Summarize the answer to the following question strictly based ONLY on the provided policy document text.\n\
         Avoid duplication and do not invent information.\n\
         \n\
         Question: {question}\n\
         \n\
         Document:\n\
         {context}\n\
         \n\
         Answer:\n"
    )
}

/// Summarizer backed by an Ollama chat model
pub struct OllamaSummarizer {
    client: OllamaClient,
    model: String,
}

impl OllamaSummarizer {
    pub fn new(client: OllamaClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }}

#[async_trait]
impl Summarizer for OllamaSummarizer {
    async fn summarize(&self, context: &str, question: &str) -> Result<String, SummarizationError> {
        let prompt = build_prompt(context, question);
        info!(model = %self.model, prompt_tokens = count_tokens(&prompt), "Summarizing");

        let content = self.client
            .chat(&self.model, &[ChatMessage::user(prompt)])
            .await?;

        let answer = content.trim();
        if answer.is_empty() {
            warn!(model = %self.model, "Model returned blank answer");
            return Err(SummarizationError::EmptyAnswer);
        }
        Ok(answer.to_string())
    }
}
