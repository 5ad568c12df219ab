// Policy Advisor Library
// Exports the ingestion and question-answering pipeline for the CLI binary

pub mod advisor;
pub mod config;
pub mod context;
pub mod documents;
pub mod llm;
pub mod text;
pub mod topics;

// Re-export commonly used types for CLI
pub use advisor::{
    AdvisorError, AdvisorStatus, Answer, AnswerSource, AskOutcome, IngestReport, PolicyAdvisor,
};
pub use config::{AdvisorConfig, ConfigError, EmbedderKind};
pub use context::tokens::{count_tokens, estimate_tokens_quick, TokenSavings};
pub use documents::{
    chunk_document, load_document, Chunk, ChunkerConfig, Embedder, HashingEmbedder, IndexStats,
    OllamaEmbedder, SearchResult, VectorIndex,
};
pub use llm::{OllamaClient, OllamaSummarizer, Summarizer};
pub use text::{deduplicate, deduplicate_with_report, ratio, sentences, DedupReport};
pub use topics::PolicyTopic;
