//! Policy Advisor Pipeline
//!
//! Ingest: copy the document into the cache dir, chunk it, embed the chunks
//! and add them to the vector index. Ask: retrieve the top chunks for a
//! question, merge and deduplicate their text, and summarize it.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{error, info, warn};
use ulid::Ulid;

use crate::config::{AdvisorConfig, ConfigError, EmbedderKind};
use crate::context::tokens::TokenSavings;
use crate::documents::chunker::{chunk_document, ChunkerError};
use crate::documents::embeddings::{Embedder, EmbeddingError, HashingEmbedder, OllamaEmbedder};
use crate::documents::index::{IndexError, IndexLoadError, IndexRecord, IndexStats, VectorIndex};
use crate::llm::client::OllamaClient;
use crate::llm::summarizer::{OllamaSummarizer, SummarizationError, Summarizer};
use crate::text::dedup::{deduplicate_with_report, DedupReport};

#[derive(Error, Debug)]
pub enum AdvisorError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Document error: {0}")]
    Document(#[from] ChunkerError),
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),
    #[error("Index load error: {0}")]
    IndexLoad(#[from] IndexLoadError),
    #[error("Index error: {0}")]
    Index(#[from] IndexError),
    #[error("{0}")]
    Summarization(#[from] SummarizationError),
    #[error("No policy documents loaded yet; ingest a document first")]
    NoIndex,
    #[error("Existing policy index could not be loaded: {0}")]
    IndexUnavailable(String),
    #[error("Failed to extract text from {0}")]
    NoChunks(String),
    #[error("Question is empty")]
    EmptyQuestion,
}

/// Result of ingesting one document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    pub doc_id: String,
    pub cached_path: String,
    pub page_count: u32,
    pub chunk_count: usize,
    /// True when a new index was started rather than extended
    pub created_index: bool,
}

/// One retrieved chunk cited by an answer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerSource {
    pub rank: usize,
    pub source: String,
    pub page: u32,
    pub score: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub question: String,
    pub answer: String,
    /// Retrieved chunks in retrieval order
    pub sources: Vec<AnswerSource>,
    pub dedup: DedupReport,
    pub tokens: TokenSavings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AskOutcome {
    Answered(Answer),
    /// The index returned nothing for the question
    NoRelevantInformation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvisorStatus {
    pub vectorstore_dir: String,
    pub cached_docs_dir: String,
    pub embedder: String,
    pub index: Option<IndexStats>,
    /// Why an existing index could not be opened, if it could not
    pub load_error: Option<String>,
}

/// Question-answering session over a persisted policy index
pub struct PolicyAdvisor {
    config: AdvisorConfig,
    embedder: Box<dyn Embedder>,
    summarizer: Box<dyn Summarizer>,
    index: Option<VectorIndex>,
    load_error: Option<IndexLoadError>,
}

impl PolicyAdvisor {
    /// Build the Ollama-backed embedder and summarizer from `config`, then open.
    pub async fn connect(config: AdvisorConfig) -> Result<Self, AdvisorError> {
        let client = OllamaClient::new(&config.ollama_url, config.request_timeout());

        let embedder: Box<dyn Embedder> = match config.embedder {
            EmbedderKind::Hashing => Box::new(HashingEmbedder),
            EmbedderKind::Ollama => {
                Box::new(OllamaEmbedder::probe(client.clone(), config.embedding_model.clone()).await?)
            }
        };
        let summarizer = Box::new(OllamaSummarizer::new(client, config.chat_model.clone()));

        Self::open(config, embedder, summarizer)
    }

    /// Open the advisor, loading the persisted index if its directory exists.
    ///
    /// An index that exists but cannot be loaded is not fatal: the advisor
    /// starts without one and reports the failure through [`Self::load_error`].
    pub fn open(
        config: AdvisorConfig,
        embedder: Box<dyn Embedder>,
        summarizer: Box<dyn Summarizer>,
    ) -> Result<Self, AdvisorError> {
        config.validate()?;
        let dir = config.vectorstore_dir()?;

        let (index, load_error) = if dir.exists() {
            match VectorIndex::open(&dir, &embedder.name(), embedder.dimension()) {
                Ok(index) => (Some(index), None),
                Err(e) => {
                    error!(dir = %dir.display(), error = %e, "Error loading policy documents");
                    (None, Some(e))
                }
            }
        } else {
            (None, None)
        };

        Ok(Self {
            config,
            embedder,
            summarizer,
            index,
            load_error,
        })
    }

    pub fn has_index(&self) -> bool {
        self.index.is_some()
    }

    pub fn load_error(&self) -> Option<&IndexLoadError> {
        self.load_error.as_ref()
    }

    /// Add a document to the knowledge base and persist the index.
    ///
    /// A missing or corrupt snapshot is replaced by a new index. A snapshot
    /// that parsed but was built by another embedder or schema is left alone
    /// and the ingest is refused.
    pub async fn ingest(&mut self, path: &Path) -> Result<IngestReport, AdvisorError> {
        if let Some(e) = &self.load_error {
            if !is_replaceable(e) {
                return Err(AdvisorError::IndexUnavailable(e.to_string()));
            }
        }

        let cached_path = self.cache_document(path)?;
        let doc_id = Ulid::new().to_string();
        let document = chunk_document(&cached_path, &doc_id, self.config.chunker())?;

        if document.chunks.is_empty() {
            return Err(AdvisorError::NoChunks(document.filename));
        }

        let texts: Vec<&str> = document.chunks.iter().map(|c| c.content.as_str()).collect();
        let embeddings = self.embedder.embed_batch(&texts).await?;
        let records: Vec<IndexRecord> = document.chunks.iter()
            .zip(embeddings)
            .map(|(chunk, embedding)| IndexRecord::from_chunk(&doc_id, chunk, embedding))
            .collect();

        let created_index = self.index.is_none();
        if created_index {
            if let Some(previous) = self.load_error.take() {
                warn!(error = %previous, "Replacing unreadable index with a new one");
            }
            let dir = self.config.vectorstore_dir()?;
            self.index = Some(VectorIndex::create(&dir, &self.embedder.name(), self.embedder.dimension()));
        }
        let index = self.index.as_mut().ok_or(AdvisorError::NoIndex)?;
        index.upsert(records)?;
        index.save()?;

        info!(
            doc_id = %doc_id,
            chunks = document.chunks.len(),
            created_index = created_index,
            "Ingested policy document"
        );

        Ok(IngestReport {
            doc_id,
            cached_path: cached_path.to_string_lossy().to_string(),
            page_count: document.page_count,
            chunk_count: document.chunks.len(),
            created_index,
        })
    }

    /// Copy `path` into the cached-docs dir, keeping its file name.
    fn cache_document(&self, path: &Path) -> Result<PathBuf, AdvisorError> {
        let cache_dir = self.config.cached_docs_dir()?;
        fs::create_dir_all(&cache_dir)?;

        let file_name = path.file_name().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, format!("Not a file: {}", path.display()))
        })?;
        let target = cache_dir.join(file_name);

        let already_cached = match (path.canonicalize(), target.canonicalize()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        };
        if !already_cached {
            fs::copy(path, &target)?;
            info!(from = %path.display(), to = %target.display(), "Saved document locally");
        }
        Ok(target)
    }

    /// Answer `question` from the indexed documents.
    pub async fn ask(&self, question: &str) -> Result<AskOutcome, AdvisorError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(AdvisorError::EmptyQuestion);
        }
        let index = match (&self.index, &self.load_error) {
            (Some(index), _) => index,
            (None, Some(e)) => return Err(AdvisorError::IndexUnavailable(e.to_string())),
            (None, None) => return Err(AdvisorError::NoIndex),
        };

        let query = self.embedder.embed(question).await?;
        let results = index.query(&query, self.config.top_k);
        if results.is_empty() {
            info!("No relevant information found in documents");
            return Ok(AskOutcome::NoRelevantInformation);
        }

        let merged = results.iter()
            .map(|r| r.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let (context, dedup) = deduplicate_with_report(&merged, self.config.dedup_threshold);
        let tokens = TokenSavings::measure(&merged, &context);

        info!(
            retrieved = results.len(),
            dropped_sentences = dedup.dropped,
            tokens_saved = tokens.saved(),
            "Prepared context"
        );

        let answer = self.summarizer.summarize(&context, question).await?;

        let sources = results.into_iter()
            .enumerate()
            .map(|(i, r)| AnswerSource {
                rank: i + 1,
                source: r.metadata.source,
                page: r.metadata.page,
                score: r.score,
            })
            .collect();

        Ok(AskOutcome::Answered(Answer {
            question: question.to_string(),
            answer,
            sources,
            dedup,
            tokens,
        }))
    }

    pub fn status(&self) -> Result<AdvisorStatus, AdvisorError> {
        Ok(AdvisorStatus {
            vectorstore_dir: self.config.vectorstore_dir()?.display().to_string(),
            cached_docs_dir: self.config.cached_docs_dir()?.display().to_string(),
            embedder: self.embedder.name(),
            index: self.index.as_ref().map(|i| i.stats()),
            load_error: self.load_error.as_ref().map(|e| e.to_string()),
        })
    }

    /// Persist any pending index changes and release the session.
    pub fn close(self) -> Result<(), AdvisorError> {
        if let Some(index) = self.index {
            index.close()?;
        }
        Ok(())
    }
}

/// Whether a failed snapshot may be overwritten by a fresh index
fn is_replaceable(error: &IndexLoadError) -> bool {
    matches!(error, IndexLoadError::Missing(_) | IndexLoadError::Corrupt(_))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::embeddings::{HASHING_DIM, HASHING_EMBEDDER_NAME};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Records every call and answers with a fixed string
    struct RecordingSummarizer {
        calls: Arc<Mutex<Vec<(String, String)>>>,
    }

    #[async_trait]
    impl Summarizer for RecordingSummarizer {
        async fn summarize(&self, context: &str, question: &str) -> Result<String, SummarizationError> {
            self.calls.lock().push((context.to_string(), question.to_string()));
            Ok("Staff get 25 days of annual leave.".to_string())
        }
    }

    struct FailingSummarizer;

    #[async_trait]
    impl Summarizer for FailingSummarizer {
        async fn summarize(&self, _context: &str, _question: &str) -> Result<String, SummarizationError> {
            Err(SummarizationError::EmptyAnswer)
        }
    }

    fn config(data_dir: &Path) -> AdvisorConfig {
        AdvisorConfig {
            data_dir: Some(data_dir.to_path_buf()),
            ..Default::default()
        }
    }

    fn recording_advisor(data_dir: &Path) -> (PolicyAdvisor, Arc<Mutex<Vec<(String, String)>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let advisor = PolicyAdvisor::open(
            config(data_dir),
            Box::new(HashingEmbedder),
            Box::new(RecordingSummarizer { calls: calls.clone() }),
        ).unwrap();
        (advisor, calls)
    }

    fn write_policy(dir: &Path, name: &str, text: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, text).unwrap();
        path
    }

    #[tokio::test]
    async fn test_ask_without_index() {
        let data = tempfile::tempdir().unwrap();
        let (advisor, _) = recording_advisor(data.path());

        assert!(!advisor.has_index());
        assert!(advisor.load_error().is_none());
        assert!(matches!(advisor.ask("How much leave?").await, Err(AdvisorError::NoIndex)));
    }

    #[tokio::test]
    async fn test_empty_question_rejected() {
        let data = tempfile::tempdir().unwrap();
        let (advisor, _) = recording_advisor(data.path());
        assert!(matches!(advisor.ask("   ").await, Err(AdvisorError::EmptyQuestion)));
    }

    #[tokio::test]
    async fn test_ingest_then_ask_deduplicates_context() {
        let data = tempfile::tempdir().unwrap();
        let uploads = tempfile::tempdir().unwrap();
        let (mut advisor, calls) = recording_advisor(data.path());

        let leave = write_policy(
            uploads.path(),
            "leave.txt",
            "Annual leave is 25 days. Annual leave is 25 days!",
        );
        let fire = write_policy(uploads.path(), "fire.txt", "Fire drills occur monthly.");

        let report = advisor.ingest(&leave).await.unwrap();
        assert!(report.created_index);
        assert_eq!(report.chunk_count, 1);
        assert!(Path::new(&report.cached_path).starts_with(data.path().join("cached_docs")));

        let report = advisor.ingest(&fire).await.unwrap();
        assert!(!report.created_index);

        let outcome = advisor.ask("How many days of annual leave?").await.unwrap();
        let answer = match outcome {
            AskOutcome::Answered(answer) => answer,
            other => panic!("expected an answer, got {:?}", other),
        };

        assert_eq!(answer.answer, "Staff get 25 days of annual leave.");
        assert_eq!(answer.sources.len(), 2);
        assert_eq!(answer.sources[0].rank, 1);
        assert!(answer.sources[0].source.ends_with("leave.txt"));
        assert_eq!(answer.dedup.dropped, 1);
        assert!(answer.tokens.saved() > 0);

        let calls = calls.lock();
        assert_eq!(calls.len(), 1);
        let (context, question) = &calls[0];
        assert_eq!(context, "Annual leave is 25 days. Fire drills occur monthly.");
        assert_eq!(question, "How many days of annual leave?");
    }

    #[tokio::test]
    async fn test_index_persists_across_sessions() {
        let data = tempfile::tempdir().unwrap();
        let uploads = tempfile::tempdir().unwrap();
        let policy = write_policy(uploads.path(), "ppe.md", "Hard hats are required on site.");

        let (mut first, _) = recording_advisor(data.path());
        first.ingest(&policy).await.unwrap();
        first.close().unwrap();

        let (second, calls) = recording_advisor(data.path());
        assert!(second.has_index());
        let status = second.status().unwrap();
        assert_eq!(status.index.map(|s| s.record_count), Some(1));

        second.ask("Are hard hats required?").await.unwrap();
        assert_eq!(calls.lock()[0].0, "Hard hats are required on site.");
    }

    #[tokio::test]
    async fn test_unreadable_index_reported_then_replaced() {
        let data = tempfile::tempdir().unwrap();
        let store = data.path().join("vectorstore");
        fs::create_dir_all(&store).unwrap();
        fs::write(store.join("index.json"), "garbage").unwrap();

        let (mut advisor, _) = recording_advisor(data.path());
        assert!(!advisor.has_index());
        assert!(matches!(advisor.load_error(), Some(IndexLoadError::Corrupt(_))));
        assert!(advisor.status().unwrap().load_error.is_some());
        assert!(matches!(
            advisor.ask("Anything?").await,
            Err(AdvisorError::IndexUnavailable(_))
        ));

        let uploads = tempfile::tempdir().unwrap();
        let policy = write_policy(uploads.path(), "gdpr.txt", "Breaches are reported within 72 hours.");
        let report = advisor.ingest(&policy).await.unwrap();

        assert!(report.created_index);
        assert!(advisor.load_error().is_none());
        assert!(VectorIndex::open(&store, HASHING_EMBEDDER_NAME, HASHING_DIM).is_ok());
    }

    fn foreign_index(data_dir: &Path) -> PathBuf {
        let store = data_dir.join("vectorstore");
        let mut index = VectorIndex::create(&store, "ollama:all-minilm", 384);
        index.upsert(vec![IndexRecord {
            id: "doc_0".to_string(),
            content: "Visitors sign in at reception.".to_string(),
            metadata: crate::documents::index::SourceMetadata {
                source: "visitors.pdf".to_string(),
                page: 1,
                doc_id: "doc".to_string(),
                chunk_index: 0,
            },
            embedding: vec![0.5; 384],
        }]).unwrap();
        index.save().unwrap();
        store.join("index.json")
    }

    #[tokio::test]
    async fn test_ask_reports_why_index_failed_to_load() {
        let data = tempfile::tempdir().unwrap();
        foreign_index(data.path());

        let (advisor, calls) = recording_advisor(data.path());
        assert!(matches!(advisor.load_error(), Some(IndexLoadError::EmbedderMismatch { .. })));

        let err = advisor.ask("Where do visitors sign in?").await.unwrap_err();
        assert!(matches!(err, AdvisorError::IndexUnavailable(_)));
        assert!(err.to_string().contains("ollama:all-minilm"));
        assert!(calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_ingest_refuses_to_overwrite_foreign_index() {
        let data = tempfile::tempdir().unwrap();
        let snapshot = foreign_index(data.path());
        let before = fs::read(&snapshot).unwrap();

        let uploads = tempfile::tempdir().unwrap();
        let policy = write_policy(uploads.path(), "badges.txt", "Badges are worn at all times.");
        let (mut advisor, _) = recording_advisor(data.path());

        let err = advisor.ingest(&policy).await.unwrap_err();
        assert!(matches!(err, AdvisorError::IndexUnavailable(_)));
        assert!(!advisor.has_index());
        assert!(advisor.load_error().is_some());
        assert_eq!(fs::read(&snapshot).unwrap(), before);
        assert!(VectorIndex::open(snapshot.parent().unwrap(), "ollama:all-minilm", 384).is_ok());
    }

    #[tokio::test]
    async fn test_ingest_blank_document_fails() {
        let data = tempfile::tempdir().unwrap();
        let uploads = tempfile::tempdir().unwrap();
        let (mut advisor, _) = recording_advisor(data.path());
        let blank = write_policy(uploads.path(), "blank.txt", "\n\n   \n");

        let err = advisor.ingest(&blank).await.unwrap_err();
        assert!(matches!(err, AdvisorError::Document(_)));
        assert!(!advisor.has_index());
    }

    #[tokio::test]
    async fn test_empty_index_has_no_relevant_information() {
        let data = tempfile::tempdir().unwrap();
        let mut index = VectorIndex::create(&data.path().join("vectorstore"), HASHING_EMBEDDER_NAME, HASHING_DIM);
        index.save().unwrap();

        let (advisor, calls) = recording_advisor(data.path());
        let outcome = advisor.ask("Anything?").await.unwrap();
        assert!(matches!(outcome, AskOutcome::NoRelevantInformation));
        assert!(calls.lock().is_empty());
    }

    #[tokio::test]
    async fn test_summarization_failure_surfaces() {
        let data = tempfile::tempdir().unwrap();
        let uploads = tempfile::tempdir().unwrap();
        let policy = write_policy(uploads.path(), "keys.txt", "Keys are returned on exit.");

        let mut advisor = PolicyAdvisor::open(
            config(data.path()),
            Box::new(HashingEmbedder),
            Box::new(FailingSummarizer),
        ).unwrap();
        advisor.ingest(&policy).await.unwrap();

        let err = advisor.ask("When are keys returned?").await.unwrap_err();
        assert!(matches!(err, AdvisorError::Summarization(_)));
    }

    #[test]
    fn test_outcome_serialization_is_tagged() {
        let json = serde_json::to_value(AskOutcome::NoRelevantInformation).unwrap();
        assert_eq!(json["outcome"], "no_relevant_information");
    }
}
