//! Chunk Embeddings
//!
//! Turns chunk text and questions into vectors for the index. Two backends
//! share the [`Embedder`] trait:
//!
//! - [`HashingEmbedder`] uses the hashing trick to produce fixed-size vectors
//!   without a vocabulary or a model. Embeddings are stable: the same text
//!   always produces the same vector.
//! - [`OllamaEmbedder`] asks a local Ollama embedding model.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

use crate::llm::client::{OllamaClient, OllamaError};

/// Dimensionality of hashing embeddings.
pub const HASHING_DIM: usize = 256;

/// Stored in the index snapshot; bump when the token hash or tokenizer changes.
pub const HASHING_EMBEDDER_NAME: &str = "hashing-v1";

/// Default Ollama embedding model
pub const DEFAULT_EMBEDDING_MODEL: &str = "all-minilm";

#[derive(Error, Debug)]
pub enum EmbeddingError {
    #[error("Embedding request failed: {0}")]
    Backend(#[from] OllamaError),
    #[error("Embedding has dimension {actual}, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Embedding vector
pub type Embedding = Vec<f32>;

/// Text to vector
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Stable identifier persisted with the index
    fn name(&self) -> String;

    /// Length of every vector this embedder returns
    fn dimension(&self) -> usize;

    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError>;

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Embedding>, EmbeddingError> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed(text).await?);
        }
        Ok(embeddings)
    }
}

/// Hash a token to a bucket index in `[0, HASHING_DIM)`.
///
/// Uses the first 8 bytes of the token's SHA-256, big-endian.
fn hash_token(token: &str) -> usize {
    let digest = Sha256::digest(token.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    (u64::from_be_bytes(prefix) % HASHING_DIM as u64) as usize
}

/// Feature-hashing embedding: lower-cased alphanumeric tokens are counted
/// into buckets, then L2-normalized. Blank text gives the zero vector.
pub fn hashing_embedding(text: &str) -> Embedding {
    let mut tf = vec![0.0f32; HASHING_DIM];

    for token in text.split_whitespace() {
        let token = token.trim_matches(|c: char| !c.is_alphanumeric());
        if token.is_empty() {
            continue;
        }
        tf[hash_token(&token.to_lowercase())] += 1.0;
    }

    let norm: f32 = tf.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut tf {
            *x /= norm;
        }
    }
    tf
}

/// Local, model-free embedder
#[derive(Debug, Clone, Copy, Default)]
pub struct HashingEmbedder;

#[async_trait]
impl Embedder for HashingEmbedder {
    fn name(&self) -> String {
        HASHING_EMBEDDER_NAME.to_string()
    }

    fn dimension(&self) -> usize {
        HASHING_DIM
    }

    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        Ok(hashing_embedding(text))
    }
}

/// Embedder backed by an Ollama embedding model.
///
/// The dimension is fixed at construction; vectors of any other length are
/// rejected so a model swap cannot silently corrupt an index.
pub struct OllamaEmbedder {
    client: OllamaClient,
    model: String,
    dimension: usize,
}

impl OllamaEmbedder {
    pub fn new(client: OllamaClient, model: impl Into<String>, dimension: usize) -> Self {
        Self {
            client,
            model: model.into(),
            dimension,
        }
    }

    /// Build an embedder, learning the dimension from one probe request.
    pub async fn probe(client: OllamaClient, model: impl Into<String>) -> Result<Self, EmbeddingError> {
        let model = model.into();
        let probe = client.embed(&model, "dimension probe").await?;
        debug!(model = %model, dimension = probe.len(), "Probed embedding model");
        Ok(Self::new(client, model, probe.len()))
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn name(&self) -> String {
        format!("ollama:{}", self.model)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    async fn embed(&self, text: &str) -> Result<Embedding, EmbeddingError> {
        let embedding = self.client.embed(&self.model, text).await?;
        if embedding.len() != self.dimension {
            return Err(EmbeddingError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            });
        }
        Ok(embedding)
    }
}

/// Cosine similarity between two embeddings; 0.0 for mismatched or zero vectors
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a * norm_b)
}
