//! Policy Document Module
//!
//! Handles document loading, chunking, embedding, and the vector index.

pub mod chunker;
pub mod embeddings;
pub mod index;
pub mod loader;

// Re-export key public types
pub use chunker::{chunk_document, chunk_segments, Chunk, ChunkedDocument, ChunkerConfig, ChunkerError, TextSplitter};
pub use embeddings::{Embedder, Embedding, EmbeddingError, HashingEmbedder, OllamaEmbedder};
pub use index::{IndexError, IndexLoadError, IndexRecord, IndexStats, SearchResult, SourceMetadata, VectorIndex};
pub use loader::{load_document, DocumentKind, LoadError, PageSegment};
