//! Document Chunking
//!
//! Splits loaded pages into overlapping, size-bounded chunks for embedding
//! and retrieval. Splitting is recursive over progressively finer
//! separators (paragraph, line, word, character); sizes count characters.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;
use thiserror::Error;
use tracing::info;

use super::loader::{load_document, LoadError, PageSegment};
use crate::context::tokens::estimate_tokens_quick;
use crate::text::segment::trim_unit;

/// Default maximum chunk size in characters
pub const DEFAULT_CHUNK_SIZE: usize = 500;

/// Default overlap between neighbouring chunks in characters
pub const DEFAULT_CHUNK_OVERLAP: usize = 100;

/// Separators tried in order; the empty separator splits into characters.
const SEPARATORS: &[&str] = &["\n\n", "\n", " ", ""];

#[derive(Error, Debug)]
pub enum ChunkerError {
    #[error("Load error: {0}")]
    Load(#[from] LoadError),
    #[error("Invalid chunker config: {0}")]
    InvalidConfig(String),
}

/// Chunk size and overlap, in characters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkerConfig {
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl ChunkerConfig {
    pub fn validate(&self) -> Result<(), ChunkerError> {
        if self.chunk_size == 0 {
            return Err(ChunkerError::InvalidConfig("chunk size must be positive".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ChunkerError::InvalidConfig(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// A chunk of a document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    /// Chunk index within document
    pub index: u32,
    /// Content of the chunk
    pub content: String,
    /// Path of the source document
    pub source: String,
    /// Page the chunk was cut from (1-based)
    pub page: u32,
    /// Estimated token count
    pub token_count: u32,
}

/// Document with metadata and its chunks
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkedDocument {
    pub id: String,
    pub filename: String,
    pub path: String,
    pub page_count: u32,
    pub chunks: Vec<Chunk>,
}

/// Recursive character splitter
#[derive(Debug, Clone, Copy)]
pub struct TextSplitter {
    config: ChunkerConfig,
}

impl TextSplitter {
    pub fn new(config: ChunkerConfig) -> Result<Self, ChunkerError> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Split `text` into trimmed, non-empty chunks.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_with(text, SEPARATORS)
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let mut separator = separators.last().copied().unwrap_or("");
        let mut finer: &[&str] = &[];
        for (i, candidate) in separators.iter().enumerate() {
            if candidate.is_empty() {
                separator = candidate;
                break;
            }
            if text.contains(candidate) {
                separator = candidate;
                finer = &separators[i + 1..];
                break;
            }
        }

        let mut chunks = Vec::new();
        let mut small: Vec<&str> = Vec::new();

        for piece in split_keep_separator(text, separator) {
            if char_len(piece) < self.config.chunk_size {
                small.push(piece);
                continue;
            }

            if !small.is_empty() {
                chunks.extend(self.merge(&small));
                small.clear();
            }
            if finer.is_empty() {
                chunks.push(piece.to_string());
            } else {
                chunks.extend(self.split_with(piece, finer));
            }
        }

        if !small.is_empty() {
            chunks.extend(self.merge(&small));
        }
        chunks
    }

    /// Greedily pack pieces into chunks, carrying up to `chunk_overlap`
    /// characters of trailing pieces into the next chunk.
    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let ChunkerConfig { chunk_size, chunk_overlap } = self.config;
        let mut merged = Vec::new();
        let mut window: VecDeque<(&str, usize)> = VecDeque::new();
        let mut total = 0usize;

        for &piece in pieces {
            let len = char_len(piece);

            if total + len > chunk_size && !window.is_empty() {
                if let Some(chunk) = join_window(&window) {
                    merged.push(chunk);
                }
                while total > chunk_overlap || (total + len > chunk_size && total > 0) {
                    match window.pop_front() {
                        Some((_, front_len)) => total -= front_len,
                        None => break,
                    }
                }
            }

            window.push_back((piece, len));
            total += len;
        }

        if let Some(chunk) = join_window(&window) {
            merged.push(chunk);
        }
        merged
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn join_window(window: &VecDeque<(&str, usize)>) -> Option<String> {
    let joined: String = window.iter().map(|(piece, _)| *piece).collect();
    let trimmed = trim_unit(&joined);
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Split on `separator`, attaching each separator to the start of the piece
/// that follows it. Empty pieces are dropped.
fn split_keep_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0usize;
    for (pos, _) in text.match_indices(separator) {
        if pos > start {
            pieces.push(&text[start..pos]);
        }
        start = pos;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

/// Chunk loaded page segments, numbering chunks across the whole document.
pub fn chunk_segments(
    segments: &[PageSegment],
    config: ChunkerConfig,
) -> Result<Vec<Chunk>, ChunkerError> {
    let splitter = TextSplitter::new(config)?;
    let mut chunks = Vec::new();

    for segment in segments {
        for content in splitter.split_text(&segment.text) {
            let token_count = estimate_tokens_quick(&content);
            chunks.push(Chunk {
                index: chunks.len() as u32,
                content,
                source: segment.source.clone(),
                page: segment.page,
                token_count,
            });
        }
    }

    Ok(chunks)
}

/// Load a document from disk and chunk it
pub fn chunk_document(
    path: &Path,
    doc_id: &str,
    config: ChunkerConfig,
) -> Result<ChunkedDocument, ChunkerError> {
    let segments = load_document(path)?;
    let chunks = chunk_segments(&segments, config)?;

    let filename = path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    info!(doc_id = %doc_id, filename = %filename, chunks = chunks.len(), "Created policy chunks");

    Ok(ChunkedDocument {
        id: doc_id.to_string(),
        filename,
        path: path.to_string_lossy().to_string(),
        page_count: segments.len() as u32,
        chunks,
    })
}
