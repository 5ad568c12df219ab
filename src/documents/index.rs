//! Persistent Vector Index
//!
//! Brute-force cosine search over chunk embeddings, persisted as a single
//! JSON snapshot in a directory. The index is an explicit handle: callers
//! `create` or `open` it, `upsert` and `query` through it, and `save` or
//! `close` it. Nothing is held in process-wide state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use super::chunker::Chunk;
use super::embeddings::{cosine_similarity, Embedding};

/// Snapshot layout version written by this build
pub const SCHEMA_VERSION: u32 = 1;

/// File name of the snapshot inside the index directory
pub const SNAPSHOT_FILE: &str = "index.json";

#[derive(Error, Debug)]
pub enum IndexLoadError {
    #[error("No index found at {0}")]
    Missing(String),
    #[error("IO error reading index: {0}")]
    Io(#[from] std::io::Error),
    #[error("Corrupt index snapshot: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("Unsupported index schema version {found} (expected {expected})")]
    SchemaMismatch { found: u32, expected: u32 },
    #[error("Index was built with {found}, but {expected} is configured")]
    EmbedderMismatch { found: String, expected: String },
}

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Record {id} has dimension {actual}, index expects {expected}")]
    DimensionMismatch { id: String, expected: usize, actual: usize },
}

/// Where a chunk came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceMetadata {
    pub source: String,
    pub page: u32,
    pub doc_id: String,
    pub chunk_index: u32,
}

/// A stored chunk with its vector
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexRecord {
    pub id: String,
    pub content: String,
    pub metadata: SourceMetadata,
    pub embedding: Embedding,
}

impl IndexRecord {
    pub fn from_chunk(doc_id: &str, chunk: &Chunk, embedding: Embedding) -> Self {
        Self {
            id: record_id(doc_id, chunk.index),
            content: chunk.content.clone(),
            metadata: SourceMetadata {
                source: chunk.source.clone(),
                page: chunk.page,
                doc_id: doc_id.to_string(),
                chunk_index: chunk.index,
            },
            embedding,
        }
    }
}

/// Build a record ID from components
pub fn record_id(doc_id: &str, chunk_index: u32) -> String {
    format!("{}_{}", doc_id, chunk_index)
}

/// Query hit
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub content: String,
    pub metadata: SourceMetadata,
    pub score: f32,
}

/// On-disk form of the index
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snapshot {
    schema_version: u32,
    embedder: String,
    dimension: usize,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    records: Vec<IndexRecord>,
}

/// Only the header, so a version mismatch is reported before the body is parsed
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotHeader {
    schema_version: u32,
}

/// Summary of an open index
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexStats {
    pub dir: String,
    pub embedder: String,
    pub dimension: usize,
    pub record_count: usize,
    pub document_count: usize,
    pub updated_at: DateTime<Utc>,
}

/// Handle to a vector index bound to a directory
#[derive(Debug)]
pub struct VectorIndex {
    dir: PathBuf,
    embedder: String,
    dimension: usize,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    records: Vec<IndexRecord>,
    dirty: bool,
}

impl VectorIndex {
    /// New empty index bound to `dir`. Nothing is written until `save`.
    pub fn create(dir: &Path, embedder: &str, dimension: usize) -> Self {
        let now = Utc::now();
        Self {
            dir: dir.to_path_buf(),
            embedder: embedder.to_string(),
            dimension,
            created_at: now,
            updated_at: now,
            records: Vec::new(),
            dirty: true,
        }
    }

    /// Load the index persisted in `dir`, checking it was built by the same embedder.
    pub fn open(dir: &Path, embedder: &str, dimension: usize) -> Result<Self, IndexLoadError> {
        let path = dir.join(SNAPSHOT_FILE);
        if !path.is_file() {
            return Err(IndexLoadError::Missing(dir.display().to_string()));
        }

        let contents = fs::read_to_string(&path)?;
        let header: SnapshotHeader = serde_json::from_str(&contents)?;
        if header.schema_version != SCHEMA_VERSION {
            return Err(IndexLoadError::SchemaMismatch {
                found: header.schema_version,
                expected: SCHEMA_VERSION,
            });
        }

        let snapshot: Snapshot = serde_json::from_str(&contents)?;
        if snapshot.embedder != embedder || snapshot.dimension != dimension {
            return Err(IndexLoadError::EmbedderMismatch {
                found: format!("{} ({}d)", snapshot.embedder, snapshot.dimension),
                expected: format!("{} ({}d)", embedder, dimension),
            });
        }

        info!(dir = %dir.display(), records = snapshot.records.len(), "Loaded vector index");
        Ok(Self {
            dir: dir.to_path_buf(),
            embedder: snapshot.embedder,
            dimension: snapshot.dimension,
            created_at: snapshot.created_at,
            updated_at: snapshot.updated_at,
            records: snapshot.records,
            dirty: false,
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Insert records, replacing any with the same ID in place.
    ///
    /// The whole batch is rejected if any vector has the wrong dimension.
    pub fn upsert(&mut self, records: Vec<IndexRecord>) -> Result<(), IndexError> {
        if let Some(bad) = records.iter().find(|r| r.embedding.len() != self.dimension) {
            return Err(IndexError::DimensionMismatch {
                id: bad.id.clone(),
                expected: self.dimension,
                actual: bad.embedding.len(),
            });
        }

        let count = records.len();
        for record in records {
            match self.records.iter_mut().find(|r| r.id == record.id) {
                Some(existing) => *existing = record,
                None => self.records.push(record),
            }
        }

        self.updated_at = Utc::now();
        self.dirty = true;
        debug!(count = count, total = self.records.len(), "Upserted records");
        Ok(())
    }

    /// The `k` records most similar to `query`, best first.
    ///
    /// Equal scores keep insertion order.
    pub fn query(&self, query: &[f32], k: usize) -> Vec<SearchResult> {
        let mut scored: Vec<(usize, f32)> = self.records.iter()
            .enumerate()
            .map(|(i, r)| (i, cosine_similarity(query, &r.embedding)))
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);

        scored.into_iter()
            .map(|(i, score)| {
                let record = &self.records[i];
                SearchResult {
                    content: record.content.clone(),
                    metadata: record.metadata.clone(),
                    score,
                }
            })
            .collect()
    }

    pub fn stats(&self) -> IndexStats {
        let mut doc_ids: Vec<&str> = self.records.iter().map(|r| r.metadata.doc_id.as_str()).collect();
        doc_ids.sort_unstable();
        doc_ids.dedup();

        IndexStats {
            dir: self.dir.display().to_string(),
            embedder: self.embedder.clone(),
            dimension: self.dimension,
            record_count: self.records.len(),
            document_count: doc_ids.len(),
            updated_at: self.updated_at,
        }
    }

    /// Write the snapshot atomically, creating the directory if needed.
    pub fn save(&mut self) -> Result<(), IndexError> {
        fs::create_dir_all(&self.dir)?;

        let snapshot = SnapshotRef {
            schema_version: SCHEMA_VERSION,
            embedder: &self.embedder,
            dimension: self.dimension,
            created_at: self.created_at,
            updated_at: self.updated_at,
            records: &self.records,
        };
        let contents = serde_json::to_string(&snapshot)?;
        atomic_write(&self.dir.join(SNAPSHOT_FILE), &contents)?;

        self.dirty = false;
        info!(dir = %self.dir.display(), records = self.records.len(), "Saved vector index");
        Ok(())
    }

    /// Save pending changes and release the handle.
    pub fn close(mut self) -> Result<(), IndexError> {
        if self.dirty {
            self.save()?;
        }
        Ok(())
    }
}

/// Borrowing twin of [`Snapshot`] so saving does not clone every record
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotRef<'a> {
    schema_version: u32,
    embedder: &'a str,
    dimension: usize,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    records: &'a [IndexRecord],
}

/// Atomic write: write to a .tmp sibling then rename into place.
fn atomic_write(path: &Path, contents: &str) -> Result<(), std::io::Error> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)
}
