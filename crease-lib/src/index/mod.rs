//! Vector index
//!
//! Stores chunk embeddings alongside their chunks and answers top-k
//! similarity queries. Search goes through the [`VectorIndex`] trait so the
//! retriever does not depend on how vectors are laid out or persisted.
//!
//! # Persisted layout
//!
//! A [`FlatIndex`] persists to a directory holding:
//! - `vectors.bin`: row-major little-endian `f32`, one unit-length row per chunk
//! - `chunks.jsonl`: one JSON chunk per line, row-aligned with `vectors.bin`
//! - `manifest.json`: format version, dimension, row count and metric
//!
//! # Usage
//!
//! ```ignore
//! use crease_lib::index::{FlatIndex, IndexEntry, VectorIndex};
//!
//! let index = FlatIndex::build(entries)?;
//! index.persist(&dir)?;
//!
//! let index = FlatIndex::load(&dir)?;
//! let results = index.search(&query_embedding, 5)?;
//! ```

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::chunk::Chunk;
use crate::embed::Embedding;
use crate::Result;

/// A chunk paired with its embedding, the unit an index is built from
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub chunk: Chunk,
    pub embedding: Embedding,
}

impl IndexEntry {
    #[must_use]
    pub fn new(chunk: Chunk, embedding: Embedding) -> Self {
        Self { chunk, embedding }
    }
}

/// A search result with similarity score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
    /// The matched chunk
    pub chunk: Chunk,
    /// Cosine similarity (higher is more similar), in -1.0..=1.0
    pub score: f32,
}

/// Chunks ordered by descending similarity
pub type RetrievalResult = Vec<ScoredChunk>;

/// Result ordering: score descending, then `sequence_index` ascending, then
/// `document_id` ascending.
pub fn rank_order(a: &ScoredChunk, b: &ScoredChunk) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.chunk.sequence_index.cmp(&b.chunk.sequence_index))
        .then_with(|| a.chunk.document_id.cmp(&b.chunk.document_id))
}

/// Trait for searchable vector indexes
pub trait VectorIndex: Send + Sync {
    /// Search for the chunks most similar to `query`
    ///
    /// # Arguments
    /// * `query` - The query vector, same dimension as the index
    /// * `k` - Maximum number of results, must be greater than zero
    ///
    /// # Returns
    /// Up to `k` results ordered by [`rank_order`]
    fn search(&self, query: &[f32], k: usize) -> Result<RetrievalResult>;

    /// Dimension of every stored vector
    fn dimension(&self) -> usize;

    /// Number of stored chunks
    fn len(&self) -> usize;

    /// Check if the index is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

mod flat;

pub use flat::*;
