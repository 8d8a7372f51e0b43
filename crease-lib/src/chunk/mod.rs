//! Document chunking
//!
//! Chunks are the unit of indexing and retrieval. Every chunk records where it
//! came from (document, position, page) so answers can cite their sources.
//!
//! # Implementing a Chunker
//!
//! ```ignore
//! use crease_lib::chunk::{Chunk, Chunker};
//! use crease_lib::document::Document;
//!
//! struct MyChunker { /* ... */ }
//!
//! impl Chunker for MyChunker {
//!     fn chunk(&self, document: &Document) -> Vec<Chunk> {
//!         // Your chunking logic here
//!         todo!()
//!     }
//!
//!     fn name(&self) -> &str {
//!         "mine"
//!     }
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::document::Document;

/// A bounded slice of a document's text with its provenance
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
pub struct Chunk {
    /// `"{document_id}#{sequence_index}"`
    pub id: String,
    /// Identifier of the source document
    pub document_id: String,
    /// The text content of this chunk
    pub text: String,
    /// Zero-based position of this chunk within its document
    pub sequence_index: usize,
    /// Character (not byte) offset of the chunk start in the document text
    pub char_offset: usize,
    /// 1-based page the chunk starts on
    pub page: usize,
    /// Player description from the document's sidecar metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// Builds the id of the chunk at `sequence_index` within a document.
#[must_use]
pub fn chunk_id(document_id: &str, sequence_index: usize) -> String {
    format!("{document_id}#{sequence_index}")
}

/// Trait for document chunking strategies
pub trait Chunker: Send + Sync {
    /// Split a document into ordered chunks
    ///
    /// Identical documents must always produce identical chunks.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;

    /// Returns the name of this chunking strategy
    fn name(&self) -> &str;
}

mod window;

pub use window::*;
