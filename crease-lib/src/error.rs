//! Error types for Crease

use thiserror::Error;

/// Result type alias for Crease operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Crease operations
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid parameters or settings, never retried
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The embedding or generation model could not be loaded
    #[error("model unavailable: {0}")]
    ModelUnavailable(String),

    /// The corpus produced no chunks, so no index was written
    #[error("no ingestible content in corpus: {0}")]
    EmptyCorpus(String),

    /// A persisted index is missing files or violates its row invariant
    #[error("index corrupt: {0}")]
    IndexCorrupt(String),

    /// Two vectors that must share a dimension do not
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The embedding model failed while running
    #[error("embedding error: {0}")]
    Embedding(String),

    /// The generation model failed while running
    #[error("generation error: {0}")]
    Generation(String),

    /// A single document could not be read
    #[error("document error: {0}")]
    Document(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
