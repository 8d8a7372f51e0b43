//! Text embedding
//!
//! Chunks and questions are mapped into the same vector space by one
//! [`Embedder`]. The default backend runs a local ONNX model through the
//! fastembed crate; [`HashEmbedder`] is a dependency-free stand-in for
//! offline runs and tests.
//!
//! # Usage
//!
//! ```ignore
//! use crease_lib::embed::{Embedder, FastEmbedder};
//!
//! let mut embedder = FastEmbedder::new("BAAI/bge-small-en-v1.5")?;
//!
//! // Embed chunks (for indexing)
//! let chunk_embeddings = embedder.embed_documents(&["Kohli scored 973 runs in 2016."])?;
//!
//! // Embed a question (for searching)
//! let query_embedding = embedder.embed_query("Who scored the most runs in IPL 2016?")?;
//! ```

use crate::Result;

/// A vector embedding - fixed size array of floats
pub type Embedding = Vec<f32>;

/// Trait for text embedding models
pub trait Embedder: Send {
    /// Embed multiple texts for indexing
    ///
    /// Returns one embedding per input, in input order. Texts may be batched
    /// internally.
    fn embed_documents(&mut self, texts: &[&str]) -> Result<Vec<Embedding>>;

    /// Embed a single query for searching
    ///
    /// Uses the same model as [`embed_documents`](Self::embed_documents) so
    /// both land in one vector space.
    fn embed_query(&mut self, text: &str) -> Result<Embedding>;

    /// Returns the embedding dimension
    fn dimension(&self) -> usize;

    /// Returns the model name/identifier
    fn model_name(&self) -> &str;
}

impl<E: Embedder + ?Sized> Embedder for Box<E> {
    fn embed_documents(&mut self, texts: &[&str]) -> Result<Vec<Embedding>> {
        (**self).embed_documents(texts)
    }

    fn embed_query(&mut self, text: &str) -> Result<Embedding> {
        (**self).embed_query(text)
    }

    fn dimension(&self) -> usize {
        (**self).dimension()
    }

    fn model_name(&self) -> &str {
        (**self).model_name()
    }
}

/// Scale a vector to unit length in place; zero vectors are left as is.
pub fn normalize(vector: &mut [f32]) {
    let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vector.iter_mut() {
            *x /= norm;
        }
    }
}

mod local;
mod hash;

pub use local::*;
pub use hash::*;
