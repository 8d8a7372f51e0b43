use std::hash::{Hash, Hasher};

use twox_hash::XxHash64;

use crate::embed::{normalize, Embedder, Embedding};
use crate::{Error, Result};

pub const HASH_MODEL_NAME: &str = "hash";

/// Deterministic bag-of-words embedder using signed feature hashing.
///
/// Every lower-cased alphanumeric token is hashed into one of `dimension`
/// buckets with a hash-derived sign, then the vector is L2-normalised. Texts
/// sharing words score higher; nothing is downloaded. Useful offline and in
/// tests, not a substitute for a semantic model.
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Result<Self> {
        if dimension == 0 {
            return Err(Error::Configuration("embedding dimension must be greater than zero".into()));
        }
        Ok(Self { dimension })
    }

    fn embed_one(&self, text: &str) -> Embedding {
        let mut vector = vec![0f32; self.dimension];
        for token in tokens(text) {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();

            let bucket = (h % self.dimension as u64) as usize;
            let sign = if (h >> 63) == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }
        normalize(&mut vector);
        vector
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self { dimension: 256 }
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

impl Embedder for HashEmbedder {
    fn model_name(&self) -> &str {
        HASH_MODEL_NAME
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_documents(&mut self, texts: &[&str]) -> Result<Vec<Embedding>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }

    fn embed_query(&mut self, text: &str) -> Result<Embedding> {
        Ok(self.embed_one(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn test_shape_norm_and_determinism() {
        let mut embedder = HashEmbedder::new(64).unwrap();
        let embs = embedder.embed_documents(&["hello world", "hello world"]).unwrap();

        assert_eq!(embs[0].len(), 64);
        let norm: f32 = embs[0].iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        assert_eq!(embs[0], embs[1]);
    }

    #[test]
    fn test_query_and_document_share_space() {
        let mut embedder = HashEmbedder::default();
        let doc = embedder.embed_documents(&["Kohli scored runs"]).unwrap().remove(0);
        let query = embedder.embed_query("kohli SCORED runs").unwrap();
        assert!((dot(&doc, &query) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_overlapping_words_score_higher() {
        let mut embedder = HashEmbedder::default();
        let query = embedder.embed_query("how many runs did player a score").unwrap();
        let docs = embedder
            .embed_documents(&["Player A scored 100 runs in 2019.", "Rain delayed the toss at Eden Gardens."])
            .unwrap();
        assert!(dot(&query, &docs[0]) > dot(&query, &docs[1]));
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let mut embedder = HashEmbedder::new(8).unwrap();
        let emb = embedder.embed_query("  ...  ").unwrap();
        assert!(emb.iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_zero_dimension_rejected() {
        assert!(matches!(HashEmbedder::new(0), Err(Error::Configuration(_))));
    }
}
