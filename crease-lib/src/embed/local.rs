use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tracing::info;

use crate::embed::{normalize, Embedder, Embedding};
use crate::{Error, Result};

/// Texts handed to the ONNX session per call.
const BATCH_SIZE: usize = 32;

/// Instruction BGE models expect in front of retrieval queries.
const BGE_QUERY_PREFIX: &str = "Represent this sentence for searching relevant passages: ";

/// Local embedder backed by a fastembed ONNX model.
///
/// Any model fastembed supports can be selected by its model code, e.g.
/// `BAAI/bge-small-en-v1.5` (384 dimensions) or `BAAI/bge-large-en-v1.5`
/// (1024 dimensions). Models are downloaded on first use.
pub struct FastEmbedder {
    model: TextEmbedding,
    model_code: String,
    dimension: usize,
    query_prefix: Option<&'static str>,
}

impl FastEmbedder {
    /// Load the model identified by `model_code`.
    ///
    /// Fails with [`Error::ModelUnavailable`] if the code is unknown or the
    /// model cannot be downloaded or initialised.
    pub fn new(model_code: &str) -> Result<Self> {
        let info = TextEmbedding::list_supported_models()
            .into_iter()
            .find(|m| m.model_code.eq_ignore_ascii_case(model_code))
            .ok_or_else(|| {
                Error::ModelUnavailable(format!("unknown embedding model: {model_code}"))
            })?;

        info!("loading embedding model {} ({} dims)", info.model_code, info.dim);
        let opts = InitOptions::new(info.model.clone()).with_show_download_progress(true);
        let model = TextEmbedding::try_new(opts)
            .map_err(|e| Error::ModelUnavailable(format!("{}: {e}", info.model_code)))?;

        Ok(Self {
            model,
            query_prefix: query_prefix(&info.model_code),
            model_code: info.model_code,
            dimension: info.dim,
        })
    }

    /// Model codes this backend can load.
    #[must_use]
    pub fn supported_models() -> Vec<String> {
        TextEmbedding::list_supported_models()
            .into_iter()
            .map(|m| m.model_code)
            .collect()
    }
}

fn query_prefix(model_code: &str) -> Option<&'static str> {
    model_code
        .to_ascii_lowercase()
        .starts_with("baai/bge-")
        .then_some(BGE_QUERY_PREFIX)
}

impl Embedder for FastEmbedder {
    fn model_name(&self) -> &str {
        &self.model_code
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed_documents(&mut self, texts: &[&str]) -> Result<Vec<Embedding>> {
        let mut embeddings = self
            .model
            .embed(texts, Some(BATCH_SIZE))
            .map_err(|e| Error::Embedding(e.to_string()))?;

        if embeddings.len() != texts.len() {
            return Err(Error::Embedding(format!(
                "model returned {} embeddings for {} texts",
                embeddings.len(),
                texts.len()
            )));
        }
        for embedding in &mut embeddings {
            normalize(embedding);
        }
        Ok(embeddings)
    }

    fn embed_query(&mut self, text: &str) -> Result<Embedding> {
        let query_text = match self.query_prefix {
            Some(prefix) => format!("{prefix}{text}"),
            None => text.to_string(),
        };

        let mut embedding = self
            .model
            .embed(vec![query_text], None)
            .map_err(|e| Error::Embedding(e.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("model returned no embeddings".to_string()))?;
        normalize(&mut embedding);
        Ok(embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_model_is_unavailable() {
        assert!(matches!(
            FastEmbedder::new("nobody/no-such-model"),
            Err(Error::ModelUnavailable(_))
        ));
    }

    #[test]
    fn test_bge_models_get_query_prefix() {
        assert!(query_prefix("BAAI/bge-small-en-v1.5").is_some());
        assert!(query_prefix("sentence-transformers/all-MiniLM-L6-v2").is_none());
    }

    #[test]
    #[ignore] // Requires model download, run with: cargo test -- --ignored
    fn test_embeddings_match_model_dimension() {
        let mut embedder = FastEmbedder::new("BAAI/bge-small-en-v1.5").unwrap();

        let docs = embedder
            .embed_documents(&["Rohit Sharma captains Mumbai Indians.", "Rain stopped play."])
            .unwrap();
        let query = embedder.embed_query("Who captains Mumbai Indians?").unwrap();

        assert_eq!(docs.len(), 2);
        assert!(docs.iter().all(|d| d.len() == embedder.dimension()));
        assert_eq!(query.len(), embedder.dimension());
    }
}
