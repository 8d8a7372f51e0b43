//! Runtime configuration
//!
//! Every tunable the pipeline reads lives here. Build a [`Config`], override
//! the fields you care about, then call [`Config::validate`] once at startup;
//! the rest of the library only ever sees validated values.
//!
//! ```ignore
//! let config = Config {
//!     corpus_dir: "data".into(),
//!     top_k: 6,
//!     ..Config::default()
//! }
//! .validate()?;
//! ```

use std::path::PathBuf;

use crate::{Error, Result};

pub const DEFAULT_EMBEDDING_MODEL: &str = "BAAI/bge-small-en-v1.5";
pub const DEFAULT_GENERATION_MODEL: &str = "llama3.2";
pub const DEFAULT_GENERATION_URL: &str = "http://127.0.0.1:11434";
pub const DEFAULT_METADATA_FILE: &str = "player_metadata.json";
pub const DEFAULT_CORPUS_DIR: &str = "data";
pub const DEFAULT_INDEX_DIR: &str = ".crease/index";
pub const DEFAULT_TOP_K: usize = 4;
pub const DEFAULT_MAX_TOKENS: usize = 512;
pub const DEFAULT_TEMPERATURE: f32 = 0.1;
pub const DEFAULT_CHUNK_MAX_CHARS: usize = 800;
pub const DEFAULT_CHUNK_OVERLAP_CHARS: usize = 120;
pub const DEFAULT_CONTEXT_CHARS: usize = 6000;

/// Settings consumed by the index builder, retriever and synthesizer.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Embedding model code (`"hash"` selects the offline hashing embedder)
    pub embedding_model: String,
    /// Generation model name as known to the generation server
    pub generation_model: String,
    /// Base URL of the generation server
    pub generation_url: String,
    /// Directory holding the player PDFs
    pub corpus_dir: PathBuf,
    /// Directory the persisted index bundle lives in
    pub index_dir: PathBuf,
    /// Sidecar metadata file name, relative to `corpus_dir`
    pub metadata_file: String,
    /// Number of chunks retrieved per question
    pub top_k: usize,
    /// Upper bound on generated tokens per answer
    pub max_tokens: usize,
    /// Sampling temperature for generation
    pub temperature: f32,
    /// Maximum characters per chunk
    pub chunk_max_chars: usize,
    /// Characters shared between adjacent chunks
    pub chunk_overlap_chars: usize,
    /// Character budget for retrieved context injected into the prompt
    pub context_chars: usize,
    /// Retrieved chunks scoring below this are not passed to generation
    pub min_score: Option<f32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            generation_model: DEFAULT_GENERATION_MODEL.to_string(),
            generation_url: DEFAULT_GENERATION_URL.to_string(),
            corpus_dir: PathBuf::from(DEFAULT_CORPUS_DIR),
            index_dir: PathBuf::from(DEFAULT_INDEX_DIR),
            metadata_file: DEFAULT_METADATA_FILE.to_string(),
            top_k: DEFAULT_TOP_K,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            chunk_max_chars: DEFAULT_CHUNK_MAX_CHARS,
            chunk_overlap_chars: DEFAULT_CHUNK_OVERLAP_CHARS,
            context_chars: DEFAULT_CONTEXT_CHARS,
            min_score: None,
        }
    }
}

impl Config {
    /// Check ranges and cross-field constraints, returning the config unchanged
    /// when everything is in bounds.
    pub fn validate(self) -> Result<Self> {
        if self.embedding_model.trim().is_empty() {
            return Err(invalid("embedding model must not be empty"));
        }
        if self.generation_model.trim().is_empty() {
            return Err(invalid("generation model must not be empty"));
        }
        if self.top_k == 0 {
            return Err(invalid("top_k must be greater than zero"));
        }
        if self.max_tokens == 0 {
            return Err(invalid("max_tokens must be greater than zero"));
        }
        if self.context_chars == 0 {
            return Err(invalid("context_chars must be greater than zero"));
        }
        if self.chunk_max_chars == 0 {
            return Err(invalid("chunk_max_chars must be greater than zero"));
        }
        if self.chunk_overlap_chars >= self.chunk_max_chars {
            return Err(invalid(format!(
                "chunk_overlap_chars ({}) must be smaller than chunk_max_chars ({})",
                self.chunk_overlap_chars, self.chunk_max_chars
            )));
        }
        if !self.temperature.is_finite() || !(0.0..=2.0).contains(&self.temperature) {
            return Err(invalid(format!(
                "temperature must be within 0.0..=2.0, got {}",
                self.temperature
            )));
        }
        if let Some(min) = self.min_score {
            if !min.is_finite() || !(-1.0..=1.0).contains(&min) {
                return Err(invalid(format!("min_score must be within -1.0..=1.0, got {min}")));
            }
        }
        if self.index_dir == self.corpus_dir {
            return Err(invalid("index_dir must differ from corpus_dir"));
        }
        Ok(self)
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::Configuration(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_zero_top_k_rejected() {
        let config = Config { top_k: 0, ..Config::default() };
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_overlap_must_be_smaller_than_window() {
        let config = Config {
            chunk_max_chars: 100,
            chunk_overlap_chars: 100,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_index_dir_cannot_be_corpus_dir() {
        let config = Config {
            corpus_dir: "same".into(),
            index_dir: "same".into(),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_temperature_out_of_range() {
        let config = Config { temperature: f32::NAN, ..Config::default() };
        assert!(config.validate().is_err());

        let config = Config { temperature: 3.0, ..Config::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_min_score_must_be_a_cosine() {
        let config = Config { min_score: Some(0.3), ..Config::default() };
        assert!(config.validate().is_ok());

        let config = Config { min_score: Some(1.5), ..Config::default() };
        assert!(matches!(config.validate(), Err(Error::Configuration(_))));

        let config = Config { min_score: Some(f32::NAN), ..Config::default() };
        assert!(config.validate().is_err());
    }
}
