//! Question answering over the player corpus
//!
//! [`Crease`] ties the pipeline together: it keeps the index current through
//! an [`IndexBuilder`], retrieves the top chunks for a question and asks the
//! generation model for a grounded answer. Model handles are loaded once by
//! the caller and passed in as [`Models`].

use tracing::{debug, info};

use crate::answer::{Answer, Generator, Synthesizer};
use crate::builder::{BuildOutcome, IndexBuilder};
use crate::config::Config;
use crate::embed::Embedder;
use crate::index::{FlatIndex, RetrievalResult};
use crate::retrieve::Retriever;
use crate::{Error, Result};

/// The loaded embedding and generation models
pub struct Models<E, G> {
    pub embedder: E,
    pub generator: G,
}

impl<E: Embedder, G: Generator> Models<E, G> {
    pub fn new(embedder: E, generator: G) -> Self {
        Self { embedder, generator }
    }
}

/// RAG pipeline over one corpus
pub struct Crease<E, G> {
    config: Config,
    models: Models<E, G>,
    builder: IndexBuilder,
    synthesizer: Synthesizer,
    index: Option<FlatIndex>,
}

impl<E: Embedder, G: Generator> Crease<E, G> {
    /// Validate `config` and set up the pipeline. No index work happens yet.
    pub fn new(config: Config, models: Models<E, G>) -> Result<Self> {
        let config = config.validate()?;
        let builder = IndexBuilder::from_config(&config)?;
        let synthesizer = Synthesizer::from_config(&config);
        Ok(Self {
            config,
            models,
            builder,
            synthesizer,
            index: None,
        })
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn models(&self) -> &Models<E, G> {
        &self.models
    }

    /// The loaded index, if [`ensure_index_ready`](Self::ensure_index_ready) has run.
    #[must_use]
    pub fn index(&self) -> Option<&FlatIndex> {
        self.index.as_ref()
    }

    /// Reuse the persisted index if it matches the corpus, otherwise rebuild it.
    pub fn ensure_index_ready(&mut self) -> Result<BuildOutcome> {
        let (index, outcome) = self.builder.ensure(&mut self.models.embedder)?;
        info!("{outcome}");
        self.index = Some(index);
        Ok(outcome)
    }

    /// Rebuild the index even if the persisted one is current.
    pub fn rebuild_index(&mut self) -> Result<BuildOutcome> {
        let (index, outcome) = self.builder.rebuild(&mut self.models.embedder)?;
        info!("{outcome}");
        self.index = Some(index);
        Ok(outcome)
    }

    /// The `top_k` chunks most similar to `question`.
    pub fn retrieve(&mut self, question: &str) -> Result<RetrievalResult> {
        let k = self.config.top_k;
        self.retrieve_k(question, k)
    }

    /// Up to `k` chunks most similar to `question`.
    pub fn retrieve_k(&mut self, question: &str, k: usize) -> Result<RetrievalResult> {
        if question.trim().is_empty() {
            return Err(Error::Configuration("question must not be empty".to_string()));
        }
        if self.index.is_none() {
            self.ensure_index_ready()?;
        }
        let index = self
            .index
            .as_ref()
            .ok_or_else(|| Error::IndexCorrupt("index was not loaded".to_string()))?;

        Retriever::new(&mut self.models.embedder, index).retrieve(question, k)
    }

    /// Answer `question` from the corpus, building the index first if needed.
    ///
    /// Chunks scoring below `min_score` are dropped before generation.
    pub fn ask(&mut self, question: &str) -> Result<Answer> {
        let mut results = self.retrieve(question)?;
        if let Some(min) = self.config.min_score {
            let before = results.len();
            results.retain(|r| r.score >= min);
            if results.len() < before {
                debug!("{} of {before} chunks scored below {min}", before - results.len());
            }
        }
        self.synthesizer
            .answer(&mut self.models.generator, question, &results)
    }
}
