//! Crease - RAG library for questions about cricketers and IPL players
//!
//! # Architecture
//!
//! ```text
//! CorpusLoader -> WindowChunker -> Embedder -> FlatIndex (persisted, stamped)
//!                                                  |
//! Question -> Embedder -> Retriever <--------------+
//!                             |
//!                        Synthesizer -> Generator -> Answer
//! ```
//!
//! # Example
//!
//! ```ignore
//! use crease_lib::{Config, Crease, FastEmbedder, Models, OllamaGenerator};
//!
//! let config = Config::default();
//! let embedder = FastEmbedder::new(&config.embedding_model)?;
//! let generator = OllamaGenerator::connect(&config.generation_url, &config.generation_model)?;
//!
//! let mut crease = Crease::new(config, Models::new(embedder, generator))?;
//! crease.ensure_index_ready()?;
//!
//! let answer = crease.ask("How many runs did Virat Kohli score in IPL 2016?")?;
//! println!("{}", answer.text);
//! ```

pub mod answer;
pub mod builder;
pub mod chunk;
pub mod config;
pub mod document;
pub mod embed;
pub mod error;
pub mod fingerprint;
pub mod index;
pub mod rag;
pub mod retrieve;

pub use answer::{Answer, Generator, OllamaGenerator, Synthesizer};
pub use builder::{BuildOutcome, IndexBuilder};
pub use config::Config;
pub use embed::{Embedder, FastEmbedder, HashEmbedder};
pub use error::{Error, Result};
pub use rag::{Crease, Models};
