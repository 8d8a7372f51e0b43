//! Index building
//!
//! Decides whether the persisted index can be reused and, when it cannot,
//! runs the ingestion pipeline:
//!
//! ```text
//! CorpusLoader -> WindowChunker -> Embedder -> FlatIndex -> staging dir -> swap
//! ```
//!
//! A new index is written to a staging directory next to the target and only
//! renamed into place once complete, so an interrupted build never leaves a
//! half-written index where a valid one is expected.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::chunk::{Chunk, Chunker, WindowChunker};
use crate::config::Config;
use crate::document::{CorpusLoader, SkippedFile};
use crate::embed::Embedder;
use crate::fingerprint::{corpus_fingerprint, BuildStamp};
use crate::index::{FlatIndex, IndexEntry, VectorIndex};
use crate::{Error, Result};

/// Chunks embedded per embedder call.
const EMBED_BATCH: usize = 64;

const STAGING_PREFIX: &str = ".crease-build-";
const RETIRED_PREFIX: &str = ".crease-retired-";

/// What [`IndexBuilder::ensure`] did
#[derive(Debug, Clone)]
pub enum BuildOutcome {
    /// The persisted index matched the corpus and was loaded as is
    Reused { chunks: usize },
    /// A fresh index was built and swapped into place
    Rebuilt(BuildReport),
}

/// Summary of a full build
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    /// Documents that contributed at least one chunk
    pub documents: usize,
    /// Chunks embedded and indexed
    pub chunks: usize,
    /// Files the loader could not read
    pub skipped: Vec<SkippedFile>,
}

impl std::fmt::Display for BuildOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Reused { chunks } => write!(f, "reused cached index ({chunks} chunks)"),
            Self::Rebuilt(report) => write!(
                f,
                "built index from {} documents ({} chunks, {} files skipped)",
                report.documents,
                report.chunks,
                report.skipped.len()
            ),
        }
    }
}

/// Builds or reuses the persisted index for one corpus.
pub struct IndexBuilder {
    loader: CorpusLoader,
    chunker: WindowChunker,
    index_dir: PathBuf,
}

impl IndexBuilder {
    #[must_use]
    pub fn new(loader: CorpusLoader, chunker: WindowChunker, index_dir: impl Into<PathBuf>) -> Self {
        Self {
            loader,
            chunker,
            index_dir: index_dir.into(),
        }
    }

    /// Create a builder from validated configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        let loader = CorpusLoader::new(&config.corpus_dir).with_metadata_file(&config.metadata_file);
        let chunker = WindowChunker::new(config.chunk_max_chars, config.chunk_overlap_chars)?;
        Ok(Self::new(loader, chunker, &config.index_dir))
    }

    #[must_use]
    pub fn index_dir(&self) -> &Path {
        &self.index_dir
    }

    #[must_use]
    pub fn loader(&self) -> &CorpusLoader {
        &self.loader
    }

    #[must_use]
    pub fn chunker(&self) -> &WindowChunker {
        &self.chunker
    }

    /// The stamp an index built now with this embedder would carry.
    pub fn stamp(&self, embedding_model: &str) -> Result<BuildStamp> {
        Ok(BuildStamp {
            fingerprint: corpus_fingerprint(&self.loader)?,
            embedding_model: embedding_model.to_string(),
            max_chars: self.chunker.max_chars(),
            overlap_chars: self.chunker.overlap_chars(),
        })
    }

    /// Return a ready index, reusing the persisted one when it is current.
    ///
    /// The persisted index is reused when its stamp matches the corpus and
    /// settings and it loads cleanly; a corrupt index is rebuilt.
    pub fn ensure<E: Embedder + ?Sized>(&self, embedder: &mut E) -> Result<(FlatIndex, BuildOutcome)> {
        let stamp = self.stamp(embedder.model_name())?;

        if BuildStamp::read(&self.index_dir).as_ref() == Some(&stamp) {
            match FlatIndex::load(&self.index_dir) {
                Ok(index) if index.dimension() == embedder.dimension() => {
                    info!("index at {} is current", self.index_dir.display());
                    let chunks = index.len();
                    return Ok((index, BuildOutcome::Reused { chunks }));
                }
                Ok(index) => warn!(
                    "index dimension {} does not match embedder dimension {}, rebuilding",
                    index.dimension(),
                    embedder.dimension()
                ),
                Err(Error::IndexCorrupt(reason)) => warn!("{reason}; rebuilding"),
                Err(e) => return Err(e),
            }
        } else {
            info!("no current index at {}, building", self.index_dir.display());
        }

        self.build_with(embedder, stamp)
    }

    /// Build a fresh index regardless of what is persisted.
    pub fn rebuild<E: Embedder + ?Sized>(&self, embedder: &mut E) -> Result<(FlatIndex, BuildOutcome)> {
        let stamp = self.stamp(embedder.model_name())?;
        self.build_with(embedder, stamp)
    }

    fn build_with<E: Embedder + ?Sized>(
        &self,
        embedder: &mut E,
        stamp: BuildStamp,
    ) -> Result<(FlatIndex, BuildOutcome)> {
        let mut documents = self.loader.documents()?;
        let mut chunks: Vec<Chunk> = Vec::new();
        let mut document_count = 0;

        for document in documents.by_ref() {
            let document_chunks = self.chunker.chunk(&document);
            if !document_chunks.is_empty() {
                document_count += 1;
                chunks.extend(document_chunks);
            }
        }
        let skipped = documents.into_skipped();

        if chunks.is_empty() {
            return Err(Error::EmptyCorpus(format!(
                "{} produced no chunks ({} files skipped)",
                self.loader.root().display(),
                skipped.len()
            )));
        }
        info!("embedding {} chunks from {document_count} documents", chunks.len());

        let entries = embed_chunks(embedder, chunks)?;
        let chunk_count = entries.len();
        let index = FlatIndex::build(entries)?;
        self.install(&index, &stamp)?;

        let report = BuildReport {
            documents: document_count,
            chunks: chunk_count,
            skipped,
        };
        Ok((index, BuildOutcome::Rebuilt(report)))
    }

    /// Persist into a staging directory, then swap it in for the old index.
    fn install(&self, index: &FlatIndex, stamp: &BuildStamp) -> Result<()> {
        let parent = match self.index_dir.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)?;
        remove_leftovers(&parent);

        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(&parent)?;
        index.persist(staging.path())?;
        stamp.write(staging.path())?;

        let retired = parent.join(format!("{RETIRED_PREFIX}{}", std::process::id()));
        let had_previous = self.index_dir.exists();
        if had_previous {
            fs::rename(&self.index_dir, &retired)?;
        }

        if let Err(e) = fs::rename(staging.path(), &self.index_dir) {
            if had_previous {
                if let Err(restore) = fs::rename(&retired, &self.index_dir) {
                    warn!("could not restore previous index: {restore}");
                }
            }
            return Err(e.into());
        }

        if had_previous {
            if let Err(e) = fs::remove_dir_all(&retired) {
                warn!("could not remove retired index {}: {e}", retired.display());
            }
        }
        info!("index written to {}", self.index_dir.display());
        Ok(())
    }
}

fn embed_chunks<E: Embedder + ?Sized>(embedder: &mut E, chunks: Vec<Chunk>) -> Result<Vec<IndexEntry>> {
    let mut entries = Vec::with_capacity(chunks.len());
    let mut remaining = chunks.into_iter().peekable();

    while remaining.peek().is_some() {
        let batch: Vec<Chunk> = remaining.by_ref().take(EMBED_BATCH).collect();
        let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
        let embeddings = embedder.embed_documents(&texts)?;

        if embeddings.len() != batch.len() {
            return Err(Error::Embedding(format!(
                "embedder returned {} vectors for {} chunks",
                embeddings.len(),
                batch.len()
            )));
        }
        entries.extend(batch.into_iter().zip(embeddings).map(|(c, e)| IndexEntry::new(c, e)));
    }
    Ok(entries)
}

/// Remove staging and retired directories left behind by interrupted builds.
fn remove_leftovers(parent: &Path) {
    let Ok(entries) = fs::read_dir(parent) else {
        return;
    };
    for entry in entries.flatten() {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name.starts_with(STAGING_PREFIX) || name.starts_with(RETIRED_PREFIX) {
            warn!("removing leftover build directory {name}");
            if let Err(e) = fs::remove_dir_all(entry.path()) {
                warn!("could not remove {name}: {e}");
            }
        }
    }
}
