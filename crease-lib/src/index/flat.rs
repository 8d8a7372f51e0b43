use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chunk::Chunk;
use crate::embed::normalize;
use crate::index::{rank_order, IndexEntry, RetrievalResult, ScoredChunk, VectorIndex};
use crate::{Error, Result};

pub const VECTORS_FILE: &str = "vectors.bin";
pub const CHUNKS_FILE: &str = "chunks.jsonl";
pub const MANIFEST_FILE: &str = "manifest.json";

const FORMAT_VERSION: u32 = 1;
const METRIC: &str = "cosine";

#[derive(Debug, Serialize, Deserialize)]
struct Manifest {
    format_version: u32,
    dimension: usize,
    rows: usize,
    metric: String,
}

/// Exact nearest-neighbour index over unit-length vectors.
///
/// Scores every stored row against the query, so results are exact. Rows are
/// normalised on build and queries on search, making the dot product a
/// cosine similarity. Fine for corpora of a few hundred thousand chunks.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    dimension: usize,
    chunks: Vec<Chunk>,
    /// Row-major, `chunks.len() * dimension` values
    vectors: Vec<f32>,
}

impl FlatIndex {
    /// Build an index from entries.
    ///
    /// Fails with [`Error::EmptyCorpus`] when there are no entries and with
    /// [`Error::DimensionMismatch`] when embeddings disagree in length.
    pub fn build(entries: Vec<IndexEntry>) -> Result<Self> {
        let Some(first) = entries.first() else {
            return Err(Error::EmptyCorpus("no entries to index".to_string()));
        };
        let dimension = first.embedding.len();
        if dimension == 0 {
            return Err(Error::Configuration("embeddings must not be empty".to_string()));
        }

        let mut chunks = Vec::with_capacity(entries.len());
        let mut vectors = Vec::with_capacity(entries.len() * dimension);
        for IndexEntry { chunk, mut embedding } in entries {
            if embedding.len() != dimension {
                return Err(Error::DimensionMismatch {
                    expected: dimension,
                    actual: embedding.len(),
                });
            }
            normalize(&mut embedding);
            vectors.extend_from_slice(&embedding);
            chunks.push(chunk);
        }

        Ok(Self { dimension, chunks, vectors })
    }

    /// Write the index bundle into `dir`, creating it if needed.
    ///
    /// The manifest is written last.
    pub fn persist(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)?;

        write_synced(&dir.join(VECTORS_FILE), |w| {
            for value in &self.vectors {
                w.write_all(&value.to_le_bytes())?;
            }
            Ok(())
        })?;

        write_synced(&dir.join(CHUNKS_FILE), |w| {
            for chunk in &self.chunks {
                serde_json::to_writer(&mut *w, chunk)?;
                w.write_all(b"\n")?;
            }
            Ok(())
        })?;

        let manifest = Manifest {
            format_version: FORMAT_VERSION,
            dimension: self.dimension,
            rows: self.chunks.len(),
            metric: METRIC.to_string(),
        };
        write_synced(&dir.join(MANIFEST_FILE), |w| {
            serde_json::to_writer_pretty(&mut *w, &manifest)?;
            Ok(())
        })?;

        debug!("persisted {} rows to {}", self.chunks.len(), dir.display());
        Ok(())
    }

    /// Open a persisted index.
    ///
    /// Any missing or unreadable file, or any disagreement between the
    /// manifest, the vector file and the chunk store, is reported as
    /// [`Error::IndexCorrupt`].
    pub fn load(dir: &Path) -> Result<Self> {
        let manifest: Manifest = {
            let bytes = read_part(dir, MANIFEST_FILE)?;
            serde_json::from_slice(&bytes)
                .map_err(|e| corrupt(dir, format!("unreadable {MANIFEST_FILE}: {e}")))?
        };
        if manifest.format_version != FORMAT_VERSION {
            return Err(corrupt(dir, format!("unsupported format version {}", manifest.format_version)));
        }
        if manifest.metric != METRIC {
            return Err(corrupt(dir, format!("unsupported metric {}", manifest.metric)));
        }
        if manifest.dimension == 0 || manifest.rows == 0 {
            return Err(corrupt(dir, "manifest describes an empty index"));
        }

        let expected_len = manifest
            .rows
            .checked_mul(manifest.dimension)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| corrupt(dir, "manifest dimensions overflow"))?;
        let bytes = read_part(dir, VECTORS_FILE)?;
        if bytes.len() != expected_len {
            return Err(corrupt(
                dir,
                format!("{VECTORS_FILE} holds {} bytes, expected {expected_len}", bytes.len()),
            ));
        }
        let vectors: Vec<f32> = bytes
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();

        let file = File::open(dir.join(CHUNKS_FILE))
            .map_err(|e| corrupt(dir, format!("missing {CHUNKS_FILE}: {e}")))?;
        let mut chunks = Vec::with_capacity(manifest.rows);
        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| corrupt(dir, format!("unreadable {CHUNKS_FILE}: {e}")))?;
            if line.trim().is_empty() {
                continue;
            }
            let chunk: Chunk = serde_json::from_str(&line)
                .map_err(|e| corrupt(dir, format!("{CHUNKS_FILE} line {}: {e}", line_no + 1)))?;
            chunks.push(chunk);
        }
        if chunks.len() != manifest.rows {
            return Err(corrupt(
                dir,
                format!("{} chunk records for {} vector rows", chunks.len(), manifest.rows),
            ));
        }

        Ok(Self {
            dimension: manifest.dimension,
            chunks,
            vectors,
        })
    }

    /// Stored chunks in row order.
    #[must_use]
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    fn row(&self, i: usize) -> &[f32] {
        &self.vectors[i * self.dimension..(i + 1) * self.dimension]
    }
}

impl VectorIndex for FlatIndex {
    fn search(&self, query: &[f32], k: usize) -> Result<RetrievalResult> {
        if k == 0 {
            return Err(Error::Configuration("k must be greater than zero".to_string()));
        }
        if query.len() != self.dimension {
            return Err(Error::DimensionMismatch {
                expected: self.dimension,
                actual: query.len(),
            });
        }

        let mut query = query.to_vec();
        normalize(&mut query);

        let mut scored: Vec<ScoredChunk> = (0..self.chunks.len())
            .map(|i| ScoredChunk {
                chunk: self.chunks[i].clone(),
                score: dot(&query, self.row(i)),
            })
            .collect();
        scored.sort_by(rank_order);
        scored.truncate(k);
        Ok(scored)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        self.chunks.len()
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn write_synced(
    path: &Path,
    body: impl FnOnce(&mut BufWriter<File>) -> Result<()>,
) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    body(&mut writer)?;
    let file = writer.into_inner().map_err(|e| Error::Io(e.into_error()))?;
    file.sync_all()?;
    Ok(())
}

fn read_part(dir: &Path, name: &str) -> Result<Vec<u8>> {
    fs::read(dir.join(name)).map_err(|e| corrupt(dir, format!("missing {name}: {e}")))
}

fn corrupt(dir: &Path, reason: impl std::fmt::Display) -> Error {
    Error::IndexCorrupt(format!("{}: {reason}", dir.display()))
}
