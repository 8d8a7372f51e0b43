//! Corpus fingerprinting for rebuild detection
//!
//! The fingerprint is a blake3 digest over the relative path and full content
//! of every file the loader would read, plus the metadata sidecar. Any added,
//! removed, renamed or edited file changes it; touching a file does not.

use std::fs::{self, File};
use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::document::CorpusLoader;
use crate::Result;

pub const STAMP_FILE: &str = "stamp.json";

/// Compute the content fingerprint of the corpus a loader reads.
pub fn corpus_fingerprint(loader: &CorpusLoader) -> Result<String> {
    let mut hasher = blake3::Hasher::new();

    for path in loader.list_files()? {
        hash_file(&mut hasher, loader.root(), &path)?;
    }
    if let Some(metadata) = loader.metadata_path().filter(|p| p.is_file()) {
        hash_file(&mut hasher, loader.root(), &metadata)?;
    }

    Ok(hasher.finalize().to_hex().to_string())
}

fn hash_file(hasher: &mut blake3::Hasher, root: &Path, path: &Path) -> Result<()> {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let name = relative.to_string_lossy();
    let len = fs::metadata(path)?.len();

    // length-prefix names and contents so concatenations stay unambiguous
    hasher.update(&(name.len() as u64).to_le_bytes());
    hasher.update(name.as_bytes());
    hasher.update(&len.to_le_bytes());
    io::copy(&mut File::open(path)?, hasher)?;
    Ok(())
}

/// Everything that, when changed, invalidates a persisted index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildStamp {
    pub fingerprint: String,
    pub embedding_model: String,
    pub max_chars: usize,
    pub overlap_chars: usize,
}

impl BuildStamp {
    /// Read the stamp stored in an index directory, if there is a readable one.
    #[must_use]
    pub fn read(index_dir: &Path) -> Option<Self> {
        let bytes = fs::read(index_dir.join(STAMP_FILE)).ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// Write the stamp into an index directory.
    pub fn write(&self, index_dir: &Path) -> Result<()> {
        let json = serde_json::to_vec_pretty(self)?;
        fs::write(index_dir.join(STAMP_FILE), json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn fingerprint(dir: &Path) -> String {
        corpus_fingerprint(&CorpusLoader::new(dir)).unwrap()
    }

    #[test]
    fn test_stable_for_unchanged_corpus() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.txt"), "Shubman Gill").unwrap();
        assert_eq!(fingerprint(tmp.path()), fingerprint(tmp.path()));
    }

    #[test]
    fn test_changes_when_file_added_removed_or_edited() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.txt"), "Shubman Gill").unwrap();
        let original = fingerprint(tmp.path());

        fs::write(tmp.path().join("b.txt"), "Yashasvi Jaiswal").unwrap();
        let added = fingerprint(tmp.path());
        assert_ne!(original, added);

        fs::remove_file(tmp.path().join("b.txt")).unwrap();
        assert_eq!(fingerprint(tmp.path()), original);

        fs::write(tmp.path().join("a.txt"), "Shubman Gill, opener").unwrap();
        assert_ne!(fingerprint(tmp.path()), original);
    }

    #[test]
    fn test_renaming_changes_fingerprint() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.txt"), "same").unwrap();
        let before = fingerprint(tmp.path());

        fs::rename(tmp.path().join("a.txt"), tmp.path().join("b.txt")).unwrap();
        assert_ne!(fingerprint(tmp.path()), before);
    }

    #[test]
    fn test_metadata_sidecar_included() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.txt"), "Hardik Pandya").unwrap();
        let before = fingerprint(tmp.path());

        fs::write(tmp.path().join("player_metadata.json"), "{}").unwrap();
        assert_ne!(fingerprint(tmp.path()), before);
    }

    #[test]
    fn test_unsupported_files_ignored() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.txt"), "Hardik Pandya").unwrap();
        let before = fingerprint(tmp.path());

        fs::create_dir(tmp.path().join("images")).unwrap();
        fs::write(tmp.path().join("images/Hardik_Pandya.jpg"), [0xFF, 0xD8]).unwrap();
        assert_eq!(fingerprint(tmp.path()), before);
    }

    #[test]
    fn test_stamp_round_trip() {
        let tmp = TempDir::new().unwrap();
        let stamp = BuildStamp {
            fingerprint: "abc".to_string(),
            embedding_model: "hash".to_string(),
            max_chars: 800,
            overlap_chars: 120,
        };
        assert!(BuildStamp::read(tmp.path()).is_none());

        stamp.write(tmp.path()).unwrap();
        assert_eq!(BuildStamp::read(tmp.path()), Some(stamp));
    }
}
