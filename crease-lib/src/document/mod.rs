//! Corpus loading
//!
//! Walks a corpus directory, extracts text from every supported file and
//! attaches any sidecar player metadata. Text extraction is isolated behind
//! [`TextExtractor`] so the PDF library can be swapped without touching the
//! chunker or anything downstream.
//!
//! # Usage
//!
//! ```ignore
//! use crease_lib::document::CorpusLoader;
//!
//! let loader = CorpusLoader::new("data");
//! let mut documents = loader.documents()?;
//! for document in documents.by_ref() {
//!     println!("{} ({} chars)", document.id, document.raw_text.len());
//! }
//! for skipped in documents.skipped() {
//!     eprintln!("skipped {}: {}", skipped.path.display(), skipped.reason);
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::DEFAULT_METADATA_FILE;
use crate::{Error, Result};

/// Separator inserted between pages of a multi-page document.
pub const PAGE_BREAK: char = '\u{0C}';

/// Structured attributes attached to a document (player name, team, ...)
pub type Metadata = BTreeMap<String, String>;

/// A source document with its extracted text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Path relative to the corpus root, `/`-separated
    pub id: String,
    /// Path of the file on disk
    pub path: PathBuf,
    /// Page texts joined by [`PAGE_BREAK`]
    pub raw_text: String,
    /// Sidecar metadata, empty when none matched
    pub metadata: Metadata,
}

impl Document {
    /// Returns the 1-based page containing the given character offset.
    #[must_use]
    pub fn page_at(&self, char_offset: usize) -> usize {
        page_at(&self.raw_text, char_offset)
    }

    /// One-line player description from sidecar metadata, e.g.
    /// `Virat Kohli (Batter, Royal Challengers Bengaluru, India)`.
    ///
    /// `None` when no record matched the document.
    #[must_use]
    pub fn label(&self) -> Option<String> {
        let name = self.metadata.get("name").map(|n| n.trim()).filter(|n| !n.is_empty())?;
        let details: Vec<&str> = LABEL_FIELDS
            .iter()
            .filter_map(|key| self.metadata.get(*key))
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .collect();

        if details.is_empty() {
            Some(name.to_string())
        } else {
            Some(format!("{name} ({})", details.join(", ")))
        }
    }
}

const LABEL_FIELDS: [&str; 3] = ["role", "ipl_team", "country"];

pub(crate) fn page_at(text: &str, char_offset: usize) -> usize {
    1 + text
        .chars()
        .take(char_offset)
        .filter(|&c| c == PAGE_BREAK)
        .count()
}

/// Extracts per-page text from one file format.
pub trait TextExtractor: Send + Sync {
    /// Lower-case file extensions handled by this extractor
    fn extensions(&self) -> &[&str];

    /// Extract the text of each page, in page order
    fn extract_pages(&self, path: &Path) -> Result<Vec<String>>;
}

/// A file that could not be loaded and was left out of the corpus
#[derive(Debug, Clone)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Reads documents from a corpus directory.
pub struct CorpusLoader {
    root: PathBuf,
    metadata_file: Option<String>,
    extractors: Vec<Box<dyn TextExtractor>>,
}

impl CorpusLoader {
    /// Create a loader for PDF and plain-text files under `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            metadata_file: Some(DEFAULT_METADATA_FILE.to_string()),
            extractors: vec![Box::new(PdfExtractor), Box::new(PlainTextExtractor)],
        }
    }

    /// Use a different sidecar metadata file name (relative to the root).
    #[must_use]
    pub fn with_metadata_file(mut self, name: impl Into<String>) -> Self {
        self.metadata_file = Some(name.into());
        self
    }

    /// Ignore sidecar metadata entirely.
    #[must_use]
    pub fn without_metadata(mut self) -> Self {
        self.metadata_file = None;
        self
    }

    /// Register an extra extractor; it takes precedence for its extensions.
    #[must_use]
    pub fn with_extractor(mut self, extractor: impl TextExtractor + 'static) -> Self {
        self.extractors.insert(0, Box::new(extractor));
        self
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Full path of the sidecar metadata file, if one is configured.
    #[must_use]
    pub fn metadata_path(&self) -> Option<PathBuf> {
        self.metadata_file.as_ref().map(|name| self.root.join(name))
    }

    /// All file extensions some extractor can handle.
    #[must_use]
    pub fn extensions(&self) -> Vec<&str> {
        let mut extensions: Vec<&str> = self
            .extractors
            .iter()
            .flat_map(|e| e.extensions().iter().copied())
            .collect();
        extensions.sort_unstable();
        extensions.dedup();
        extensions
    }

    /// List supported files under the root in a stable order.
    ///
    /// Hidden files and directories are skipped.
    pub fn list_files(&self) -> Result<Vec<PathBuf>> {
        if !self.root.is_dir() {
            return Err(Error::Configuration(format!(
                "corpus directory does not exist: {}",
                self.root.display()
            )));
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(&self.root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("skipping unreadable corpus entry: {e}");
                    continue;
                }
            };
            if entry.file_type().is_file() && self.extractor_for(entry.path()).is_some() {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }

    /// Start a fresh pass over the corpus.
    ///
    /// Documents are extracted lazily as the iterator advances.
    pub fn documents(&self) -> Result<Documents<'_>> {
        let files = self.list_files()?;
        let metadata = match self.metadata_path() {
            Some(path) => PlayerMetadata::load(&path),
            None => PlayerMetadata::default(),
        };
        Ok(Documents {
            loader: self,
            files: files.into_iter(),
            metadata,
            skipped: Vec::new(),
        })
    }

    /// Load a single file from the corpus.
    pub fn load_file(&self, path: &Path) -> Result<Document> {
        self.load_with(path, &PlayerMetadata::default())
    }

    fn load_with(&self, path: &Path, metadata: &PlayerMetadata) -> Result<Document> {
        let extractor = self.extractor_for(path).ok_or_else(|| {
            Error::Document(format!("unsupported file type: {}", path.display()))
        })?;

        let pages = extractor.extract_pages(path)?;
        let separator = PAGE_BREAK.to_string();
        let raw_text = pages.join(separator.as_str());
        if raw_text.trim().is_empty() {
            warn!("no extractable text in {}", path.display());
        }

        Ok(Document {
            id: document_id(&self.root, path),
            path: path.to_path_buf(),
            raw_text,
            metadata: metadata.lookup(path).cloned().unwrap_or_default(),
        })
    }

    fn extractor_for(&self, path: &Path) -> Option<&dyn TextExtractor> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        self.extractors
            .iter()
            .find(|e| e.extensions().contains(&extension.as_str()))
            .map(|e| &**e)
    }
}

/// One pass over a corpus, yielding each loadable document.
///
/// Files that fail to load are logged, recorded in [`Documents::skipped`],
/// and passed over.
pub struct Documents<'a> {
    loader: &'a CorpusLoader,
    files: std::vec::IntoIter<PathBuf>,
    metadata: PlayerMetadata,
    skipped: Vec<SkippedFile>,
}

impl Documents<'_> {
    /// Files skipped so far in this pass.
    #[must_use]
    pub fn skipped(&self) -> &[SkippedFile] {
        &self.skipped
    }

    /// Consume the pass, returning the skipped files.
    #[must_use]
    pub fn into_skipped(self) -> Vec<SkippedFile> {
        self.skipped
    }
}

impl Iterator for Documents<'_> {
    type Item = Document;

    fn next(&mut self) -> Option<Self::Item> {
        for path in self.files.by_ref() {
            match self.loader.load_with(&path, &self.metadata) {
                Ok(document) => {
                    debug!("loaded {} ({} chars)", document.id, document.raw_text.len());
                    return Some(document);
                }
                Err(e) => {
                    warn!("skipping {}: {e}", path.display());
                    self.skipped.push(SkippedFile {
                        path,
                        reason: e.to_string(),
                    });
                }
            }
        }
        None
    }
}

fn document_id(root: &Path, path: &Path) -> String {
    match path.strip_prefix(root) {
        Ok(relative) => relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
        Err(_) => path.to_string_lossy().into_owned(),
    }
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|s| s.starts_with('.'))
}

mod metadata;
mod pdf;

pub use metadata::*;
pub use pdf::*;

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn with_metadata(pairs: &[(&str, &str)]) -> Document {
        Document {
            id: "Virat_Kohli.pdf".to_string(),
            path: PathBuf::from("Virat_Kohli.pdf"),
            raw_text: String::new(),
            metadata: pairs.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())).collect(),
        }
    }

    #[test]
    fn test_label_from_player_record() {
        let document = with_metadata(&[
            ("name", "Virat Kohli"),
            ("role", "Batter"),
            ("ipl_team", "Royal Challengers Bengaluru"),
            ("country", "India"),
            ("age", "37"),
        ]);
        assert_eq!(
            document.label().as_deref(),
            Some("Virat Kohli (Batter, Royal Challengers Bengaluru, India)")
        );
    }

    #[test]
    fn test_label_skips_blank_fields_and_needs_a_name() {
        let partial = with_metadata(&[("name", "Virat Kohli"), ("role", " "), ("country", "India")]);
        assert_eq!(partial.label().as_deref(), Some("Virat Kohli (India)"));

        let bare = with_metadata(&[("name", "Virat Kohli")]);
        assert_eq!(bare.label().as_deref(), Some("Virat Kohli"));

        assert!(with_metadata(&[("role", "Batter")]).label().is_none());
    }

    #[test]
    fn test_empty_directory_yields_nothing() {
        let tmp = TempDir::new().unwrap();
        let loader = CorpusLoader::new(tmp.path());
        assert_eq!(loader.documents().unwrap().count(), 0);
    }

    #[test]
    fn test_missing_directory_is_configuration_error() {
        let tmp = TempDir::new().unwrap();
        let loader = CorpusLoader::new(tmp.path().join("nope"));
        assert!(matches!(loader.documents(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_loads_text_files_in_sorted_order() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("rcb")).unwrap();
        fs::write(tmp.path().join("rcb/Virat_Kohli.txt"), "Virat Kohli bats at three.").unwrap();
        fs::write(tmp.path().join("Jasprit_Bumrah.txt"), "Bumrah bowls yorkers.").unwrap();
        fs::write(tmp.path().join("notes.csv"), "ignored").unwrap();

        let loader = CorpusLoader::new(tmp.path());
        let ids: Vec<String> = loader.documents().unwrap().map(|d| d.id).collect();
        assert_eq!(ids, vec!["Jasprit_Bumrah.txt", "rcb/Virat_Kohli.txt"]);
    }

    #[test]
    fn test_hidden_entries_skipped() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join(".cache")).unwrap();
        fs::write(tmp.path().join(".cache/stale.txt"), "old").unwrap();
        fs::write(tmp.path().join("a.txt"), "fresh").unwrap();

        let loader = CorpusLoader::new(tmp.path());
        assert_eq!(loader.list_files().unwrap().len(), 1);
    }

    #[test]
    fn test_corrupt_pdf_is_skipped_not_fatal() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("broken.pdf"), b"definitely not a pdf").unwrap();
        fs::write(tmp.path().join("ok.txt"), "MS Dhoni keeps wicket.").unwrap();

        let loader = CorpusLoader::new(tmp.path());
        let mut documents = loader.documents().unwrap();
        let loaded: Vec<Document> = documents.by_ref().collect();

        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, "ok.txt");
        assert_eq!(documents.skipped().len(), 1);
        assert!(documents.skipped()[0].path.ends_with("broken.pdf"));
    }

    #[test]
    fn test_documents_is_restartable() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a.txt"), "one").unwrap();

        let loader = CorpusLoader::new(tmp.path());
        assert_eq!(loader.documents().unwrap().count(), 1);
        assert_eq!(loader.documents().unwrap().count(), 1);
    }

    #[test]
    fn test_page_at_counts_page_breaks() {
        let text = format!("page one{PAGE_BREAK}page two{PAGE_BREAK}page three");
        assert_eq!(page_at(&text, 0), 1);
        assert_eq!(page_at(&text, 8), 1);
        assert_eq!(page_at(&text, 9), 2);
        assert_eq!(page_at(&text, text.chars().count()), 3);
    }

    #[test]
    fn test_sidecar_metadata_attached() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("Rohit_Sharma.txt"), "Rohit Sharma opens.").unwrap();
        fs::write(
            tmp.path().join(DEFAULT_METADATA_FILE),
            r#"{"Rohit Sharma": {"name": "Rohit Sharma", "team": "Mumbai Indians"}}"#,
        )
        .unwrap();

        let loader = CorpusLoader::new(tmp.path());
        let docs: Vec<Document> = loader.documents().unwrap().collect();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].metadata.get("team").map(String::as_str), Some("Mumbai Indians"));
    }
}
