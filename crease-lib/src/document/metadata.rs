use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::document::Metadata;
use crate::Result;

/// Player records from the dataset's `player_metadata.json` sidecar.
///
/// The sidecar maps a player name to a record. A record is matched to a
/// document either through its `pdf_path` file name or through the
/// sanitised player name, which is how the dataset names its PDFs.
#[derive(Debug, Default, Clone)]
pub struct PlayerMetadata {
    by_file_name: HashMap<String, Metadata>,
    by_stem: HashMap<String, Metadata>,
}

impl PlayerMetadata {
    /// Load the sidecar at `path`.
    ///
    /// A missing file yields empty metadata; an unreadable or malformed one is
    /// logged and ignored.
    #[must_use]
    pub fn load(path: &Path) -> Self {
        if !path.is_file() {
            return Self::default();
        }
        let parsed = fs::read_to_string(path)
            .map_err(crate::Error::from)
            .and_then(|json| Self::from_json(&json));
        match parsed {
            Ok(metadata) => {
                info!("loaded {} player records from {}", metadata.len(), path.display());
                metadata
            }
            Err(e) => {
                warn!("ignoring metadata file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    /// Parse sidecar JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let root: Map<String, Value> = serde_json::from_str(json)?;
        let mut metadata = Self::default();

        for (player, record) in root {
            let Value::Object(fields) = record else {
                continue;
            };
            let flat = flatten(&player, &fields);

            if let Some(file_name) = flat
                .get("pdf_path")
                .and_then(|p| Path::new(p).file_name())
                .map(|n| n.to_string_lossy().into_owned())
            {
                metadata.by_file_name.insert(file_name, flat.clone());
            }
            let name = flat.get("name").cloned().unwrap_or(player);
            metadata.by_stem.insert(sanitize_name(&name), flat);
        }
        Ok(metadata)
    }

    /// Find the record for a document path.
    #[must_use]
    pub fn lookup(&self, path: &Path) -> Option<&Metadata> {
        let by_name = path
            .file_name()
            .and_then(|n| self.by_file_name.get(n.to_string_lossy().as_ref()));
        by_name.or_else(|| {
            path.file_stem()
                .and_then(|s| self.by_stem.get(s.to_string_lossy().as_ref()))
        })
    }

    /// Number of player records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_stem.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_stem.is_empty()
    }
}

fn flatten(player: &str, fields: &Map<String, Value>) -> Metadata {
    let mut flat = Metadata::new();
    flat.insert("name".to_string(), player.to_string());

    for (key, value) in fields {
        match value {
            Value::Object(nested) => {
                for (inner, value) in nested {
                    if let Some(s) = scalar(value) {
                        flat.insert(format!("{key}.{inner}"), s);
                    }
                }
            }
            other => {
                if let Some(s) = scalar(other) {
                    flat.insert(key.clone(), s);
                }
            }
        }
    }
    flat
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// File stem the dataset builder derives from a player name.
///
/// Runs of characters outside `[A-Za-z0-9_-]` collapse to one `_`, and
/// leading/trailing underscores are trimmed.
#[must_use]
pub fn sanitize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut in_run = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
            out.push(c);
            in_run = false;
        } else if !in_run {
            out.push('_');
            in_run = true;
        }
    }
    out.trim_matches('_').to_string()
}
