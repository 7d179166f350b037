// Diagnostics capability and an in-memory store hosts can publish into.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use anyhow::{Context, Result};
use gitdoc_common::types::{Diagnostic, FileDiagnostics};
use tracing::{debug, warn};

/// Source of currently known diagnostics, keyed by file URI or path.
pub trait DiagnosticsSource: Send + Sync {
    fn all_diagnostics(&self) -> Vec<FileDiagnostics>;
}

/// Thread-safe diagnostics map. Publishing for a URI replaces its previous
/// diagnostics; publishing an empty list clears it.
#[derive(Debug, Default)]
pub struct DiagnosticsStore {
    entries: RwLock<BTreeMap<String, Vec<Diagnostic>>>,
}

impl DiagnosticsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, uri: impl Into<String>, diagnostics: Vec<Diagnostic>) {
        let uri = uri.into();
        let mut entries = self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        if diagnostics.is_empty() {
            entries.remove(&uri);
        } else {
            entries.insert(uri, diagnostics);
        }
    }

    pub fn clear(&self) {
        self.entries.write().unwrap_or_else(|poisoned| poisoned.into_inner()).clear();
    }

    /// Replace the store contents with a JSON array of `{uri, diagnostics}`.
    pub fn load_json(&self, path: &Path) -> Result<usize> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read diagnostics file {}", path.display()))?;
        let files: Vec<FileDiagnostics> = serde_json::from_str(&contents)
            .with_context(|| format!("invalid diagnostics file {}", path.display()))?;

        self.clear();
        let count = files.len();
        for file in files {
            self.publish(file.uri, file.diagnostics);
        }
        debug!(path = %path.display(), files = count, "loaded diagnostics");
        Ok(count)
    }
}

impl DiagnosticsSource for DiagnosticsStore {
    fn all_diagnostics(&self) -> Vec<FileDiagnostics> {
        self.entries
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .map(|(uri, diagnostics)| FileDiagnostics { uri: uri.clone(), diagnostics: diagnostics.clone() })
            .collect()
    }
}

/// Diagnostics re-read from a JSON file on every lookup. A missing or
/// malformed file reports no diagnostics.
#[derive(Debug)]
pub struct JsonDiagnosticsFile {
    path: PathBuf,
}

impl JsonDiagnosticsFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DiagnosticsSource for JsonDiagnosticsFile {
    fn all_diagnostics(&self) -> Vec<FileDiagnostics> {
        if !self.path.exists() {
            return Vec::new();
        }
        let store = DiagnosticsStore::new();
        match store.load_json(&self.path) {
            Ok(_) => store.all_diagnostics(),
            Err(error) => {
                warn!(error = %format!("{error:#}"), "ignoring diagnostics file");
                Vec::new()
            }
        }
    }
}
