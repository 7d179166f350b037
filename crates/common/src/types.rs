// Core domain types shared across gitdoc crates.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Stable identifier for a managed working tree (its canonical root).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RepoId(PathBuf);

impl RepoId {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self(root.into())
    }

    pub fn root(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Which status list a change came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// Unstaged edit or untracked file.
    WorkingTree,
    /// Change recorded in the index.
    Staged,
    /// Unmerged path left by a conflicting merge.
    MergeConflict,
}

/// One changed path reported by repository status.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChangeRecord {
    /// Absolute path of the changed file.
    pub path: PathBuf,
    pub kind: ChangeKind,
}

impl ChangeRecord {
    pub fn new(path: impl Into<PathBuf>, kind: ChangeKind) -> Self {
        Self { path: path.into(), kind }
    }
}

/// The three status lists of a working tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryChanges {
    pub working_tree: Vec<ChangeRecord>,
    pub index: Vec<ChangeRecord>,
    pub merge: Vec<ChangeRecord>,
}

impl RepositoryChanges {
    pub fn is_empty(&self) -> bool {
        self.working_tree.is_empty() && self.index.is_empty() && self.merge.is_empty()
    }

    /// All records from the three lists, working tree first, then merge,
    /// then index. A path may appear more than once.
    pub fn all(&self) -> impl Iterator<Item = &ChangeRecord> {
        self.working_tree.iter().chain(self.merge.iter()).chain(self.index.iter())
    }
}

/// Kind of git reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefKind {
    Head,
    RemoteHead,
    Tag,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitRef {
    pub name: String,
    pub kind: RefKind,
}

/// Diagnostic severity as reported by an editor or linter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
    Information,
    Hint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    #[serde(default)]
    pub message: String,
}

impl Diagnostic {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self { severity, message: message.into() }
    }
}

/// All diagnostics currently known for one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDiagnostics {
    /// `file:` URI or plain filesystem path.
    pub uri: String,
    #[serde(default)]
    pub diagnostics: Vec<Diagnostic>,
}

/// Push/pull progress flags, observable by status displays.
///
/// Push and pull are not serialized against each other, so both flags can be
/// set at the same time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncState {
    pub is_pushing: bool,
    pub is_pulling: bool,
}

impl SyncState {
    /// Status suffix in the form used by the status indicator.
    /// Pushing takes precedence over pulling.
    pub fn label(&self) -> &'static str {
        if self.is_pushing {
            " (Pushing...)"
        } else if self.is_pulling {
            " (Pulling...)"
        } else {
            ""
        }
    }

    pub fn is_idle(&self) -> bool {
        !self.is_pushing && !self.is_pulling
    }
}
