// Change gate: decides whether the current working-tree changes may be
// committed automatically.
//
// 1. union of working-tree, staged and merge-conflict changes
// 2. glob filter on the absolute path (dotfiles included)
// 3. optional diagnostics check on exactly the filtered paths

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use gitdoc_common::path::{path_key, uri_key};
use gitdoc_common::types::{FileDiagnostics, RepositoryChanges, Severity};
use globset::{GlobBuilder, GlobMatcher};
use tracing::{debug, warn};

use super::repository::Repository;
use super::worker::GitWorkerError;
use crate::config::{CommitValidationLevel, GitDocConfig};
use crate::diagnostics::DiagnosticsSource;

/// Compiled `file_pattern`.
#[derive(Debug, Clone)]
pub struct PathPattern {
    matcher: GlobMatcher,
}

impl PathPattern {
    /// `*` stays within one path segment, `**` crosses segments.
    pub fn compile(pattern: &str) -> Result<Self, globset::Error> {
        let glob = GlobBuilder::new(pattern).literal_separator(true).build()?;
        Ok(Self { matcher: glob.compile_matcher() })
    }

    pub fn matches(&self, path: &Path) -> bool {
        let unified = path.to_string_lossy().replace('\\', "/");
        self.matcher.is_match(unified.as_str())
    }
}

/// Whether a single file is covered by the configured pattern. An invalid
/// pattern covers nothing.
pub fn matches(config: &GitDocConfig, path: &Path) -> bool {
    match PathPattern::compile(&config.file_pattern) {
        Ok(pattern) => pattern.matches(path),
        Err(error) => {
            warn!(pattern = %config.file_pattern, %error, "invalid file_pattern");
            false
        }
    }
}

/// Outcome of one gate pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Nothing changed in the working tree.
    NoChanges,
    /// Changes exist but none match `file_pattern`.
    NoMatchingPaths,
    /// Matching paths carry blocking diagnostics.
    BlockedByDiagnostics { paths: Vec<PathBuf>, blocked: Vec<PathBuf> },
    Eligible { paths: Vec<PathBuf> },
}

impl GateDecision {
    pub fn is_eligible(&self) -> bool {
        matches!(self, Self::Eligible { .. })
    }

    /// Paths that passed the pattern filter (empty unless matching paths exist).
    pub fn changed_paths(&self) -> &[PathBuf] {
        match self {
            Self::Eligible { paths } | Self::BlockedByDiagnostics { paths, .. } => paths.as_slice(),
            Self::NoChanges | Self::NoMatchingPaths => &[],
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            Self::NoChanges => "no_changes",
            Self::NoMatchingPaths => "no_matching_paths",
            Self::BlockedByDiagnostics { .. } => "blocked_by_diagnostics",
            Self::Eligible { .. } => "eligible",
        }
    }
}

fn blocks(level: CommitValidationLevel, severity: Severity) -> bool {
    match level {
        CommitValidationLevel::None => false,
        CommitValidationLevel::Error => severity == Severity::Error,
        CommitValidationLevel::Warning => matches!(severity, Severity::Error | Severity::Warning),
    }
}

/// Pure gate logic over already collected changes and diagnostics.
pub fn evaluate_changes(
    changes: &RepositoryChanges,
    config: &GitDocConfig,
    diagnostics: &[FileDiagnostics],
) -> GateDecision {
    if changes.is_empty() {
        return GateDecision::NoChanges;
    }

    let pattern = match PathPattern::compile(&config.file_pattern) {
        Ok(pattern) => pattern,
        Err(error) => {
            warn!(pattern = %config.file_pattern, %error, "invalid file_pattern, nothing matches");
            return GateDecision::NoMatchingPaths;
        }
    };

    let mut seen = HashSet::new();
    let paths: Vec<PathBuf> = changes
        .all()
        .filter(|change| pattern.matches(&change.path))
        .filter(|change| seen.insert(change.path.clone()))
        .map(|change| change.path.clone())
        .collect();

    if paths.is_empty() {
        return GateDecision::NoMatchingPaths;
    }

    let level = config.commit_validation_level;
    if level == CommitValidationLevel::None {
        return GateDecision::Eligible { paths };
    }

    let blocking_keys: HashSet<String> = diagnostics
        .iter()
        .filter(|file| file.diagnostics.iter().any(|d| blocks(level, d.severity)))
        .map(|file| uri_key(&file.uri))
        .collect();

    let blocked: Vec<PathBuf> =
        paths.iter().filter(|path| blocking_keys.contains(&path_key(path))).cloned().collect();

    if blocked.is_empty() {
        GateDecision::Eligible { paths }
    } else {
        GateDecision::BlockedByDiagnostics { paths, blocked }
    }
}

/// Run the gate against the repository's current status.
pub async fn evaluate<R: Repository>(
    repository: &R,
    config: &GitDocConfig,
    diagnostics: &dyn DiagnosticsSource,
) -> Result<GateDecision, GitWorkerError> {
    let changes = repository.changes().await?;
    let known = if config.commit_validation_level == CommitValidationLevel::None {
        Vec::new()
    } else {
        diagnostics.all_diagnostics()
    };

    let decision = evaluate_changes(&changes, config, &known);
    debug!(
        repo = %repository.id(),
        decision = decision.reason(),
        paths = decision.changed_paths().len(),
        "change gate evaluated"
    );
    Ok(decision)
}
