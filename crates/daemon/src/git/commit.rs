// Commit coordinator: gate, message, commit, then on-commit sync.
//
// Every commit stages all tracked and untracked changes. The author and
// committer date is the UTC instant the message was resolved for, passed to
// the commit process only.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use gitdoc_common::types::RepoId;
use thiserror::Error;
use tracing::{debug, info};

use super::gate::{self, GateDecision};
use super::message;
use super::repository::{CommitOptions, Repository};
use super::sync::{SyncCoordinator, SyncError};
use super::worker::GitWorkerError;
use crate::ai::TextGenerator;
use crate::config::{AutoPull, AutoPush, ConfigHandle};
use crate::diagnostics::DiagnosticsSource;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    NoChanges,
    NoMatchingPaths,
    BlockedByDiagnostics { blocked: Vec<PathBuf> },
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoChanges => "no_changes",
            Self::NoMatchingPaths => "no_matching_paths",
            Self::BlockedByDiagnostics { .. } => "blocked_by_diagnostics",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    /// The gate found nothing eligible; the repository was not touched.
    Skipped(SkipReason),
    Committed { message: String, paths: Vec<PathBuf> },
}

#[derive(Debug, Error)]
pub enum CommitError {
    #[error("failed to read status for {repo}: {source}")]
    Status { repo: String, source: GitWorkerError },

    #[error("commit failed for {repo}: {source}")]
    Commit { repo: String, source: GitWorkerError },

    #[error("committed \"{message}\" but sync failed: {source}")]
    Sync { message: String, source: SyncError },
}

pub struct CommitCoordinator<R> {
    repository: Arc<R>,
    config: ConfigHandle,
    diagnostics: Arc<dyn DiagnosticsSource>,
    generator: Option<Arc<dyn TextGenerator>>,
    sync: Arc<SyncCoordinator<R>>,
    clock: fn() -> DateTime<Utc>,
}

impl<R: Repository> CommitCoordinator<R> {
    pub fn new(
        sync: Arc<SyncCoordinator<R>>,
        config: ConfigHandle,
        diagnostics: Arc<dyn DiagnosticsSource>,
        generator: Option<Arc<dyn TextGenerator>>,
    ) -> Self {
        Self {
            repository: sync.repository().clone(),
            config,
            diagnostics,
            generator,
            sync,
            clock: Utc::now,
        }
    }

    /// Replace the wall clock.
    pub fn with_clock(mut self, clock: fn() -> DateTime<Utc>) -> Self {
        self.clock = clock;
        self
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    pub fn config(&self) -> &ConfigHandle {
        &self.config
    }

    pub fn sync(&self) -> &Arc<SyncCoordinator<R>> {
        &self.sync
    }

    /// Commit eligible changes. `explicit` is stored verbatim and skips
    /// message generation.
    pub async fn commit(&self, explicit: Option<&str>) -> Result<CommitOutcome, CommitError> {
        let config = self.config.snapshot();
        let repo = self.repository.id();

        let decision = gate::evaluate(&*self.repository, &config, &*self.diagnostics)
            .await
            .map_err(|source| CommitError::Status { repo: repo.to_string(), source })?;

        let paths = match decision {
            GateDecision::Eligible { paths } => paths,
            GateDecision::NoChanges => return Ok(skip(repo, SkipReason::NoChanges)),
            GateDecision::NoMatchingPaths => return Ok(skip(repo, SkipReason::NoMatchingPaths)),
            GateDecision::BlockedByDiagnostics { blocked, .. } => {
                return Ok(skip(repo, SkipReason::BlockedByDiagnostics { blocked }))
            }
        };

        let now = (self.clock)();
        let message = message::resolve(
            &*self.repository,
            &paths,
            explicit,
            now,
            &config,
            self.generator.as_deref(),
        )
        .await;

        let options = CommitOptions { all: true, no_verify: config.no_verify, timestamp: Some(now) };
        self.repository
            .commit(&message, options)
            .await
            .map_err(|source| CommitError::Commit { repo: repo.to_string(), source })?;
        info!(repo = %repo, paths = paths.len(), %message, "committed");

        if config.auto_push == AutoPush::OnCommit {
            self.sync
                .push(false)
                .await
                .map_err(|source| CommitError::Sync { message: message.clone(), source })?;
        }
        if config.auto_pull == AutoPull::OnCommit {
            self.sync
                .pull()
                .await
                .map_err(|source| CommitError::Sync { message: message.clone(), source })?;
        }

        Ok(CommitOutcome::Committed { message, paths })
    }
}

fn skip(repo: &RepoId, reason: SkipReason) -> CommitOutcome {
    debug!(repo = %repo, reason = reason.as_str(), "nothing to commit");
    CommitOutcome::Skipped(reason)
}
