// Push/pull coordination with observable progress flags.
//
// Push: optional pull first, then push with the configured force mode. A
// rejected push asks the confirmation capability once; a confirmed retry uses
// hard force. Push and pull may overlap and each owns its own flag.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use gitdoc_common::types::{RefKind, RepoId, SyncState};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::repository::{ForcePushMode, PushRequest, Repository};
use super::worker::GitWorkerError;
use crate::config::{AutoPull, ConfigHandle, GitDocConfig, PushMode};

/// Asks whether a rejected push should be retried with force.
pub trait ForcePushPrompt: Send + Sync {
    fn confirm_force_push(
        &self,
        repository: &RepoId,
    ) -> Pin<Box<dyn Future<Output = bool> + Send + '_>>;
}

/// Accepts every force-push prompt.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysConfirm;

impl ForcePushPrompt for AlwaysConfirm {
    fn confirm_force_push(&self, _: &RepoId) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        Box::pin(async { true })
    }
}

/// Declines every force-push prompt.
#[derive(Debug, Default, Clone, Copy)]
pub struct Decline;

impl ForcePushPrompt for Decline {
    fn confirm_force_push(&self, _: &RepoId) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        Box::pin(async { false })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// The repository has no remote-tracking refs.
    NoRemote,
    Pushed,
    /// A hard force push succeeded, either requested up front or as the
    /// confirmed retry of a rejected push.
    ForcePushed,
    /// The first attempt was rejected and the force push was declined.
    Declined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullOutcome {
    NoRemote,
    Pulled,
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to list refs for {repo}: {source}")]
    Refs { repo: String, source: GitWorkerError },

    #[error("pull failed for {repo}: {source}")]
    Pull { repo: String, source: GitWorkerError },

    #[error("forced push failed for {repo}: {source}")]
    ForcedPush { repo: String, source: GitWorkerError },
}

impl SyncError {
    /// The git failure underneath.
    pub fn into_source(self) -> GitWorkerError {
        match self {
            Self::Refs { source, .. } | Self::Pull { source, .. } | Self::ForcedPush { source, .. } => {
                source
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Flag {
    Pushing,
    Pulling,
}

impl Flag {
    fn set(self, state: &mut SyncState, value: bool) {
        match self {
            Self::Pushing => state.is_pushing = value,
            Self::Pulling => state.is_pulling = value,
        }
    }
}

/// Raises a flag for its lifetime; dropping it clears the flag on every path.
struct FlagGuard<'a> {
    state: &'a watch::Sender<SyncState>,
    flag: Flag,
}

impl<'a> FlagGuard<'a> {
    fn raise(state: &'a watch::Sender<SyncState>, flag: Flag) -> Self {
        state.send_modify(|s| flag.set(s, true));
        Self { state, flag }
    }
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        let flag = self.flag;
        self.state.send_modify(|s| flag.set(s, false));
    }
}

pub struct SyncCoordinator<R> {
    repository: Arc<R>,
    config: ConfigHandle,
    prompt: Arc<dyn ForcePushPrompt>,
    state: watch::Sender<SyncState>,
}

impl<R: Repository> SyncCoordinator<R> {
    pub fn new(repository: Arc<R>, config: ConfigHandle, prompt: Arc<dyn ForcePushPrompt>) -> Self {
        let (state, _) = watch::channel(SyncState::default());
        Self { repository, config, prompt, state }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    /// Current flags.
    pub fn state(&self) -> SyncState {
        *self.state.borrow()
    }

    /// Receiver notified on every flag change.
    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.state.subscribe()
    }

    fn repo(&self) -> String {
        self.repository.id().to_string()
    }

    pub async fn has_remotes(&self) -> Result<bool, SyncError> {
        let refs = self
            .repository
            .refs()
            .await
            .map_err(|source| SyncError::Refs { repo: self.repo(), source })?;
        Ok(refs.iter().any(|r| r.kind == RefKind::RemoteHead))
    }

    pub async fn pull(&self) -> Result<PullOutcome, SyncError> {
        if !self.has_remotes().await? {
            debug!(repo = %self.repository.id(), "no remotes, skipping pull");
            return Ok(PullOutcome::NoRemote);
        }

        let _pulling = FlagGuard::raise(&self.state, Flag::Pulling);
        self.repository
            .pull()
            .await
            .map_err(|source| SyncError::Pull { repo: self.repo(), source })?;
        debug!(repo = %self.repository.id(), "pulled");
        Ok(PullOutcome::Pulled)
    }

    /// Push the current branch. `force` starts with a hard force push and
    /// never prompts.
    pub async fn push(&self, force: bool) -> Result<PushOutcome, SyncError> {
        if !self.has_remotes().await? {
            debug!(repo = %self.repository.id(), "no remotes, skipping push");
            return Ok(PushOutcome::NoRemote);
        }

        let config = self.config.snapshot();
        let error = match self.attempt(&config, force).await {
            Ok(()) => return Ok(if force { PushOutcome::ForcePushed } else { PushOutcome::Pushed }),
            Err(error) => error,
        };

        if force {
            return Err(SyncError::ForcedPush { repo: self.repo(), source: error });
        }

        warn!(repo = %self.repository.id(), %error, "push rejected, remote has conflicting changes");
        if !self.prompt.confirm_force_push(self.repository.id()).await {
            info!(repo = %self.repository.id(), "force push declined");
            return Ok(PushOutcome::Declined);
        }

        self.attempt(&config, true)
            .await
            .map_err(|source| SyncError::ForcedPush { repo: self.repo(), source })?;
        info!(repo = %self.repository.id(), "force pushed");
        Ok(PushOutcome::ForcePushed)
    }

    /// One push attempt with `is_pushing` raised for its whole duration,
    /// including the pull that precedes it.
    async fn attempt(&self, config: &GitDocConfig, force: bool) -> Result<(), GitWorkerError> {
        let _pushing = FlagGuard::raise(&self.state, Flag::Pushing);

        if config.auto_pull == AutoPull::OnPush {
            self.pull().await.map_err(SyncError::into_source)?;
        }

        let branch = self.repository.head_branch().await?;
        let request = PushRequest {
            remote: config.remote.clone(),
            branch,
            follow_tags: false,
            force: force_mode(config.push_mode, force),
        };
        debug!(repo = %self.repository.id(), ?request, "pushing");
        self.repository.push(request).await
    }
}

fn force_mode(mode: PushMode, force: bool) -> Option<ForcePushMode> {
    if force {
        return Some(ForcePushMode::Force);
    }
    match mode {
        PushMode::Push => None,
        PushMode::ForcePush => Some(ForcePushMode::Force),
        PushMode::ForcePushWithLease => Some(ForcePushMode::ForceWithLease),
    }
}
