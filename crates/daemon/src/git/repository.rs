// Repository capability: the operations the engine needs from version control.
//
// `GitRepository` implements it with the `git` executable. Git calls block, so
// each one runs on the blocking pool and the async side only awaits the result.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use gitdoc_common::types::{ChangeKind, ChangeRecord, GitRef, RefKind, RepoId, RepositoryChanges};
use tracing::debug;

use super::worker::{
    CommandExecutor, GitCommandOutput, GitWorker, GitWorkerError, ProcessCommandExecutor,
};

/// Force semantics for a push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForcePushMode {
    Force,
    ForceWithLease,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushRequest {
    pub remote: String,
    /// Branch to push; `None` lets git pick the configured upstream.
    pub branch: Option<String>,
    pub follow_tags: bool,
    pub force: Option<ForcePushMode>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitOptions {
    /// Stage every tracked and untracked change before committing.
    pub all: bool,
    /// Skip pre-commit and commit-msg hooks.
    pub no_verify: bool,
    /// Author and committer date for this commit only.
    pub timestamp: Option<DateTime<Utc>>,
}

/// Version-control operations consumed by the engine.
///
/// All methods return `Send` futures so engine tasks can run on a
/// multi-threaded tokio runtime.
pub trait Repository: Send + Sync + 'static {
    fn id(&self) -> &RepoId;

    fn refs(&self) -> impl Future<Output = Result<Vec<GitRef>, GitWorkerError>> + Send;

    fn changes(&self) -> impl Future<Output = Result<RepositoryChanges, GitWorkerError>> + Send;

    /// Name of the checked-out branch, `None` when HEAD is detached.
    fn head_branch(&self) -> impl Future<Output = Result<Option<String>, GitWorkerError>> + Send;

    /// Diff of one file against HEAD.
    fn diff_with_head(
        &self,
        path: &Path,
    ) -> impl Future<Output = Result<String, GitWorkerError>> + Send;

    fn commit(
        &self,
        message: &str,
        options: CommitOptions,
    ) -> impl Future<Output = Result<(), GitWorkerError>> + Send;

    fn push(&self, request: PushRequest) -> impl Future<Output = Result<(), GitWorkerError>> + Send;

    fn pull(&self) -> impl Future<Output = Result<(), GitWorkerError>> + Send;
}

/// Date format git accepts in `GIT_AUTHOR_DATE` / `GIT_COMMITTER_DATE`.
pub fn git_date(timestamp: DateTime<Utc>) -> String {
    timestamp.format("%Y-%m-%dT%H:%M:%S+00:00").to_string()
}

/// Environment for network operations: never block on a credential prompt.
fn network_env() -> Vec<(String, String)> {
    vec![("GIT_TERMINAL_PROMPT".to_string(), "0".to_string())]
}

pub struct GitRepository<E = ProcessCommandExecutor> {
    id: RepoId,
    worker: Arc<GitWorker<E>>,
}

impl GitRepository<ProcessCommandExecutor> {
    /// Open the working tree containing `path`.
    pub fn open(path: &Path) -> Result<Self, GitWorkerError> {
        let probe = GitWorker::new(path);
        let output = probe.run(&["rev-parse", "--show-toplevel"])?;
        let toplevel = PathBuf::from(output.stdout.trim());
        let root = toplevel.canonicalize().unwrap_or(toplevel);
        debug!(root = %root.display(), "opened repository");
        Ok(Self { id: RepoId::new(root.clone()), worker: Arc::new(GitWorker::new(root)) })
    }
}

impl<E: CommandExecutor + 'static> GitRepository<E> {
    pub fn with_executor(root: impl Into<PathBuf>, executor: E) -> Self {
        let root = root.into();
        Self { id: RepoId::new(root.clone()), worker: Arc::new(GitWorker::with_executor(root, executor)) }
    }

    pub fn root(&self) -> &Path {
        self.id.root()
    }

    async fn git(
        &self,
        args: Vec<String>,
        envs: Vec<(String, String)>,
    ) -> Result<GitCommandOutput, GitWorkerError> {
        let worker = self.worker.clone();
        let command = format!("git {}", args.join(" "));
        tokio::task::spawn_blocking(move || worker.run_with_env(&args, &envs))
            .await
            .map_err(|error| GitWorkerError::TaskFailed { command, message: error.to_string() })?
    }
}

fn args(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|part| part.to_string()).collect()
}

impl<E: CommandExecutor + 'static> Repository for GitRepository<E> {
    fn id(&self) -> &RepoId {
        &self.id
    }

    async fn refs(&self) -> Result<Vec<GitRef>, GitWorkerError> {
        let output = self.git(args(&["for-each-ref", "--format=%(refname)"]), Vec::new()).await?;
        Ok(parse_refs(&output.stdout))
    }

    async fn changes(&self) -> Result<RepositoryChanges, GitWorkerError> {
        let output = self
            .git(args(&["status", "--porcelain=v1", "-z", "--untracked-files=all"]), Vec::new())
            .await?;
        Ok(parse_porcelain_status(&output.stdout, self.root()))
    }

    async fn head_branch(&self) -> Result<Option<String>, GitWorkerError> {
        match self.git(args(&["symbolic-ref", "--quiet", "--short", "HEAD"]), Vec::new()).await {
            Ok(output) => {
                let name = output.stdout.trim();
                Ok((!name.is_empty()).then(|| name.to_string()))
            }
            // Exit code 1 means HEAD is detached.
            Err(error) if error.exit_code() == Some(1) => Ok(None),
            Err(error) => Err(error),
        }
    }

    async fn diff_with_head(&self, path: &Path) -> Result<String, GitWorkerError> {
        let relative = path.strip_prefix(self.root()).unwrap_or(path);
        let mut command = args(&["diff", "--no-color", "HEAD", "--"]);
        command.push(relative.to_string_lossy().into_owned());
        let output = self.git(command, Vec::new()).await?;
        Ok(output.stdout)
    }

    async fn commit(&self, message: &str, options: CommitOptions) -> Result<(), GitWorkerError> {
        if options.all {
            self.git(args(&["add", "--all"]), Vec::new()).await?;
        }

        let mut command = args(&["commit", "--cleanup=verbatim", "-m", message]);
        if options.no_verify {
            command.push("--no-verify".to_string());
        }

        let envs = match options.timestamp {
            Some(timestamp) => {
                let date = git_date(timestamp);
                vec![
                    ("GIT_AUTHOR_DATE".to_string(), date.clone()),
                    ("GIT_COMMITTER_DATE".to_string(), date),
                ]
            }
            None => Vec::new(),
        };

        self.git(command, envs).await?;
        Ok(())
    }

    async fn push(&self, request: PushRequest) -> Result<(), GitWorkerError> {
        self.git(push_args(&request), network_env()).await?;
        Ok(())
    }

    async fn pull(&self) -> Result<(), GitWorkerError> {
        self.git(args(&["pull", "--no-edit"]), network_env()).await?;
        Ok(())
    }
}

/// Command-line arguments for a push request.
pub fn push_args(request: &PushRequest) -> Vec<String> {
    let mut command = vec!["push".to_string()];
    match request.force {
        Some(ForcePushMode::Force) => command.push("--force".to_string()),
        Some(ForcePushMode::ForceWithLease) => command.push("--force-with-lease".to_string()),
        None => {}
    }
    if request.follow_tags {
        command.push("--follow-tags".to_string());
    }
    command.push(request.remote.clone());
    if let Some(branch) = &request.branch {
        command.push(branch.clone());
    }
    command
}

/// Classify `for-each-ref --format=%(refname)` output.
pub fn parse_refs(output: &str) -> Vec<GitRef> {
    output
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let (kind, name) = if let Some(name) = line.strip_prefix("refs/heads/") {
                (RefKind::Head, name)
            } else if let Some(name) = line.strip_prefix("refs/remotes/") {
                (RefKind::RemoteHead, name)
            } else if let Some(name) = line.strip_prefix("refs/tags/") {
                (RefKind::Tag, name)
            } else {
                return None;
            };
            Some(GitRef { name: name.to_string(), kind })
        })
        .collect()
}

/// Parse `git status --porcelain=v1 -z` into the three change lists.
///
/// Unmerged entries go to `merge`; otherwise a non-blank index column yields
/// a staged record and a non-blank worktree column (or `??`) a working-tree
/// record. Paths are joined onto `root`.
pub fn parse_porcelain_status(output: &str, root: &Path) -> RepositoryChanges {
    let mut changes = RepositoryChanges::default();
    let mut entries = output.split('\0').filter(|entry| !entry.is_empty());

    while let Some(entry) = entries.next() {
        if entry.len() < 4 {
            continue;
        }
        let mut codes = entry.chars();
        let (Some(x), Some(y)) = (codes.next(), codes.next()) else {
            continue;
        };
        let path = root.join(&entry[3..]);

        // Renames and copies carry the original path as the next entry.
        if matches!(x, 'R' | 'C') || matches!(y, 'R' | 'C') {
            entries.next();
        }

        match (x, y) {
            ('?', '?') => changes.working_tree.push(ChangeRecord::new(path, ChangeKind::WorkingTree)),
            ('!', '!') => {}
            ('U', _) | (_, 'U') | ('A', 'A') | ('D', 'D') => {
                changes.merge.push(ChangeRecord::new(path, ChangeKind::MergeConflict));
            }
            _ => {
                if x != ' ' {
                    changes.index.push(ChangeRecord::new(path.clone(), ChangeKind::Staged));
                }
                if y != ' ' {
                    changes.working_tree.push(ChangeRecord::new(path, ChangeKind::WorkingTree));
                }
            }
        }
    }

    changes
}
