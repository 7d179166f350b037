// In-memory repository for coordinator tests.

use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use gitdoc_common::types::{GitRef, RefKind, RepoId, RepositoryChanges, SyncState};
use tokio::sync::watch;

use super::repository::{CommitOptions, PushRequest, Repository};
use super::worker::GitWorkerError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Call {
    Refs,
    Changes,
    Diff(PathBuf),
    Commit { message: String, options: CommitOptions },
    Push(PushRequest),
    Pull,
}

pub(crate) fn rejected(command: &str) -> GitWorkerError {
    GitWorkerError::CommandFailed {
        command: command.to_string(),
        code: Some(1),
        stderr: "! [rejected] main -> main (non-fast-forward)".to_string(),
    }
}

pub(crate) struct FakeRepository {
    id: RepoId,
    refs: Mutex<Vec<GitRef>>,
    changes: Mutex<RepositoryChanges>,
    branch: Mutex<Option<String>>,
    diffs: Mutex<HashMap<PathBuf, String>>,
    commit_results: Mutex<VecDeque<Result<(), GitWorkerError>>>,
    push_results: Mutex<VecDeque<Result<(), GitWorkerError>>>,
    pull_results: Mutex<VecDeque<Result<(), GitWorkerError>>>,
    state_probe: Mutex<Option<watch::Receiver<SyncState>>>,
    observed: Mutex<Vec<(&'static str, SyncState)>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeRepository {
    /// A repository on branch `main` with no remotes and a clean tree.
    pub(crate) fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            id: RepoId::new(root.into()),
            refs: Mutex::new(vec![GitRef { name: "main".into(), kind: RefKind::Head }]),
            changes: Mutex::new(RepositoryChanges::default()),
            branch: Mutex::new(Some("main".into())),
            diffs: Mutex::new(HashMap::new()),
            commit_results: Mutex::new(VecDeque::new()),
            push_results: Mutex::new(VecDeque::new()),
            pull_results: Mutex::new(VecDeque::new()),
            state_probe: Mutex::new(None),
            observed: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_remote(self) -> Self {
        self.refs
            .lock()
            .unwrap()
            .push(GitRef { name: "origin/main".into(), kind: RefKind::RemoteHead });
        self
    }

    pub(crate) fn set_changes(&self, changes: RepositoryChanges) {
        *self.changes.lock().unwrap() = changes;
    }

    pub(crate) fn set_branch(&self, branch: Option<&str>) {
        *self.branch.lock().unwrap() = branch.map(str::to_string);
    }

    pub(crate) fn set_diff(&self, path: impl Into<PathBuf>, diff: &str) {
        self.diffs.lock().unwrap().insert(path.into(), diff.to_string());
    }

    pub(crate) fn script_commit(&self, result: Result<(), GitWorkerError>) {
        self.commit_results.lock().unwrap().push_back(result);
    }

    pub(crate) fn script_push(&self, result: Result<(), GitWorkerError>) {
        self.push_results.lock().unwrap().push_back(result);
    }

    pub(crate) fn script_pull(&self, result: Result<(), GitWorkerError>) {
        self.pull_results.lock().unwrap().push_back(result);
    }

    /// Record the sync state seen at the start of every push and pull.
    pub(crate) fn probe_state(&self, rx: watch::Receiver<SyncState>) {
        *self.state_probe.lock().unwrap() = Some(rx);
    }

    pub(crate) fn observed(&self) -> Vec<(&'static str, SyncState)> {
        self.observed.lock().unwrap().clone()
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn pushes(&self) -> Vec<PushRequest> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Push(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn commits(&self) -> Vec<(String, CommitOptions)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Commit { message, options } => Some((message, options)),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn pull_count(&self) -> usize {
        self.calls().iter().filter(|call| **call == Call::Pull).count()
    }

    pub(crate) fn diffed_paths(&self) -> Vec<PathBuf> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Diff(path) => Some(path),
                _ => None,
            })
            .collect()
    }

    fn observe(&self, operation: &'static str) {
        if let Some(rx) = self.state_probe.lock().unwrap().as_ref() {
            let state = *rx.borrow();
            self.observed.lock().unwrap().push((operation, state));
        }
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Repository for FakeRepository {
    fn id(&self) -> &RepoId {
        &self.id
    }

    async fn refs(&self) -> Result<Vec<GitRef>, GitWorkerError> {
        self.record(Call::Refs);
        Ok(self.refs.lock().unwrap().clone())
    }

    async fn changes(&self) -> Result<RepositoryChanges, GitWorkerError> {
        self.record(Call::Changes);
        Ok(self.changes.lock().unwrap().clone())
    }

    async fn head_branch(&self) -> Result<Option<String>, GitWorkerError> {
        Ok(self.branch.lock().unwrap().clone())
    }

    async fn diff_with_head(&self, path: &Path) -> Result<String, GitWorkerError> {
        self.record(Call::Diff(path.to_path_buf()));
        Ok(self.diffs.lock().unwrap().get(path).cloned().unwrap_or_default())
    }

    async fn commit(&self, message: &str, options: CommitOptions) -> Result<(), GitWorkerError> {
        self.record(Call::Commit { message: message.to_string(), options });
        self.commit_results.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    async fn push(&self, request: PushRequest) -> Result<(), GitWorkerError> {
        self.observe("push");
        self.record(Call::Push(request));
        self.push_results.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }

    async fn pull(&self) -> Result<(), GitWorkerError> {
        self.observe("pull");
        self.record(Call::Pull);
        self.pull_results.lock().unwrap().pop_front().unwrap_or(Ok(()))
    }
}
