// Watch session: wires notifier, scheduler, coordinators and timers for a set
// of working trees, and tears them down together.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::ai::TextGenerator;
use crate::config::{workspace_config_path, ConfigHandle, ConfigPublisher, GitDocConfig};
use crate::diagnostics::DiagnosticsSource;
use crate::git::repository::{GitRepository, Repository};
use crate::git::sync::{ForcePushPrompt, SyncCoordinator};
use crate::git::triggers::{CommitScheduler, IntervalTimers};
use crate::git::CommitCoordinator;
use crate::watcher::{ChangeNotifier, RepoEvent};

/// Capabilities shared by every repository in a session.
#[derive(Clone)]
pub struct SessionCapabilities {
    pub diagnostics: Arc<dyn DiagnosticsSource>,
    pub generator: Option<Arc<dyn TextGenerator>>,
    pub prompt: Arc<dyn ForcePushPrompt>,
}

/// Build the commit coordinator for one working tree with its effective
/// config, returning the publisher that feeds config reloads.
pub fn open_repository(
    path: &Path,
    capabilities: &SessionCapabilities,
) -> Result<(Arc<CommitCoordinator<GitRepository>>, ConfigPublisher)> {
    let repository = GitRepository::open(path)
        .with_context(|| format!("{} is not inside a git working tree", path.display()))?;
    let config = GitDocConfig::load(repository.root());
    let (publisher, handle) = ConfigHandle::channel(config);

    let repository = Arc::new(repository);
    let sync = Arc::new(SyncCoordinator::new(repository, handle.clone(), capabilities.prompt.clone()));
    let coordinator = Arc::new(CommitCoordinator::new(
        sync,
        handle,
        capabilities.diagnostics.clone(),
        capabilities.generator.clone(),
    ));
    Ok((coordinator, publisher))
}

pub struct WatchSession {
    scheduler: Arc<CommitScheduler>,
    coordinators: Vec<Arc<CommitCoordinator<GitRepository>>>,
    shutdown_tx: broadcast::Sender<()>,
    tasks: Vec<JoinHandle<()>>,
}

impl WatchSession {
    /// Start watching every path. Fails before anything is spawned if one of
    /// them is not a git working tree.
    pub async fn start(paths: &[PathBuf], capabilities: SessionCapabilities) -> Result<Self> {
        let mut opened = Vec::with_capacity(paths.len());
        for path in paths {
            let (coordinator, publisher) = open_repository(path, &capabilities)?;
            let root = coordinator.repository().root().to_path_buf();
            let (notifier, events) = ChangeNotifier::start(&root)?;
            opened.push((coordinator, publisher, notifier, events));
        }

        let scheduler = Arc::new(CommitScheduler::new());
        let (shutdown_tx, _) = broadcast::channel(4);
        let mut coordinators = Vec::with_capacity(opened.len());
        let mut tasks = Vec::new();

        for (coordinator, publisher, notifier, events) in opened {
            let config = coordinator.config().snapshot();
            info!(
                repo = %coordinator.repository().id(),
                pattern = %config.file_pattern,
                delay_ms = config.auto_commit_delay,
                "watching repository"
            );

            if config.pull_on_open {
                let sync = coordinator.sync().clone();
                tasks.push(tokio::spawn(async move {
                    if let Err(error) = sync.pull().await {
                        warn!(repo = %sync.repository().id(), %error, "pull on open failed");
                    }
                }));
            }

            tasks.push(tokio::spawn(log_sync_state(
                coordinator.sync().clone(),
                shutdown_tx.subscribe(),
            )));
            tasks.push(tokio::spawn(run_repository(RepositoryLoop {
                coordinator: coordinator.clone(),
                publisher,
                scheduler: scheduler.clone(),
                notifier,
                events,
                shutdown: shutdown_tx.subscribe(),
            })));
            coordinators.push(coordinator);
        }

        Ok(Self { scheduler, coordinators, shutdown_tx, tasks })
    }

    pub fn coordinators(&self) -> &[Arc<CommitCoordinator<GitRepository>>] {
        &self.coordinators
    }

    pub fn scheduler(&self) -> &Arc<CommitScheduler> {
        &self.scheduler
    }

    /// Cancel pending debounce timers and interval timers, then wait for the
    /// session tasks to stop. Commits, pushes and pulls already running are
    /// left to finish on their own.
    pub async fn shutdown(mut self) {
        self.scheduler.cancel_all();
        let _ = self.shutdown_tx.send(());
        for task in self.tasks.drain(..) {
            let _ = task.await;
        }
        info!("watch session stopped");
    }
}

impl Drop for WatchSession {
    fn drop(&mut self) {
        self.scheduler.cancel_all();
        let _ = self.shutdown_tx.send(());
    }
}

struct RepositoryLoop {
    coordinator: Arc<CommitCoordinator<GitRepository>>,
    publisher: ConfigPublisher,
    scheduler: Arc<CommitScheduler>,
    notifier: ChangeNotifier,
    events: mpsc::Receiver<RepoEvent>,
    shutdown: broadcast::Receiver<()>,
}

async fn run_repository(mut ctx: RepositoryLoop) {
    let sync = ctx.coordinator.sync().clone();
    let mut intervals = IntervalTimers::start(&sync, &ctx.coordinator.config().snapshot());

    loop {
        tokio::select! {
            _ = ctx.shutdown.recv() => break,
            event = ctx.events.recv() => match event {
                Some(RepoEvent::Changed { paths }) => {
                    debug!(repo = %sync.repository().id(), changed = paths.len(), "working tree changed");
                    ctx.scheduler.on_repository_changed(&ctx.coordinator);
                }
                Some(RepoEvent::ConfigChanged) => {
                    if let Some(config) = reload_config(ctx.notifier.root()) {
                        ctx.publisher.publish(config);
                        intervals.cancel();
                        intervals = IntervalTimers::start(&sync, &ctx.coordinator.config().snapshot());
                    }
                    ctx.scheduler.on_repository_changed(&ctx.coordinator);
                }
                None => break,
            }
        }
    }

    intervals.cancel();
    debug!(repo = %sync.repository().id(), "repository loop stopped");
}

/// Effective config after the workspace file changed, or `None` to keep the
/// current one when the file exists but cannot be parsed.
fn reload_config(root: &Path) -> Option<GitDocConfig> {
    let path = workspace_config_path(root);
    if path.exists() {
        if let Err(error) = GitDocConfig::load_from(&path) {
            warn!(path = %path.display(), %error, "keeping previous config");
            return None;
        }
    }
    let config = GitDocConfig::load(root);
    info!(path = %path.display(), "config reloaded");
    Some(config)
}

async fn log_sync_state<R: Repository>(
    sync: Arc<SyncCoordinator<R>>,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut state: watch::Receiver<_> = sync.subscribe();
    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *state.borrow_and_update();
                info!(
                    repo = %sync.repository().id(),
                    pushing = current.is_pushing,
                    pulling = current.is_pulling,
                    "gitdoc{}",
                    current.label()
                );
            }
        }
    }
}
