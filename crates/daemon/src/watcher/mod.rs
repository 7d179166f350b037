// Working-tree change notifier: fsevents/inotify → repository-level events.
//
// One notification per relevant filesystem event. Git's own directory is
// ignored so commits and fetches do not re-trigger the engine. The workspace
// config file is reported separately so the session can reload it.

use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, error, trace, warn};

use crate::config::workspace_config_path;

/// What changed under a watched working tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepoEvent {
    /// Some file in the working tree was created, modified, renamed or removed.
    Changed { paths: Vec<PathBuf> },
    /// The workspace config file changed.
    ConfigChanged,
}

/// Capacity for the internal event channel.
const EVENT_CHANNEL_CAPACITY: usize = 512;

/// Watches a working tree recursively using the OS-native backend.
///
/// Events are sent to the returned receiver until the notifier is dropped.
pub struct ChangeNotifier {
    _watcher: RecommendedWatcher,
    root: PathBuf,
}

impl ChangeNotifier {
    pub fn start(root: &Path) -> Result<(Self, mpsc::Receiver<RepoEvent>)> {
        let root = root
            .canonicalize()
            .with_context(|| format!("failed to canonicalize watch root: {}", root.display()))?;

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let root_for_filter = root.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Some(repo_event) = classify(&event, &root_for_filter) {
                    if tx.blocking_send(repo_event).is_err() {
                        debug!("event channel closed, stopping event dispatch");
                    }
                }
            }
            Err(e) => {
                error!(error = %e, "file watcher error");
            }
        })
        .context("failed to create file watcher")?;

        watcher
            .watch(&root, RecursiveMode::Recursive)
            .with_context(|| format!("failed to watch directory: {}", root.display()))?;

        debug!(path = %root.display(), "change notifier started");

        Ok((Self { _watcher: watcher, root }, rx))
    }

    /// The canonicalized working tree being watched.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// True for anything under `<root>/.git`.
fn is_git_internal(path: &Path, root: &Path) -> bool {
    path.strip_prefix(root)
        .ok()
        .and_then(|relative| relative.components().next())
        .is_some_and(|first| first.as_os_str() == ".git")
}

/// Map a `notify::Event` to at most one repository event.
fn classify(event: &Event, root: &Path) -> Option<RepoEvent> {
    match &event.kind {
        EventKind::Create(_) | EventKind::Remove(_) => {}
        EventKind::Modify(notify::event::ModifyKind::Metadata(_)) => {
            trace!("skipping metadata-only modify event");
            return None;
        }
        EventKind::Modify(_) => {}
        _ => {
            trace!(kind = ?event.kind, "skipping non-content event");
            return None;
        }
    }

    let config_path = workspace_config_path(root);
    let mut paths = Vec::new();
    for path in &event.paths {
        if !path.starts_with(root) {
            warn!(path = %path.display(), "ignoring event outside watch root");
            continue;
        }
        if is_git_internal(path, root) {
            continue;
        }
        if *path == config_path {
            return Some(RepoEvent::ConfigChanged);
        }
        paths.push(path.clone());
    }

    if paths.is_empty() {
        None
    } else {
        Some(RepoEvent::Changed { paths })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, MetadataKind, ModifyKind, RemoveKind};
    use std::fs;
    use tempfile::TempDir;
    use tokio::time::{timeout, Duration};

    fn make_event(kind: EventKind, paths: &[&str]) -> Event {
        Event { kind, paths: paths.iter().map(PathBuf::from).collect(), attrs: Default::default() }
    }

    #[test]
    fn content_changes_are_reported() {
        let root = Path::new("/workspace");
        let event = make_event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            &["/workspace/notes/a.md", "/workspace/src/main.rs"],
        );
        assert_eq!(
            classify(&event, root),
            Some(RepoEvent::Changed {
                paths: vec![PathBuf::from("/workspace/notes/a.md"), PathBuf::from("/workspace/src/main.rs")]
            })
        );

        let removed = make_event(EventKind::Remove(RemoveKind::File), &["/workspace/.env"]);
        assert!(matches!(classify(&removed, root), Some(RepoEvent::Changed { .. })));
    }

    #[test]
    fn git_directory_is_ignored() {
        let root = Path::new("/workspace");
        let event = make_event(
            EventKind::Create(CreateKind::File),
            &["/workspace/.git/index.lock", "/workspace/.git/refs/heads/main"],
        );
        assert_eq!(classify(&event, root), None);

        let lookalike = make_event(EventKind::Create(CreateKind::File), &["/workspace/.github/ci.yml"]);
        assert!(classify(&lookalike, root).is_some());
    }

    #[test]
    fn config_file_is_reported_separately() {
        let root = Path::new("/workspace");
        let event = make_event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            &["/workspace/.gitdoc/config.toml"],
        );
        assert_eq!(classify(&event, root), Some(RepoEvent::ConfigChanged));
    }

    #[test]
    fn metadata_access_and_outside_events_are_skipped() {
        let root = Path::new("/workspace");
        let metadata = make_event(
            EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions)),
            &["/workspace/a.md"],
        );
        assert_eq!(classify(&metadata, root), None);

        let access = make_event(EventKind::Access(AccessKind::Read), &["/workspace/a.md"]);
        assert_eq!(classify(&access, root), None);

        let outside = make_event(EventKind::Create(CreateKind::File), &["/etc/passwd"]);
        assert_eq!(classify(&outside, root), None);
    }

    #[tokio::test]
    async fn notifier_reports_file_writes() {
        let tmp = TempDir::new().unwrap();
        let (notifier, mut rx) = ChangeNotifier::start(tmp.path()).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        fs::write(tmp.path().join("draft.txt"), "hello").unwrap();

        let event = timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for change event")
            .expect("channel closed");
        match event {
            RepoEvent::Changed { paths } => assert!(paths.iter().any(|p| p.ends_with("draft.txt"))),
            other => panic!("unexpected event {other:?}"),
        }

        drop(notifier);
    }

    #[test]
    fn notifier_rejects_nonexistent_root() {
        assert!(ChangeNotifier::start(Path::new("/nonexistent/path/abc123")).is_err());
    }

    #[test]
    fn notifier_exposes_canonical_root() {
        let tmp = TempDir::new().unwrap();
        let (notifier, _rx) = ChangeNotifier::start(tmp.path()).unwrap();
        assert_eq!(notifier.root(), tmp.path().canonicalize().unwrap());
    }
}
