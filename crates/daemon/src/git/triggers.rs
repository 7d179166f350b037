// Commit triggers: per-repository debounce and fixed-interval sync timers.
//
// Every change notification replaces the pending debounce timer for its
// repository, so a burst yields one commit measured from the last
// notification. A timer leaves the registry the moment it fires; from then on
// its commit runs to completion and later triggers only start a new timer.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use gitdoc_common::types::RepoId;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::commit::{CommitCoordinator, CommitOutcome};
use super::repository::Repository;
use super::sync::SyncCoordinator;
use crate::config::{AutoPull, AutoPush, GitDocConfig};

// ── Debounced commits ───────────────────────────────────────────────

struct PendingTimer {
    generation: u64,
    handle: JoinHandle<()>,
}

type Registry = Arc<Mutex<HashMap<RepoId, PendingTimer>>>;

fn lock(registry: &Registry) -> MutexGuard<'_, HashMap<RepoId, PendingTimer>> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Registry of pending debounce timers, one per repository.
#[derive(Default)]
pub struct CommitScheduler {
    pending: Registry,
    generation: AtomicU64,
}

impl CommitScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `action` once `delay` has passed without another call for `repo`.
    pub fn schedule<F, Fut>(&self, repo: RepoId, delay: Duration, action: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let registry = self.pending.clone();
        let key = repo.clone();

        // Held until the new timer is registered so it cannot observe the
        // slot before its own entry exists.
        let mut pending = lock(&self.pending);
        if let Some(previous) = pending.remove(&repo) {
            previous.handle.abort();
        }

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let mut pending = lock(&registry);
                match pending.get(&key) {
                    Some(timer) if timer.generation == generation => {
                        pending.remove(&key);
                    }
                    _ => return,
                }
            }
            action().await;
        });

        pending.insert(repo, PendingTimer { generation, handle });
    }

    /// Debounce an automatic commit through `coordinator`.
    pub fn on_repository_changed<R: Repository>(&self, coordinator: &Arc<CommitCoordinator<R>>) {
        let delay = coordinator.config().snapshot().auto_commit_delay();
        let repo = coordinator.repository().id().clone();
        let coordinator = coordinator.clone();
        debug!(repo = %repo, delay_ms = delay.as_millis() as u64, "commit scheduled");

        self.schedule(repo, delay, move || async move {
            let repo = coordinator.repository().id();
            match coordinator.commit(None).await {
                Ok(CommitOutcome::Committed { message, .. }) => {
                    debug!(repo = %repo, %message, "automatic commit done");
                }
                Ok(CommitOutcome::Skipped(reason)) => {
                    debug!(repo = %repo, reason = reason.as_str(), "automatic commit skipped");
                }
                Err(error) => warn!(repo = %repo, %error, "automatic commit failed"),
            }
        });
    }

    pub fn is_pending(&self, repo: &RepoId) -> bool {
        lock(&self.pending).contains_key(repo)
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.pending).len()
    }

    /// Abort every timer that has not fired yet.
    pub fn cancel_all(&self) {
        let mut pending = lock(&self.pending);
        for (repo, timer) in pending.drain() {
            debug!(repo = %repo, "pending commit cancelled");
            timer.handle.abort();
        }
    }
}

impl Drop for CommitScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

// ── Interval sync ───────────────────────────────────────────────────

/// Fixed-interval timers that run until cancelled or dropped. Operations a
/// tick started keep running after cancellation.
#[derive(Default)]
pub struct IntervalTimers {
    handles: Vec<JoinHandle<()>>,
}

impl IntervalTimers {
    /// Start the push and pull timers whose mode is `after_delay`.
    pub fn start<R: Repository>(sync: &Arc<SyncCoordinator<R>>, config: &GitDocConfig) -> Self {
        let mut timers = Self::default();
        let repo = sync.repository().id().clone();

        if config.auto_push == AutoPush::AfterDelay {
            let sync = sync.clone();
            timers.every("push", &repo, config.auto_push_delay(), move || {
                let sync = sync.clone();
                async move {
                    if let Err(error) = sync.push(false).await {
                        warn!(repo = %sync.repository().id(), %error, "interval push failed");
                    }
                }
            });
        }

        if config.auto_pull == AutoPull::AfterDelay {
            let sync = sync.clone();
            timers.every("pull", &repo, config.auto_pull_delay(), move || {
                let sync = sync.clone();
                async move {
                    if let Err(error) = sync.pull().await {
                        warn!(repo = %sync.repository().id(), %error, "interval pull failed");
                    }
                }
            });
        }

        timers
    }

    /// Spawn `tick()` as its own task every `period`, first after one period.
    pub fn every<F, Fut>(&mut self, name: &'static str, repo: &RepoId, period: Duration, tick: F)
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if period.is_zero() {
            warn!(repo = %repo, timer = name, "interval of 0 ms, timer not started");
            return;
        }
        info!(repo = %repo, timer = name, period_ms = period.as_millis() as u64, "interval timer started");

        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                tokio::spawn(tick());
            }
        });
        self.handles.push(handle);
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn cancel(&mut self) {
        for handle in self.handles.drain(..) {
            handle.abort();
        }
    }
}

impl Drop for IntervalTimers {
    fn drop(&mut self) {
        self.cancel();
    }
}
