// Git automation: change gate, commit messages, commit and sync coordinators,
// debounce and interval triggers, and the `git` CLI backend.

pub mod commit;
pub mod gate;
pub mod message;
pub mod repository;
pub mod sync;
#[cfg(test)]
pub(crate) mod testing;
pub mod triggers;
pub mod worker;

pub use commit::{CommitCoordinator, CommitError, CommitOutcome, SkipReason};
pub use gate::GateDecision;
pub use repository::{GitRepository, Repository};
pub use sync::{AlwaysConfirm, Decline, ForcePushPrompt, PullOutcome, PushOutcome, SyncCoordinator, SyncError};
pub use triggers::{CommitScheduler, IntervalTimers};
