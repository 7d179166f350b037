// Consistent exit codes for the gitdoc CLI.
//
//   0  = success
//   1  = general error
//   2  = usage/argument error
//   10 = path is not inside a git working tree
//   11 = commit failed
//   12 = push or pull failed

use std::process;

use gitdoc_daemon::git::{CommitError, SyncError};

/// Named exit codes for the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    Error = 1,
    Usage = 2,
    NotRepository = 10,
    Commit = 11,
    Sync = 12,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Map an anyhow error to an exit code by inspecting the error chain.
    pub fn from_error(err: &anyhow::Error) -> Self {
        for cause in err.chain() {
            if let Some(commit) = cause.downcast_ref::<CommitError>() {
                return match commit {
                    CommitError::Sync { .. } => Self::Sync,
                    CommitError::Status { .. } | CommitError::Commit { .. } => Self::Commit,
                };
            }
            if cause.downcast_ref::<SyncError>().is_some() {
                return Self::Sync;
            }
        }

        let msg = format!("{err:#}");
        if msg.contains("not inside a git working tree") {
            return Self::NotRepository;
        }
        if msg.contains("must not be empty") {
            return Self::Usage;
        }

        Self::Error
    }
}

impl From<ExitCode> for process::ExitCode {
    fn from(code: ExitCode) -> Self {
        process::ExitCode::from(code.code() as u8)
    }
}
