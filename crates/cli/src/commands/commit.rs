// `gitdoc commit`: commit the current changes through the coordinator.

use clap::Args;
use serde::Serialize;

use gitdoc_daemon::git::CommitOutcome;
use gitdoc_daemon::runtime::open_repository;

use super::RepoArgs;
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct CommitArgs {
    #[command(flatten)]
    pub repo: RepoArgs,

    /// Commit message. Generated or rendered from the template when omitted.
    #[arg(long, short = 'm')]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitReport {
    pub committed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub paths: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<&'static str>,
}

impl From<CommitOutcome> for CommitReport {
    fn from(outcome: CommitOutcome) -> Self {
        match outcome {
            CommitOutcome::Committed { message, paths } => Self {
                committed: true,
                message: Some(message),
                paths: paths.iter().map(|path| path.display().to_string()).collect(),
                skipped: None,
            },
            CommitOutcome::Skipped(reason) => {
                Self { committed: false, message: None, paths: Vec::new(), skipped: Some(reason.as_str()) }
            }
        }
    }
}

pub async fn run(args: CommitArgs, format: OutputFormat) -> anyhow::Result<()> {
    let message = resolve_commit_message(args.message)?;
    let (coordinator, _publisher) = open_repository(&args.repo.repo, &args.repo.capabilities())?;
    let outcome = coordinator.commit(message.as_deref()).await?;
    output::print_output(format, &CommitReport::from(outcome), format_human)?;
    Ok(())
}

fn resolve_commit_message(message: Option<String>) -> anyhow::Result<Option<String>> {
    match message {
        Some(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                anyhow::bail!("--message must not be empty");
            }
            Ok(Some(trimmed.to_string()))
        }
        None => Ok(None),
    }
}

fn format_human(report: &CommitReport) -> String {
    match (&report.message, report.skipped) {
        (Some(message), _) => {
            let noun = if report.paths.len() == 1 { "file" } else { "files" };
            format!("Committed {} {noun}: {message}", report.paths.len())
        }
        (None, Some("no_changes")) => "Nothing to commit".to_string(),
        (None, Some("no_matching_paths")) => "No changed files match file_pattern".to_string(),
        (None, Some("blocked_by_diagnostics")) => {
            "Skipped: changed files have blocking diagnostics".to_string()
        }
        (None, _) => "Nothing committed".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitdoc_daemon::git::SkipReason;
    use std::path::PathBuf;

    #[test]
    fn committed_report_lists_paths() {
        let report = CommitReport::from(CommitOutcome::Committed {
            message: "Update notes".into(),
            paths: vec![PathBuf::from("/work/notes.md"), PathBuf::from("/work/todo.md")],
        });
        assert!(report.committed);
        assert_eq!(format_human(&report), "Committed 2 files: Update notes");

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["paths"][0], "/work/notes.md");
        assert!(json.get("skipped").is_none());
    }

    #[test]
    fn skipped_report_carries_reason() {
        let report = CommitReport::from(CommitOutcome::Skipped(SkipReason::BlockedByDiagnostics {
            blocked: vec![PathBuf::from("/work/main.rs")],
        }));
        assert!(!report.committed);
        assert_eq!(report.skipped, Some("blocked_by_diagnostics"));
        assert_eq!(format_human(&report), "Skipped: changed files have blocking diagnostics");

        let clean = CommitReport::from(CommitOutcome::Skipped(SkipReason::NoChanges));
        assert_eq!(format_human(&clean), "Nothing to commit");
    }

    #[test]
    fn message_is_trimmed_and_must_not_be_empty() {
        assert_eq!(resolve_commit_message(Some("  wip  ".into())).unwrap().as_deref(), Some("wip"));
        assert_eq!(resolve_commit_message(None).unwrap(), None);
        assert!(resolve_commit_message(Some("   ".into())).is_err());
    }
}
