// `gitdoc push`: push the current branch, confirming force when rejected.

use clap::Args;
use serde::Serialize;

use gitdoc_daemon::git::PushOutcome;
use gitdoc_daemon::runtime::open_repository;

use super::RepoArgs;
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct PushArgs {
    #[command(flatten)]
    pub repo: RepoArgs,

    /// Force push without asking first.
    #[arg(long)]
    pub force: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct PushReport {
    pub outcome: &'static str,
}

pub async fn run(args: PushArgs, format: OutputFormat) -> anyhow::Result<()> {
    let (coordinator, _publisher) = open_repository(&args.repo.repo, &args.repo.capabilities())?;
    let outcome = coordinator.sync().push(args.force).await?;

    if outcome == PushOutcome::Declined {
        output::print_warning(format, "PUSH_DECLINED", "push was rejected and force push was declined");
    }
    output::print_output(format, &PushReport { outcome: outcome_label(outcome) }, format_human)?;
    Ok(())
}

fn outcome_label(outcome: PushOutcome) -> &'static str {
    match outcome {
        PushOutcome::NoRemote => "no_remote",
        PushOutcome::Pushed => "pushed",
        PushOutcome::ForcePushed => "force_pushed",
        PushOutcome::Declined => "declined",
    }
}

fn format_human(report: &PushReport) -> String {
    match report.outcome {
        "no_remote" => "No remote configured; nothing pushed".to_string(),
        "pushed" => "Pushed".to_string(),
        "force_pushed" => "Force pushed".to_string(),
        _ => "Not pushed".to_string(),
    }
}
