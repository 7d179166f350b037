// `gitdoc pull`: pull from the tracked remote.

use clap::Args;
use serde::Serialize;

use gitdoc_daemon::git::PullOutcome;
use gitdoc_daemon::runtime::open_repository;

use super::RepoArgs;
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct PullArgs {
    #[command(flatten)]
    pub repo: RepoArgs,
}

#[derive(Debug, Clone, Serialize)]
pub struct PullReport {
    pub pulled: bool,
}

pub async fn run(args: PullArgs, format: OutputFormat) -> anyhow::Result<()> {
    let (coordinator, _publisher) = open_repository(&args.repo.repo, &args.repo.capabilities())?;
    let outcome = coordinator.sync().pull().await?;
    let report = PullReport { pulled: outcome == PullOutcome::Pulled };
    output::print_output(format, &report, |report| {
        if report.pulled {
            "Pulled".to_string()
        } else {
            "No remote configured; nothing pulled".to_string()
        }
    })?;
    Ok(())
}
