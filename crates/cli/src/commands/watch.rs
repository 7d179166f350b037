// `gitdoc watch`: run a watch session until Ctrl-C.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use tracing::info;

use gitdoc_daemon::runtime::WatchSession;

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Working trees to watch.
    #[arg(default_value = ".")]
    pub repos: Vec<PathBuf>,

    /// JSON diagnostics file consulted by the change gate, re-read before
    /// every commit.
    #[arg(long)]
    pub diagnostics: Option<PathBuf>,

    /// Accept force-push confirmation without asking.
    #[arg(long, short = 'y')]
    pub yes: bool,
}

pub async fn run(args: WatchArgs) -> anyhow::Result<()> {
    let capabilities = super::capabilities(&args.repos, args.diagnostics.as_deref(), args.yes);
    let session = WatchSession::start(&args.repos, capabilities).await?;
    info!(repositories = session.coordinators().len(), "watching, press Ctrl-C to stop");

    let signal = tokio::signal::ctrl_c().await.context("failed to listen for Ctrl-C");
    session.shutdown().await;
    signal
}
