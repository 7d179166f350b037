// CLI subcommand dispatch.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Subcommand};
use gitdoc_daemon::ai::anthropic::AnthropicGenerator;
use gitdoc_daemon::ai::TextGenerator;
use gitdoc_daemon::config::GitDocConfig;
use gitdoc_daemon::diagnostics::{DiagnosticsSource, DiagnosticsStore, JsonDiagnosticsFile};
use gitdoc_daemon::git::GitRepository;
use gitdoc_daemon::runtime::SessionCapabilities;

use crate::output::OutputFormat;
use crate::prompt::TerminalPrompt;

pub mod commit;
pub mod key;
pub mod pull;
pub mod push;
pub mod status;
pub mod watch;

#[derive(Subcommand)]
pub enum Command {
    /// Watch working trees and commit changes after a quiet period
    Watch(watch::WatchArgs),
    /// Commit the current changes now
    Commit(commit::CommitArgs),
    /// Push the current branch
    Push(push::PushArgs),
    /// Pull from the tracked remote
    Pull(pull::PullArgs),
    /// Show what an automatic commit would include
    Status(status::StatusArgs),
    /// Manage the API key used for generated commit messages
    Key(key::KeyArgs),
}

pub async fn run(cmd: Command, format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        Command::Watch(args) => watch::run(args).await,
        Command::Commit(args) => commit::run(args, format).await,
        Command::Push(args) => push::run(args, format).await,
        Command::Pull(args) => pull::run(args, format).await,
        Command::Status(args) => status::run(args, format).await,
        Command::Key(args) => key::run(args, format),
    }
}

/// Options shared by the one-shot repository commands.
#[derive(Debug, Args)]
pub struct RepoArgs {
    /// Working tree to operate on.
    #[arg(long, short = 'C', default_value = ".")]
    pub repo: PathBuf,

    /// JSON diagnostics file consulted by the change gate.
    #[arg(long)]
    pub diagnostics: Option<PathBuf>,

    /// Accept force-push confirmation without asking.
    #[arg(long, short = 'y')]
    pub yes: bool,
}

impl RepoArgs {
    pub fn capabilities(&self) -> SessionCapabilities {
        capabilities(std::slice::from_ref(&self.repo), self.diagnostics.as_deref(), self.yes)
    }
}

/// Capabilities for a set of working trees. The generator is only built when
/// one of them enables generated messages, so the keychain is not touched
/// otherwise.
pub fn capabilities(repos: &[PathBuf], diagnostics: Option<&Path>, yes: bool) -> SessionCapabilities {
    let diagnostics: Arc<dyn DiagnosticsSource> = match diagnostics {
        Some(path) => Arc::new(JsonDiagnosticsFile::new(path)),
        None => Arc::new(DiagnosticsStore::new()),
    };
    let generator = wants_generator(repos)
        .then(|| Arc::new(AnthropicGenerator::from_environment()) as Arc<dyn TextGenerator>);

    SessionCapabilities { diagnostics, generator, prompt: Arc::new(TerminalPrompt::new(yes)) }
}

fn wants_generator(repos: &[PathBuf]) -> bool {
    repos.iter().any(|path| {
        GitRepository::open(path)
            .map(|repository| GitDocConfig::load(repository.root()).ai_enabled)
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(subcommand)]
        command: Command,
    }

    #[test]
    fn parses_every_subcommand() {
        for argv in [
            vec!["gitdoc", "watch"],
            vec!["gitdoc", "watch", "notes", "src", "--diagnostics", "diag.json", "--yes"],
            vec!["gitdoc", "commit", "-m", "checkpoint"],
            vec!["gitdoc", "push", "--force", "-C", "notes"],
            vec!["gitdoc", "pull"],
            vec!["gitdoc", "status", "--file", "README.md"],
            vec!["gitdoc", "key", "clear"],
        ] {
            assert!(TestCli::try_parse_from(argv.iter().copied()).is_ok(), "failed to parse {argv:?}");
        }
    }

    #[test]
    fn repo_defaults_to_current_directory() {
        let cli = TestCli::try_parse_from(["gitdoc", "pull"]).unwrap();
        match cli.command {
            Command::Pull(args) => assert_eq!(args.repo.repo, PathBuf::from(".")),
            _ => panic!("expected pull"),
        }
    }

    #[test]
    fn capabilities_skip_generator_without_ai() {
        let dir = tempfile::TempDir::new().unwrap();
        let caps = capabilities(&[dir.path().to_path_buf()], None, false);
        assert!(caps.generator.is_none());
    }
}
