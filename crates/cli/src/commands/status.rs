// `gitdoc status`: show what an automatic commit would include.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Args;
use serde::Serialize;

use gitdoc_daemon::git::{gate, GateDecision, Repository};
use gitdoc_daemon::runtime::open_repository;

use super::RepoArgs;
use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct StatusArgs {
    #[command(flatten)]
    pub repo: RepoArgs,

    /// Also report whether this file is covered by file_pattern.
    #[arg(long)]
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub repo: String,
    pub branch: Option<String>,
    pub file_pattern: String,
    pub decision: &'static str,
    pub paths: Vec<String>,
    pub blocked: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<FileCoverage>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FileCoverage {
    pub path: String,
    pub covered: bool,
}

pub async fn run(args: StatusArgs, format: OutputFormat) -> anyhow::Result<()> {
    let capabilities = args.repo.capabilities();
    let (coordinator, _publisher) = open_repository(&args.repo.repo, &capabilities)?;
    let repository = coordinator.repository();
    let config = coordinator.config().snapshot();

    let decision = gate::evaluate(&**repository, &config, &*capabilities.diagnostics)
        .await
        .context("failed to evaluate working tree changes")?;
    let branch = repository.head_branch().await.context("failed to read HEAD")?;

    let file = match args.file {
        Some(path) => {
            let absolute = absolute_path(&path)?;
            Some(FileCoverage {
                covered: gate::matches(&config, &absolute),
                path: absolute.display().to_string(),
            })
        }
        None => None,
    };

    let report = StatusReport {
        repo: repository.id().to_string(),
        branch,
        file_pattern: config.file_pattern.clone(),
        decision: decision.reason(),
        paths: display_paths(decision.changed_paths()),
        blocked: match &decision {
            GateDecision::BlockedByDiagnostics { blocked, .. } => display_paths(blocked),
            _ => Vec::new(),
        },
        file,
    };
    output::print_output(format, &report, format_human)?;
    Ok(())
}

fn absolute_path(path: &Path) -> anyhow::Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = std::env::current_dir().context("failed to read current directory")?;
    Ok(cwd.join(path))
}

fn display_paths(paths: &[PathBuf]) -> Vec<String> {
    paths.iter().map(|path| path.display().to_string()).collect()
}

fn format_human(report: &StatusReport) -> String {
    let mut lines = vec![format!(
        "{} ({})",
        report.repo,
        report.branch.as_deref().unwrap_or("detached HEAD")
    )];
    lines.push(match report.decision {
        "no_changes" => "No changes".to_string(),
        "no_matching_paths" => format!("No changed files match {}", report.file_pattern),
        "blocked_by_diagnostics" => "Blocked by diagnostics:".to_string(),
        _ => format!("{} file(s) would be committed:", report.paths.len()),
    });

    let listed = if report.blocked.is_empty() { &report.paths } else { &report.blocked };
    lines.extend(listed.iter().map(|path| format!("  {path}")));

    if let Some(file) = &report.file {
        let verdict = if file.covered { "covered" } else { "not covered" };
        lines.push(format!("{} is {verdict} by {}", file.path, report.file_pattern));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(decision: &'static str) -> StatusReport {
        StatusReport {
            repo: "/work".into(),
            branch: Some("main".into()),
            file_pattern: "**/*".into(),
            decision,
            paths: vec!["/work/notes.md".into(), "/work/main.rs".into()],
            blocked: Vec::new(),
            file: None,
        }
    }

    #[test]
    fn eligible_lists_paths() {
        assert_eq!(
            format_human(&report("eligible")),
            "/work (main)\n2 file(s) would be committed:\n  /work/notes.md\n  /work/main.rs"
        );
    }

    #[test]
    fn blocked_lists_only_blocked_paths() {
        let mut blocked = report("blocked_by_diagnostics");
        blocked.blocked = vec!["/work/main.rs".into()];
        blocked.branch = None;
        assert_eq!(format_human(&blocked), "/work (detached HEAD)\nBlocked by diagnostics:\n  /work/main.rs");
    }

    #[test]
    fn file_coverage_is_reported() {
        let mut with_file = report("no_changes");
        with_file.paths.clear();
        with_file.file = Some(FileCoverage { path: "/work/a.md".into(), covered: true });
        assert_eq!(format_human(&with_file), "/work (main)\nNo changes\n/work/a.md is covered by **/*");
    }

    #[test]
    fn relative_paths_resolve_against_cwd() {
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(absolute_path(Path::new("a.md")).unwrap(), cwd.join("a.md"));
        assert_eq!(absolute_path(Path::new("/abs/a.md")).unwrap(), PathBuf::from("/abs/a.md"));
    }
}
