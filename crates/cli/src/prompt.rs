// Force-push confirmation on the controlling terminal.

use std::future::Future;
use std::io::{self, BufRead, IsTerminal, Write};
use std::pin::Pin;

use gitdoc_common::types::RepoId;
use gitdoc_daemon::git::ForcePushPrompt;
use tracing::warn;

/// Asks on stdin when it is a terminal; otherwise declines unless
/// `assume_yes` is set.
#[derive(Debug, Clone, Copy)]
pub struct TerminalPrompt {
    assume_yes: bool,
}

impl TerminalPrompt {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }
}

impl ForcePushPrompt for TerminalPrompt {
    fn confirm_force_push(&self, repository: &RepoId) -> Pin<Box<dyn Future<Output = bool> + Send + '_>> {
        let question = format!("Push to {repository} was rejected. Force push? [y/N] ");
        let repo = repository.to_string();
        Box::pin(async move {
            if self.assume_yes {
                return true;
            }
            if !io::stdin().is_terminal() {
                warn!(%repo, "push rejected and stdin is not a terminal; not force pushing");
                return false;
            }
            tokio::task::spawn_blocking(move || ask(&question)).await.unwrap_or(false)
        })
    }
}

fn ask(question: &str) -> bool {
    let mut err = io::stderr().lock();
    if write!(err, "{question}").and_then(|_| err.flush()).is_err() {
        return false;
    }
    let mut answer = String::new();
    match io::stdin().lock().read_line(&mut answer) {
        Ok(_) => is_affirmative(&answer),
        Err(_) => false,
    }
}

pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
