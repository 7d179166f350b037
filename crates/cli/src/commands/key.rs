// `gitdoc key`: store or remove the generator API key in the OS keychain.

use std::io::{self, BufRead, IsTerminal};

use anyhow::Context;
use clap::{Args, Subcommand};
use serde::Serialize;

use gitdoc_daemon::security::{self, SecretSlot, API_KEY_ENV};

use crate::output::{self, OutputFormat};

#[derive(Debug, Args)]
pub struct KeyArgs {
    #[command(subcommand)]
    pub action: KeyAction,
}

#[derive(Debug, Subcommand)]
pub enum KeyAction {
    /// Store the API key. Reads one line from stdin when no value is given.
    Set {
        #[arg(long)]
        value: Option<String>,
    },
    /// Remove the stored API key
    Clear,
    /// Show whether an API key is available
    Show,
}

#[derive(Debug, Clone, Serialize)]
pub struct KeyReport {
    pub configured: bool,
    pub source: Option<&'static str>,
}

pub fn run(args: KeyArgs, format: OutputFormat) -> anyhow::Result<()> {
    match args.action {
        KeyAction::Set { value } => {
            let value = match value {
                Some(value) => value,
                None => read_key_from_stdin()?,
            };
            let value = normalize_key(&value)?;
            security::set_secret(SecretSlot::ApiKey, &value)?;
            output::print_output(format, &KeyReport { configured: true, source: Some("keychain") }, |_| {
                "API key stored in the keychain".to_string()
            })?;
        }
        KeyAction::Clear => {
            security::delete_secret(SecretSlot::ApiKey)?;
            output::print_output(format, &KeyReport { configured: false, source: None }, |_| {
                "API key removed from the keychain".to_string()
            })?;
        }
        KeyAction::Show => {
            let from_env = std::env::var(API_KEY_ENV).is_ok_and(|value| !value.trim().is_empty());
            let report = if from_env {
                KeyReport { configured: true, source: Some("environment") }
            } else {
                let stored = security::get_secret(SecretSlot::ApiKey)?;
                KeyReport { configured: stored.is_some(), source: stored.map(|_| "keychain") }
            };
            output::print_output(format, &report, |report| match report.source {
                Some(source) => format!("API key available from the {source}"),
                None => format!("No API key. Run: gitdoc key set, or export {API_KEY_ENV}"),
            })?;
        }
    }
    Ok(())
}

fn read_key_from_stdin() -> anyhow::Result<String> {
    if io::stdin().is_terminal() {
        eprintln!("Paste the API key and press Enter:");
    }
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line).context("failed to read API key from stdin")?;
    Ok(line)
}

fn normalize_key(raw: &str) -> anyhow::Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        anyhow::bail!("API key must not be empty");
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_is_trimmed() {
        assert_eq!(normalize_key("  sk-ant-123\n").unwrap(), "sk-ant-123");
        assert!(normalize_key(" \n").is_err());
    }
}
