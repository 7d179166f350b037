// Commit message resolution.
//
// Explicit message > generated summary > timestamp template. Generation is
// best effort: any failure falls back to the template for the same instant.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::{DateTime, Local, Utc};
use chrono_tz::Tz;
use gitdoc_common::path::normalize_path;
use regex::Regex;
use tracing::{debug, warn};

use super::repository::Repository;
use crate::ai::{collect_text, ChatMessage, TextGenerator};
use crate::config::GitDocConfig;

const DEFAULT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render `commit_message_format` for `now`. The configured zone only changes
/// the displayed time; an unknown zone falls back to local time.
pub fn template_message(config: &GitDocConfig, now: DateTime<Utc>) -> String {
    let format = config.commit_message_format.as_str();
    match config.time_zone.as_deref().map(str::trim).filter(|tz| !tz.is_empty()) {
        Some(name) => match name.parse::<Tz>() {
            Ok(zone) => render(&now.with_timezone(&zone), format),
            Err(_) => {
                warn!(time_zone = name, "unknown time_zone, using local time");
                render(&now.with_timezone(&Local), format)
            }
        },
        None => render(&now.with_timezone(&Local), format),
    }
}

fn render<Z>(time: &DateTime<Z>, format: &str) -> String
where
    Z: chrono::TimeZone,
    Z::Offset: std::fmt::Display,
{
    let mut rendered = String::new();
    if write!(rendered, "{}", time.format(format)).is_ok() {
        return rendered;
    }
    warn!(format, "invalid commit_message_format, using default");
    time.format(DEFAULT_FORMAT).to_string()
}

/// Prompt asking for a one-sentence summary of `diffs`, given as
/// `(repository-relative path, diff)` pairs.
pub fn build_prompt(diffs: &[(String, String)], config: &GitDocConfig) -> String {
    let mut prompt = String::from(
        "# Base Instructions\n\n\
         * Summarize the following source code diffs into a single concise sentence that describes the essence of the changes that were made, and can be used as a commit message.\n\
         * Always start the commit message with a present tense verb such as \"Update\", \"Fix\", \"Modify\", \"Add\", \"Improve\", \"Organize\", \"Arrange\", etc.\n\
         * Respond in plain text, with no markdown formatting, and without any extra content. Simply respond with the commit message, and without a trailing period.\n\
         * Don't reference the file paths that were changed, but make sure summarize all significant changes.\n",
    );
    if config.ai_use_emojis {
        prompt.push_str(
            "* Prepend an emoji to the message that best expresses the nature of the changes, and is as specific to the subject and action of the changes as possible.\n",
        );
    }

    prompt.push_str("\n# Code change diffs\n\n");
    let sections: Vec<String> =
        diffs.iter().map(|(path, diff)| format!("## {path}\n---\n{diff}")).collect();
    prompt.push_str(&sections.join("\n\n"));
    prompt.push_str("\n\n");

    let custom = config.ai_custom_instructions.trim();
    if !custom.is_empty() {
        prompt.push_str("# User-Provided Instructions (Important!)\n\n");
        prompt.push_str(custom);
        prompt.push_str("\n\n");
    }

    prompt.push_str("# Commit message\n\n");
    prompt
}

fn wrapping_quotes() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"^(?:"([^"]*)"|'([^']*)'|`+([^`]*)`+)$"#).expect("quote pattern should compile")
    })
}

/// Reduce a model response to a single commit subject line.
pub fn normalize_generated(text: &str) -> String {
    let Some(line) = text.lines().map(str::trim).find(|line| !line.is_empty()) else {
        return String::new();
    };
    let unquoted = match wrapping_quotes().captures(line) {
        Some(captures) => captures.iter().skip(1).flatten().next().map_or(line, |m| m.as_str()).trim(),
        None => line,
    };
    unquoted.trim_end_matches('.').trim_end().to_string()
}

fn relative_path(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let raw = relative.to_string_lossy();
    normalize_path(&raw).unwrap_or_else(|_| raw.replace('\\', "/"))
}

async fn generate<R: Repository>(
    repository: &R,
    paths: &[PathBuf],
    config: &GitDocConfig,
    generator: &dyn TextGenerator,
) -> Option<String> {
    let root = repository.id().root();
    let mut diffs = Vec::with_capacity(paths.len());
    for path in paths {
        let diff = match repository.diff_with_head(path).await {
            Ok(diff) => diff,
            Err(error) => {
                debug!(path = %path.display(), %error, "diff unavailable, sending empty diff");
                String::new()
            }
        };
        diffs.push((relative_path(root, path), diff));
    }

    let Some(model) = generator.select_model(&config.ai_model).await else {
        debug!(family = %config.ai_model, "no language model available");
        return None;
    };

    let prompt = build_prompt(&diffs, config);
    let text = match model.send_request(vec![ChatMessage::user(prompt)]).await {
        Ok(stream) => collect_text(stream).await,
        Err(error) => Err(error),
    };

    match text {
        Ok(text) => {
            let message = normalize_generated(&text);
            if message.is_empty() {
                debug!(model = model.id(), "model returned an empty summary");
                None
            } else {
                Some(message)
            }
        }
        Err(error) => {
            warn!(repo = %repository.id(), model = model.id(), %error, "commit message generation failed");
            None
        }
    }
}

/// Pick the message for a commit of `paths` made at `now`.
pub async fn resolve<R: Repository>(
    repository: &R,
    paths: &[PathBuf],
    explicit: Option<&str>,
    now: DateTime<Utc>,
    config: &GitDocConfig,
    generator: Option<&dyn TextGenerator>,
) -> String {
    if let Some(message) = explicit.filter(|message| !message.is_empty()) {
        return message.to_string();
    }

    if config.ai_enabled {
        if let Some(generator) = generator {
            if let Some(message) = generate(repository, paths, config, generator).await {
                return message;
            }
        }
    }

    template_message(config, now)
}
