// Configuration files for gitdoc.
//
// Workspace config: `<repo>/.gitdoc/config.toml`
// Global config: `~/.gitdoc/config.toml`
//
// The workspace file wins when present; otherwise the global file, otherwise
// defaults. Engine components never hold a config value across operations:
// they take a fresh snapshot from a `ConfigHandle` when each operation starts.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Root directory for gitdoc global state: `~/.gitdoc/`.
pub fn global_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".gitdoc"))
}

/// Path to the global config file: `~/.gitdoc/config.toml`.
pub fn global_config_path() -> Option<PathBuf> {
    global_dir().map(|d| d.join("config.toml"))
}

/// Path to the workspace config file: `<root>/.gitdoc/config.toml`.
pub fn workspace_config_path(workspace_root: &Path) -> PathBuf {
    workspace_root.join(".gitdoc").join("config.toml")
}

// ── Options ────────────────────────────────────────────────────────

/// Which diagnostics block an automatic commit.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CommitValidationLevel {
    None,
    Error,
    Warning,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AutoPush {
    Off,
    OnCommit,
    AfterDelay,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AutoPull {
    Off,
    OnCommit,
    OnPush,
    AfterDelay,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PushMode {
    Push,
    ForcePush,
    ForcePushWithLease,
}

/// Recognized options, one snapshot per operation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GitDocConfig {
    /// Glob matched against absolute changed paths. Dotfiles are included.
    pub file_pattern: String,
    pub commit_validation_level: CommitValidationLevel,
    /// Debounce window for automatic commits, in milliseconds.
    pub auto_commit_delay: u64,
    /// `strftime` template for the timestamp commit message.
    pub commit_message_format: String,
    /// IANA zone used to render the commit message time (e.g. `Europe/Paris`).
    pub time_zone: Option<String>,
    pub ai_enabled: bool,
    /// Model family requested from the generator.
    pub ai_model: String,
    pub ai_use_emojis: bool,
    pub ai_custom_instructions: String,
    pub no_verify: bool,
    pub auto_push: AutoPush,
    pub auto_pull: AutoPull,
    /// Interval for `auto_push = "after_delay"`, in milliseconds.
    pub auto_push_delay: u64,
    /// Interval for `auto_pull = "after_delay"`, in milliseconds.
    pub auto_pull_delay: u64,
    pub push_mode: PushMode,
    pub pull_on_open: bool,
    /// Remote used for push and pull.
    pub remote: String,
}

impl Default for GitDocConfig {
    fn default() -> Self {
        Self {
            file_pattern: "**/*".into(),
            commit_validation_level: CommitValidationLevel::Error,
            auto_commit_delay: 30_000,
            commit_message_format: "%Y-%m-%d %H:%M:%S".into(),
            time_zone: None,
            ai_enabled: false,
            ai_model: "claude-haiku-4-5".into(),
            ai_use_emojis: false,
            ai_custom_instructions: String::new(),
            no_verify: false,
            auto_push: AutoPush::OnCommit,
            auto_pull: AutoPull::OnPush,
            auto_push_delay: 30_000,
            auto_pull_delay: 30_000,
            push_mode: PushMode::ForcePushWithLease,
            pull_on_open: true,
            remote: "origin".into(),
        }
    }
}

impl GitDocConfig {
    /// Resolve the effective config for a working tree: workspace file,
    /// then global file, then defaults. Unreadable files are skipped.
    pub fn load(workspace_root: &Path) -> Self {
        let workspace = workspace_config_path(workspace_root);
        if let Ok(config) = Self::load_from(&workspace) {
            return config;
        }
        global_config_path().and_then(|p| Self::load_from(&p).ok()).unwrap_or_default()
    }

    /// Load from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        toml::from_str(&contents).map_err(ConfigError::Parse)
    }

    /// Save to `<root>/.gitdoc/config.toml`.
    pub fn save(&self, workspace_root: &Path) -> Result<(), ConfigError> {
        self.save_to(&workspace_config_path(workspace_root))
    }

    /// Save to a specific path (creates parent directories).
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(ConfigError::Io)?;
        }
        let contents = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        std::fs::write(path, contents).map_err(ConfigError::Io)
    }

    pub fn auto_commit_delay(&self) -> Duration {
        Duration::from_millis(self.auto_commit_delay)
    }

    pub fn auto_push_delay(&self) -> Duration {
        Duration::from_millis(self.auto_push_delay)
    }

    pub fn auto_pull_delay(&self) -> Duration {
        Duration::from_millis(self.auto_pull_delay)
    }
}

// ── Snapshot handle ────────────────────────────────────────────────

/// Read side of the live configuration.
#[derive(Debug, Clone)]
pub struct ConfigHandle {
    rx: watch::Receiver<Arc<GitDocConfig>>,
}

/// Write side, held by whoever reloads configuration.
#[derive(Debug)]
pub struct ConfigPublisher {
    tx: watch::Sender<Arc<GitDocConfig>>,
}

impl ConfigHandle {
    pub fn channel(initial: GitDocConfig) -> (ConfigPublisher, ConfigHandle) {
        let (tx, rx) = watch::channel(Arc::new(initial));
        (ConfigPublisher { tx }, ConfigHandle { rx })
    }

    /// A handle that never changes.
    pub fn fixed(config: GitDocConfig) -> Self {
        let (_publisher, handle) = Self::channel(config);
        handle
    }

    /// The current configuration. Cheap; callers take one per operation.
    pub fn snapshot(&self) -> Arc<GitDocConfig> {
        self.rx.borrow().clone()
    }
}

impl ConfigPublisher {
    pub fn publish(&self, config: GitDocConfig) {
        self.tx.send_replace(Arc::new(config));
    }
}

// ── Errors ─────────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Serialize(toml::ser::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "config I/O error: {e}"),
            Self::Parse(e) => write!(f, "config parse error: {e}"),
            Self::Serialize(e) => write!(f, "config serialize error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}
