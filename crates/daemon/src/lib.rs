// gitdoc-daemon library: automatic commit and sync engine for git working trees.

pub mod ai;
pub mod config;
pub mod diagnostics;
pub mod git;
pub mod runtime;
pub mod security;
pub mod watcher;
