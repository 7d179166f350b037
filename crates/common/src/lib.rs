// gitdoc-common: shared types and utilities for the gitdoc workspace

pub mod path;
pub mod types;
