// Path and URI normalization helpers.

pub mod normalize;

pub use normalize::{normalize_path, path_key, uri_key, PathError};
