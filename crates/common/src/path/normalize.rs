// Path canonicalization for display and for diagnostic lookups.
//
// `normalize_path` produces the repository-relative form shown in commit
// prompts. `uri_key` produces a comparison key so that a changed path and a
// diagnostic's URI compare equal when they name the same file.

use std::path::Path;

use percent_encoding::percent_decode_str;
use thiserror::Error;
use unicode_normalization::UnicodeNormalization;
use url::Url;

/// Maximum allowed path length in characters.
const MAX_PATH_CHARS: usize = 4096;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("path is empty")]
    Empty,

    #[error("path exceeds maximum length of {MAX_PATH_CHARS} characters")]
    TooLong,

    #[error("path contains directory traversal component: {0}")]
    Traversal(String),

    #[error("path contains null byte")]
    NullByte,
}

/// Normalize a repository-relative path.
///
/// Rules:
/// - Apply Unicode NFKC normalization
/// - Convert all separators to `/`
/// - Collapse consecutive `/` into one
/// - Strip leading and trailing `/`
/// - Reject `.` and `..` path components
/// - Reject null bytes and empty paths
pub fn normalize_path(input: &str) -> Result<String, PathError> {
    if input.is_empty() {
        return Err(PathError::Empty);
    }

    if input.contains('\0') {
        return Err(PathError::NullByte);
    }

    let normalized: String = input.nfkc().collect();
    let unified = normalized.replace('\\', "/");
    let components: Vec<&str> = unified.split('/').filter(|s| !s.is_empty()).collect();

    if components.is_empty() {
        return Err(PathError::Empty);
    }

    for component in &components {
        if *component == "." || *component == ".." {
            return Err(PathError::Traversal((*component).to_string()));
        }
    }

    let result = components.join("/");

    if result.chars().count() > MAX_PATH_CHARS {
        return Err(PathError::TooLong);
    }

    Ok(result)
}

/// Comparison key for a file path or `file:` URI.
///
/// Both sides of a diagnostics lookup go through this function, so the key
/// only has to be stable, not pretty:
/// - `file:` URIs are percent-decoded and lose their query and fragment
/// - NFKC normalization, `/` separators, no repeated or trailing `/`
/// - a leading `/` before a drive letter is dropped (`/c:/x` == `c:/x`)
/// - the result is lowercased
pub fn uri_key(input: &str) -> String {
    let raw = match file_uri_path(input) {
        Some(path) => path,
        None => input.to_string(),
    };

    let normalized: String = raw.nfkc().collect();
    let unified = normalized.replace('\\', "/");

    let mut key = String::with_capacity(unified.len());
    for ch in unified.chars() {
        if ch == '/' && key.ends_with('/') {
            continue;
        }
        key.push(ch);
    }
    while key.len() > 1 && key.ends_with('/') {
        key.pop();
    }

    if has_drive_prefix(key.strip_prefix('/').unwrap_or_default()) {
        key.remove(0);
    }

    key.to_lowercase()
}

/// Key for a filesystem path, see [`uri_key`].
pub fn path_key(path: &Path) -> String {
    uri_key(&path.to_string_lossy())
}

fn file_uri_path(input: &str) -> Option<String> {
    if !input.get(..5)?.eq_ignore_ascii_case("file:") {
        return None;
    }

    let url = Url::parse(input).ok()?;
    let decoded = percent_decode_str(url.path()).decode_utf8_lossy().into_owned();
    Some(match url.host_str() {
        Some(host) if !host.is_empty() => format!("/{host}{decoded}"),
        _ => decoded,
    })
}

fn has_drive_prefix(path: &str) -> bool {
    let mut chars = path.chars();
    matches!(
        (chars.next(), chars.next()),
        (Some(letter), Some(':')) if letter.is_ascii_alphabetic()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_simple_path() {
        assert_eq!(normalize_path("docs/readme.md").unwrap(), "docs/readme.md");
    }

    #[test]
    fn test_backslash_to_forward() {
        assert_eq!(normalize_path("src\\lib\\main.rs").unwrap(), "src/lib/main.rs");
    }

    #[test]
    fn test_strip_leading_trailing_slash() {
        assert_eq!(normalize_path("/docs/file.md/").unwrap(), "docs/file.md");
    }

    #[test]
    fn test_unicode_nfkc() {
        assert_eq!(normalize_path("docs/\u{FB01}le.md").unwrap(), "docs/file.md");
    }

    #[test]
    fn test_reject_dotdot() {
        assert_eq!(normalize_path("docs/../etc/passwd"), Err(PathError::Traversal("..".into())));
    }

    #[test]
    fn test_reject_empty_and_null() {
        assert_eq!(normalize_path(""), Err(PathError::Empty));
        assert_eq!(normalize_path("///"), Err(PathError::Empty));
        assert_eq!(normalize_path("a\0b"), Err(PathError::NullByte));
    }

    #[test]
    fn uri_key_matches_plain_path() {
        assert_eq!(uri_key("file:///home/dev/app/src/a.ts"), uri_key("/home/dev/app/src/a.ts"));
    }

    #[test]
    fn uri_key_ignores_query_and_fragment() {
        assert_eq!(
            uri_key("file:///home/dev/a.ts?version=3#L10"),
            uri_key("/home/dev/a.ts")
        );
    }

    #[test]
    fn uri_key_decodes_percent_escapes() {
        assert_eq!(uri_key("file:///home/dev/my%20notes.md"), uri_key("/home/dev/my notes.md"));
        assert_eq!(uri_key("file:///home/dev/notes%20"), uri_key("/home/dev/notes "));
        assert_eq!(uri_key("file:///home/dev/caf%C3%A9.md"), uri_key("/home/dev/café.md"));
        assert_eq!(uri_key("file:///home/dev/100%25.md"), uri_key("/home/dev/100%.md"));
    }

    #[test]
    fn uri_key_is_case_insensitive() {
        assert_eq!(uri_key("/Home/Dev/A.ts"), uri_key("/home/dev/a.ts"));
    }

    #[test]
    fn uri_key_unifies_windows_drive_forms() {
        assert_eq!(uri_key("file:///C%3A/work/a.ts"), uri_key("C:\\work\\a.ts"));
        assert_eq!(uri_key("file:///c:/work/a.ts"), uri_key("c:/work/a.ts"));
    }

    #[test]
    fn uri_key_collapses_separators() {
        assert_eq!(uri_key("/home//dev///a.ts/"), "/home/dev/a.ts");
    }

    #[test]
    fn uri_key_keeps_distinct_files_distinct() {
        assert_ne!(uri_key("/home/dev/a.ts"), uri_key("/home/dev/a.tsx"));
        assert_ne!(uri_key("/home/dev/a.ts"), uri_key("/home/dev/src/a.ts"));
    }

    #[test]
    fn path_key_agrees_with_uri_key() {
        assert_eq!(path_key(Path::new("/srv/repo/README.md")), uri_key("file:///srv/repo/README.md"));
    }

    proptest! {
        #[test]
        fn file_uri_and_path_share_a_key(
            segments in proptest::collection::vec("[A-Za-z0-9_ .-]{1,12}", 1..5),
        ) {
            prop_assume!(segments.iter().all(|s| s != "." && s != ".."));
            let path = format!("/{}", segments.join("/"));
            let url = Url::from_file_path(&path).expect("absolute path converts to file url");
            prop_assert_eq!(uri_key(url.as_str()), uri_key(&path));

            let with_suffix = format!("{}?query=1#frag", url.as_str());
            prop_assert_eq!(uri_key(&with_suffix), uri_key(&path));
        }
    }
}
