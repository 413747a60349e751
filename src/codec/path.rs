//! S3 key ↔ store path translation.
//!
//! All functions are pure. The only failures are validation failures.

use std::fmt;

/// Longest single path segment the store accepts.
pub const MAX_SEGMENT_LENGTH: usize = 255;

/// Why a key cannot be translated to a store path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    /// The key contains a NUL, an empty or dot segment, or an oversized
    /// segment.
    Invalid(String),
    /// The full store path would exceed the configured maximum.
    TooLong(String),
}

impl fmt::Display for KeyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyError::Invalid(key) => write!(f, "invalid object key: {key}"),
            KeyError::TooLong(key) => write!(f, "object key too long: {key}"),
        }
    }
}

impl std::error::Error for KeyError {}

/// Validate `key` and return it in store-path form (no leading slash).
///
/// `max_len` bounds the sanitized key, sized by the caller so the full
/// joined store path stays within the store's path limit.
pub fn sanitize(key: &str, max_len: usize) -> Result<String, KeyError> {
    let key = key.trim_start_matches('/');
    if key.is_empty() || key.contains('\0') {
        return Err(KeyError::Invalid(key.to_string()));
    }
    for segment in key.split('/') {
        if segment.is_empty() || segment == "." || segment == ".." {
            return Err(KeyError::Invalid(key.to_string()));
        }
        if segment.len() > MAX_SEGMENT_LENGTH {
            return Err(KeyError::Invalid(key.to_string()));
        }
    }
    if key.len() > max_len {
        return Err(KeyError::TooLong(key.to_string()));
    }
    Ok(key.to_string())
}

/// Join a sanitized key under `root`/`bucket` with single separators.
pub fn join_object(root: &str, bucket: &str, key: &str) -> String {
    format!("{}/{}/{}", root.trim_end_matches('/'), bucket, key)
}

/// Split a listing prefix into the deepest ancestor directory and the tail
/// to filter on: `"a/b/c*"` listings start in `a/b` and filter on `c`.
///
/// Law: rejoining `subdir` (plus `/` when non-empty) and `search_prefix`
/// reproduces the input.
pub fn split_prefix(prefix: &str) -> (&str, &str) {
    if prefix.is_empty() {
        return ("", "");
    }
    match prefix.rfind('/') {
        None => ("", prefix),
        Some(p) => (&prefix[..p], &prefix[p + 1..]),
    }
}

/// Rebuild the bucket-relative key of a listing entry from the directory
/// that contained it. The bucket segment is located from the right so keys
/// that repeat the bucket name deeper in the tree stay intact.
pub fn relativize(bucket: &str, parent_path: &str, name: &str) -> String {
    let needle = format!("/{bucket}");
    let mut below: Option<&str> = None;
    for (idx, _) in parent_path.match_indices(&needle) {
        let end = idx + needle.len();
        if end == parent_path.len() || parent_path.as_bytes()[end] == b'/' {
            below = Some(parent_path[end..].trim_start_matches('/'));
        }
    }
    match below {
        None | Some("") => name.to_string(),
        Some(rest) => format!("{rest}/{name}"),
    }
}
