//! Relative object path helpers.
//!
//! Every path handed to an [`ObjectStore`](crate::ObjectStore) is relative
//! to the store root: `/`-separated, never starting or ending with `/`, with
//! no empty, `.` or `..` segment.

use std::fmt;

use lexvault_core::{Error, Result};

/// Where an object lives: a bucket (remote) or root directory (local),
/// plus the full object path inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StorageLocation {
    /// Bucket name or local root directory.
    pub bucket_or_root: String,
    /// Full path of the object inside the bucket or root.
    pub path: String,
}

impl StorageLocation {
    /// Creates a new location.
    pub fn new(bucket_or_root: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            bucket_or_root: bucket_or_root.into(),
            path: path.into(),
        }
    }
}

impl fmt::Display for StorageLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.bucket_or_root)
        } else {
            write!(f, "{}/{}", self.bucket_or_root.trim_end_matches('/'), self.path)
        }
    }
}

/// Joins two relative paths, skipping empty sides.
pub fn join(base: &str, rel: &str) -> String {
    let base = base.trim_matches('/');
    let rel = rel.trim_matches('/');
    match (base.is_empty(), rel.is_empty()) {
        (true, _) => rel.to_string(),
        (false, true) => base.to_string(),
        (false, false) => format!("{base}/{rel}"),
    }
}

/// Checks a single path segment.
pub fn validate_segment(segment: &str) -> Result<()> {
    if segment.is_empty() || segment == "." || segment == ".." {
        return Err(Error::invalid_input().with_message(format!(
            "invalid path segment '{segment}'"
        )));
    }

    if segment.contains(['/', '\\']) {
        return Err(Error::invalid_input().with_message(format!(
            "path segment '{segment}' contains a separator"
        )));
    }

    if segment.chars().any(char::is_control) {
        return Err(Error::invalid_input().with_message(format!(
            "path segment '{}' contains control characters",
            segment.escape_debug()
        )));
    }

    Ok(())
}

/// Checks a relative object path. The empty path addresses the store root.
pub fn validate_relative(path: &str) -> Result<()> {
    if path.is_empty() {
        return Ok(());
    }

    if path.starts_with('/') || path.ends_with('/') {
        return Err(Error::invalid_input().with_message(format!(
            "path '{path}' must not start or end with '/'"
        )));
    }

    path.split('/').try_for_each(validate_segment)
}

/// Reduces a user-supplied file name to a single safe path segment.
///
/// Directory components (either separator style) are dropped and
/// surrounding whitespace trimmed; whatever remains must be a valid segment.
pub fn sanitize_file_name(name: &str) -> Result<String> {
    let last = name.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    validate_segment(last)?;
    Ok(last.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_skips_empty_sides() {
        assert_eq!(join("", "a/b"), "a/b");
        assert_eq!(join("base", ""), "base");
        assert_eq!(join("base/", "/a"), "base/a");
        assert_eq!(join("", ""), "");
    }

    #[test]
    fn relative_paths_are_validated() {
        assert!(validate_relative("lib/doc/metadata.json").is_ok());
        assert!(validate_relative("").is_ok());
        assert!(validate_relative("/lib").is_err());
        assert!(validate_relative("lib/").is_err());
        assert!(validate_relative("lib//doc").is_err());
        assert!(validate_relative("lib/../etc").is_err());
        assert!(validate_relative("lib/./doc").is_err());
    }

    #[test]
    fn file_names_are_flattened() {
        assert_eq!(sanitize_file_name("acts/penal code.pdf").unwrap(), "penal code.pdf");
        assert_eq!(sanitize_file_name("C:\\docs\\a.txt").unwrap(), "a.txt");
        assert_eq!(sanitize_file_name("  order.docx ").unwrap(), "order.docx");
        assert!(sanitize_file_name("dir/").is_err());
        assert!(sanitize_file_name("..").is_err());
        assert!(sanitize_file_name("a\u{0}b").is_err());
    }

    #[test]
    fn location_display() {
        let location = StorageLocation::new("bucket", "base/lib/doc");
        assert_eq!(location.to_string(), "bucket/base/lib/doc");
        assert_eq!(StorageLocation::new("/tmp/root/", "").to_string(), "/tmp/root/");
    }
}
