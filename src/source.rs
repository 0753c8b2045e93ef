//! Validated source image identifiers.
//!
//! A [`SourceId`] is a relative, `/`-separated path under the configured image
//! directory. It is used verbatim to build both the source path and the cache
//! path, so anything that could climb out of either root is rejected here,
//! before the resolver ever sees it.

use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("empty image path")]
    Empty,
    #[error("absolute image path: {0}")]
    Absolute(String),
    #[error("parent directory segment in image path: {0}")]
    ParentTraversal(String),
    #[error("backslash in image path: {0}")]
    Backslash(String),
}

/// A relative image path that cannot escape its root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceId(String);

impl SourceId {
    /// Validate a raw identifier taken from a request path.
    ///
    /// Empty segments and `.` segments are dropped (`a//./b.jpg` → `a/b.jpg`);
    /// `..` anywhere is an error.
    pub fn parse(raw: &str) -> Result<Self, SourceError> {
        if raw.contains('\\') {
            return Err(SourceError::Backslash(raw.to_string()));
        }
        if raw.starts_with('/') {
            return Err(SourceError::Absolute(raw.to_string()));
        }
        let mut segments = Vec::new();
        for segment in raw.split('/') {
            match segment {
                "" | "." => continue,
                ".." => return Err(SourceError::ParentTraversal(raw.to_string())),
                s => segments.push(s),
            }
        }
        if segments.is_empty() {
            return Err(SourceError::Empty);
        }
        Ok(Self(segments.join("/")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolve under `root`.
    pub fn under(&self, root: &Path) -> PathBuf {
        self.0.split('/').fold(root.to_path_buf(), |p, s| p.join(s))
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SourceId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_relative_path() {
        let id = SourceId::parse("products/shoe.jpg").unwrap();
        assert_eq!(id.as_str(), "products/shoe.jpg");
    }

    #[test]
    fn redundant_segments_collapse() {
        let id = SourceId::parse("a//./b.png").unwrap();
        assert_eq!(id.as_str(), "a/b.png");
    }

    #[test]
    fn rejects_parent_segments() {
        for raw in ["..", "../etc/passwd", "a/../../b.jpg", "a/.."] {
            assert!(
                matches!(SourceId::parse(raw), Err(SourceError::ParentTraversal(_))),
                "{raw}"
            );
        }
    }

    #[test]
    fn dots_inside_names_are_fine() {
        let id = SourceId::parse("a/..b/c...jpg").unwrap();
        assert_eq!(id.as_str(), "a/..b/c...jpg");
    }

    #[test]
    fn rejects_absolute_and_backslash() {
        assert!(matches!(
            SourceId::parse("/etc/passwd"),
            Err(SourceError::Absolute(_))
        ));
        assert!(matches!(
            SourceId::parse("a\\..\\b"),
            Err(SourceError::Backslash(_))
        ));
    }

    #[test]
    fn rejects_empty() {
        for raw in ["", ".", "./", "./."] {
            assert_eq!(SourceId::parse(raw), Err(SourceError::Empty), "{raw}");
        }
    }

    #[test]
    fn under_joins_each_segment() {
        let id = SourceId::parse("x/y/z.gif").unwrap();
        assert_eq!(
            id.under(Path::new("/images")),
            PathBuf::from("/images/x/y/z.gif")
        );
    }
}
