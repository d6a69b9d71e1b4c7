//! core type-safe wrappers around git primitives for the storage layer.

use std::fmt;
use std::path::{Component, Path};

use chrono::{DateTime, Utc};
use git2::Oid;
use serde::{Serialize, Serializer};

use crate::document::{is_page_extension, page_extension, shorten_page_name};

/// A committed snapshot of the wiki (a git commit id).
///
/// This makes sure we don't accidentally pass a blob ID where a commit ID
/// is expected. The inner Oid is only accessible within the storage module.
/// Equality is content identity; there is no meaningful ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RevisionId(pub(crate) Oid);

impl RevisionId {
    pub(crate) fn new(oid: Oid) -> Self {
        Self(oid)
    }

    /// raw Oid (for internal use only)
    pub(crate) fn raw(&self) -> Oid {
        self.0
    }

    /// parse a RevisionId from a full hex string
    pub fn from_hex(hex: &str) -> Result<Self, git2::Error> {
        Oid::from_str(hex).map(RevisionId)
    }

    /// short form of the revision id
    pub fn short(&self) -> String {
        let mut hex = self.0.to_string();
        hex.truncate(7);
        hex
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for RevisionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

/// Git blob identifier: the content identity of a page version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlobId(pub(crate) Oid);

impl BlobId {
    pub(crate) fn new(oid: Oid) -> Self {
        Self(oid)
    }

    pub(crate) fn raw(&self) -> Oid {
        self.0
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Git tree identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TreeId(pub(crate) Oid);

impl TreeId {
    pub(crate) fn new(oid: Oid) -> Self {
        Self(oid)
    }

    pub(crate) fn raw(&self) -> Oid {
        self.0
    }
}

impl fmt::Display for TreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated, normalized repository-relative page path.
///
/// Page paths are used both as filesystem paths and as git index paths, so
/// they are restricted to prevent path traversal:
/// - relative, `/`-separated, no empty or `.` components
/// - `..` is resolved lexically and may never climb above the root
/// - nothing under the `.git` metadata directory
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PagePath(String);

impl PagePath {
    const METADATA_DIR: &'static str = ".git";

    /// create a new PagePath, normalizing and validating the input
    pub fn new(raw: &str) -> Result<Self, InvalidPathError> {
        let mut parts: Vec<&str> = Vec::new();

        for component in Path::new(raw).components() {
            match component {
                Component::Normal(part) => match part.to_str() {
                    Some(part) => parts.push(part),
                    None => return Err(InvalidPathError::Escape(raw.to_string())),
                },
                Component::CurDir => {}
                Component::ParentDir => {
                    if parts.pop().is_none() {
                        return Err(InvalidPathError::Escape(raw.to_string()));
                    }
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(InvalidPathError::Absolute(raw.to_string()));
                }
            }
        }

        if parts.is_empty() {
            return Err(InvalidPathError::Empty);
        }
        if parts[0].eq_ignore_ascii_case(Self::METADATA_DIR) {
            return Err(InvalidPathError::Metadata(raw.to_string()));
        }

        Ok(Self(parts.join("/")))
    }

    /// get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_path(&self) -> &Path {
        Path::new(&self.0)
    }

    /// extension of the last component, without the dot
    pub fn extension(&self) -> Option<&str> {
        page_extension(&self.0)
    }

    /// check if the path ends with one of the page extensions
    pub fn has_page_extension(&self) -> bool {
        self.extension().is_some_and(is_page_extension)
    }

    /// append `.{ext}` to the path
    pub fn with_extension(&self, ext: &str) -> Self {
        Self(format!("{}.{}", self.0, ext))
    }

    /// the path without its extension
    pub fn short_name(&self) -> &str {
        shorten_page_name(&self.0)
    }

    /// convert to owned String
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for PagePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for PagePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// error type for invalid page paths
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidPathError {
    Empty,
    Absolute(String),
    Escape(String),
    Metadata(String),
}

impl fmt::Display for InvalidPathError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "path cannot be empty"),
            Self::Absolute(path) => write!(f, "path must be relative: '{}'", path),
            Self::Escape(path) => write!(f, "path leaves the repository: '{}'", path),
            Self::Metadata(path) => write!(f, "path points into repository metadata: '{}'", path),
        }
    }
}

impl std::error::Error for InvalidPathError {}

/// author identity and time embedded into a new commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSignature {
    pub name: String,
    pub email: String,
    pub timestamp: DateTime<Utc>,
}

impl CommitSignature {
    /// create a new signature
    pub fn new(name: impl Into<String>, email: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            timestamp,
        }
    }

    /// a signature stamped with the current time
    pub fn now(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self::new(name, email, Utc::now())
    }

    /// convert to git2::Signature
    pub(crate) fn to_git2_signature(&self) -> Result<git2::Signature<'static>, git2::Error> {
        let time = git2::Time::new(self.timestamp.timestamp(), 0);
        git2::Signature::new(&self.name, &self.email, &time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_path_normalizes() {
        assert_eq!(PagePath::new("notes/linux.md").unwrap().as_str(), "notes/linux.md");
        assert_eq!(PagePath::new("./notes//linux.md").unwrap().as_str(), "notes/linux.md");
        assert_eq!(PagePath::new("notes/../index.md").unwrap().as_str(), "index.md");
    }

    #[test]
    fn test_page_path_rejects_escape() {
        assert_eq!(PagePath::new(""), Err(InvalidPathError::Empty));
        assert_eq!(PagePath::new("./."), Err(InvalidPathError::Empty));
        assert!(matches!(PagePath::new("../secret"), Err(InvalidPathError::Escape(_))));
        assert!(matches!(PagePath::new("a/../../b"), Err(InvalidPathError::Escape(_))));
        assert!(matches!(PagePath::new("/etc/passwd"), Err(InvalidPathError::Absolute(_))));
        assert!(matches!(PagePath::new(".git/config"), Err(InvalidPathError::Metadata(_))));
        assert!(matches!(PagePath::new("x/../.git/HEAD"), Err(InvalidPathError::Metadata(_))));
    }

    #[test]
    fn test_page_path_extensions() {
        let path = PagePath::new("notes/linux").unwrap();
        assert_eq!(path.extension(), None);
        assert!(!path.has_page_extension());

        let path = path.with_extension("rst");
        assert_eq!(path.as_str(), "notes/linux.rst");
        assert!(path.has_page_extension());
        assert_eq!(path.short_name(), "notes/linux");

        let path = PagePath::new("release-1.2").unwrap();
        assert_eq!(path.extension(), Some("2"));
        assert!(!path.has_page_extension());
    }

    #[test]
    fn test_revision_id_hex() {
        let hex = "0123456789abcdef0123456789abcdef01234567";
        let id = RevisionId::from_hex(hex).unwrap();
        assert_eq!(id.to_string(), hex);
        assert_eq!(id.short(), "0123456");
        assert!(RevisionId::from_hex("not-a-sha").is_err());
    }

    #[test]
    fn test_signature_conversion() {
        let when = DateTime::parse_from_rfc3339("2014-05-01T10:00:00Z").unwrap().with_timezone(&Utc);
        let sig = CommitSignature::new("Ann", "ann@example.com", when);
        let git_sig = sig.to_git2_signature().unwrap();
        assert_eq!(git_sig.name(), Some("Ann"));
        assert_eq!(git_sig.when().seconds(), when.timestamp());

        let bad = CommitSignature::now("<Ann>", "ann@example.com");
        assert!(bad.to_git2_signature().is_err());
    }
}
