//! Storage layer error types
//!
//! All errors that can occur during storage operations are defined here.
//! We use `thiserror` for ergonomic error definition and better error messages

use std::path::PathBuf;

use thiserror::Error;

use crate::document::DocumentError;
use crate::storage::types::InvalidPathError;

/// the main error type for storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// error from the underlying Git library
    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    /// repository or page does not exist and creation was not requested
    #[error("not found: {0}")]
    NotFound(String),

    /// a resolved path would leave the repository root
    #[error("path escapes the repository root: {0}")]
    PathEscape(String),

    /// the page path is malformed (empty, or only `.` components)
    #[error("invalid page path: {0}")]
    InvalidPath(String),

    /// repository metadata is unreadable or inconsistent
    #[error("repository at {path} is corrupt: {reason}")]
    RepositoryCorrupt { path: PathBuf, reason: String },

    /// I/O error (filesystem level)
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// a tree or parent could not be read while walking history
    #[error("history traversal failed at {commit}: {reason}")]
    HistoryTraversal { commit: String, reason: String },

    /// a revision could not be resolved or the tree diff failed
    #[error("diff failed: {0}")]
    Diff(String),

    /// a revision id is not a valid object id
    #[error("invalid revision: {0}")]
    InvalidRevision(String),

    /// repo is empty (no commits)
    #[error("repository is empty: no commits found")]
    EmptyRepository,

    /// the destination of a rename already exists
    #[error("page already exists: {0}")]
    AlreadyExists(String),

    /// page bytes could not be parsed
    #[error("document error: {0}")]
    Document(#[from] DocumentError),

    /// internal error that shouldn't happen
    #[error("internal error: {0}")]
    Internal(String),
}

impl StorageError {
    /// check if this error indicates the resource doesn't exist
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StorageError::NotFound(_) | StorageError::EmptyRepository
        )
    }

    /// check if this error was raised by the path boundary check
    pub fn is_security_violation(&self) -> bool {
        matches!(self, StorageError::PathEscape(_))
    }

    pub(crate) fn history(commit: impl ToString, err: impl ToString) -> Self {
        StorageError::HistoryTraversal {
            commit: commit.to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<InvalidPathError> for StorageError {
    fn from(err: InvalidPathError) -> Self {
        match err {
            InvalidPathError::Empty => StorageError::InvalidPath(err.to_string()),
            InvalidPathError::Absolute(path)
            | InvalidPathError::Escape(path)
            | InvalidPathError::Metadata(path) => StorageError::PathEscape(path),
        }
    }
}

/// result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
