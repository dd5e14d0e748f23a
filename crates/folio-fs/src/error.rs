//! Error types for the versioned filesystem.

use std::path::PathBuf;

/// Errors that can occur during workspace and repository operations.
#[derive(Debug, thiserror::Error)]
pub enum FsError {
    /// No file or directory at the path.
    #[error("no such file or directory: {0}")]
    NotFound(String),

    /// A directory was required but the path (or one of its parents) is a file.
    #[error("not a directory: {0}")]
    NotADirectory(String),

    /// A file was required but the path is a directory.
    #[error("is a directory: {0}")]
    IsADirectory(String),

    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// Concurrent changes to the same paths could not be merged.
    #[error("conflicting changes to {}", paths.join(", "))]
    Conflict { paths: Vec<String> },

    /// The branch kept moving while the commit was being published.
    #[error("branch {branch} moved {attempts} times during commit")]
    RefMoved { branch: String, attempts: usize },

    #[error("branch already exists: {0}")]
    BranchExists(String),

    #[error("not a folio repository: {}", .0.display())]
    NotARepository(PathBuf),

    #[error("store error: {0}")]
    Store(#[from] folio_store::StoreError),

    #[error("ref error: {0}")]
    Ref(#[from] folio_refs::RefError),
}

impl FsError {
    /// `true` for failures caused by a concurrent writer.
    pub fn is_conflict(&self) -> bool {
        matches!(self, FsError::Conflict { .. } | FsError::RefMoved { .. })
    }
}

/// Convenience alias for filesystem results.
pub type FsResult<T> = Result<T, FsError>;
