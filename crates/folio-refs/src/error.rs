//! Error types for reference operations.

use thiserror::Error;

/// Errors that can occur during reference operations.
#[derive(Debug, Error)]
pub enum RefError {
    #[error("ref not found: {name}")]
    NotFound { name: String },

    #[error("invalid branch name: {name}: {reason}")]
    InvalidBranchName { name: String, reason: String },

    /// HEAD names a branch; that branch cannot be deleted.
    #[error("cannot delete current branch: {name}")]
    DeleteCurrentBranch { name: String },

    /// A ref file exists but does not hold a valid hash or HEAD value.
    #[error("corrupt ref {name}: {reason}")]
    Corrupt { name: String, reason: String },

    #[error("lock poisoned: {0}")]
    Poisoned(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for ref operations.
pub type Result<T> = std::result::Result<T, RefError>;
