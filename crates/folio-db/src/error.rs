//! Error types for database views.

use std::fmt;

use folio_doc::DocError;
use folio_fs::FsError;
use folio_index::IndexError;
use folio_txn::TxnError;

/// Errors that can occur while using a [`Database`](crate::Database).
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("no such path: {0}")]
    NotFound(String),

    #[error("not a container: {0}")]
    NotAContainer(String),

    #[error("container '{0}' has no index")]
    NoIndex(String),

    #[error("invalid content hash {hash:?}: {reason}")]
    InvalidHash { hash: String, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("filesystem error: {0}")]
    Fs(#[from] FsError),

    #[error("document error: {0}")]
    Doc(#[from] DocError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("transaction error: {0}")]
    Txn(#[from] TxnError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for database results.
pub type DbResult<T> = Result<T, DbError>;

/// Why a commit failed, as far as recovery is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Another writer changed the same paths.
    ConcurrencyConflict,
    /// The backing store could not be read or written.
    StorageFailure,
    Unknown,
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FailureClass::ConcurrencyConflict => "concurrency conflict",
            FailureClass::StorageFailure => "storage failure",
            FailureClass::Unknown => "unknown",
        })
    }
}

impl DbError {
    pub fn class(&self) -> FailureClass {
        match self {
            DbError::Fs(e) | DbError::Doc(DocError::Fs(e)) if e.is_conflict() => {
                FailureClass::ConcurrencyConflict
            }
            DbError::Fs(_)
            | DbError::Doc(DocError::Fs(_))
            | DbError::Io(_)
            | DbError::Index(IndexError::Backend(_)) => FailureClass::StorageFailure,
            _ => FailureClass::Unknown,
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.class() == FailureClass::ConcurrencyConflict
    }
}
