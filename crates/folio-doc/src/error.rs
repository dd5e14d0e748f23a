//! Error types for the document layer.

use folio_fs::FsError;
use folio_index::IndexError;

/// Errors that can occur while reading, mutating or flushing documents.
#[derive(Debug, thiserror::Error)]
pub enum DocError {
    #[error("no such entry: {0}")]
    NotFound(String),

    #[error("not a container: {0}")]
    NotAContainer(String),

    #[error("not a document: {0}")]
    NotADocument(String),

    #[error("invalid entry name {name:?}: {reason}")]
    InvalidName { name: String, reason: String },

    /// A folder file or document could not be encoded or decoded.
    #[error("codec error at {path}: {source}")]
    Codec {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("filesystem error: {0}")]
    Fs(#[from] FsError),

    #[error("index error: {0}")]
    Index(#[from] IndexError),
}

/// Convenience alias for document results.
pub type DocResult<T> = Result<T, DocError>;
