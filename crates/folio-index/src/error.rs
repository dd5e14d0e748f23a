//! Error types for index operations.

/// Two source items of one rebuild pass mapped to the same target key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("duplicate key '{key}' for values '{first}' and '{second}'")]
pub struct IndexUpdateError {
    pub key: String,
    pub first: String,
    pub second: String,
}

/// Errors that can occur during index lookup, rebuild and validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IndexError {
    #[error(transparent)]
    Duplicate(#[from] IndexUpdateError),

    /// A named subindex was requested on a container index that lacks it.
    #[error("there is no index called '{0}'")]
    NoSuchSubindex(String),

    /// Supply links, hook names or mapper names that cannot be resolved.
    #[error("index configuration error: {0}")]
    Configuration(String),

    /// A dotted key lookup stopped at a missing or non-mapping segment.
    #[error("key not found: '{segment}' in '{key}'")]
    KeyNotFound { key: String, segment: String },

    /// An index failed validation.
    #[error("invalid index {index}: {reason}")]
    Invalid { index: String, reason: String },

    /// The backing store could not answer a path or hash query.
    #[error("index backend error: {0}")]
    Backend(String),
}

/// Convenience alias for index results.
pub type IndexResult<T> = Result<T, IndexError>;
