use thiserror::Error;

/// Errors produced when parsing foundation types.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("invalid hash length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
}
