//! Foundation types for folio.
//!
//! Every other folio crate depends on `folio-types` for the identifier that
//! ties the layers together: the [`ContentHash`] of a stored object. Index
//! records, tree entries, branch refs and commits all speak in content hashes.
//!
//! # Key Types
//!
//! - [`ContentHash`]: 32-byte BLAKE3 digest, rendered as lowercase hex
//! - [`ContentHasher`]: domain-separated hasher (blob, tree, commit)

pub mod error;
pub mod hash;
pub mod hasher;

pub use error::TypeError;
pub use hash::ContentHash;
pub use hasher::ContentHasher;
