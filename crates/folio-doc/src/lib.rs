//! # folio-doc
//!
//! The document tree stored in a folio branch.
//!
//! A [`Container`] maps names to [`Node`]s (documents or nested containers)
//! and may own an index. Changes are buffered in memory with a per-entry
//! [`EntryState`] and written to a [`DocStore`] by [`Container::flush`] using
//! the canonical encoding in [`codec`].

pub mod codec;
pub mod container;
pub mod error;
pub mod node;
pub mod store;

pub use codec::{decode, encode, DOC_SUFFIX, FOLDER_FILE};
pub use container::{validate_name, Container, EntryState};
pub use error::{DocError, DocResult};
pub use node::{Document, Node, NodeKind};
pub use store::DocStore;
