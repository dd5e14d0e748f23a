//! Content-addressed object storage for folio.
//!
//! A hash-keyed object store analogous to git's `.git/objects/` directory.
//! Every file a folio repository has ever held, every directory listing and
//! every commit is an immutable object identified by its domain-separated
//! BLAKE3 hash.
//!
//! # Object Types
//!
//! - [`Blob`] -- raw file content (canonical JSON documents, folder files)
//! - [`Tree`] -- directory listing mapping names to object references
//! - [`CommitObject`] -- root tree plus parent commits
//!
//! # Storage Backends
//!
//! - [`InMemoryObjectStore`] -- objects shelved by kind in memory, for tests and embedding
//! - [`FsObjectStore`] -- loose objects on disk, written atomically
//!
//! # Design Rules
//!
//! 1. Objects are immutable once written.
//! 2. Writes are idempotent: the same content always lands on the same id.
//! 3. The store never interprets object contents.
//! 4. All I/O errors are propagated.

pub mod error;
pub mod fs;
pub mod memory;
pub mod object;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use fs::FsObjectStore;
pub use memory::InMemoryObjectStore;
pub use object::{Blob, CommitObject, EntryMode, ObjectKind, StoredObject, Tree, TreeEntry};
pub use traits::ObjectStore;
