//! Branch references for folio.
//!
//! A branch is a mutable pointer from a name to the hash of the commit at its
//! tip. HEAD is a symbolic ref naming the default branch of a repository.
//!
//! Moving a branch tip is the only synchronization point between concurrent
//! writers: [`RefStore::compare_and_swap`] succeeds only if the tip is still
//! where the writer last saw it.
//!
//! # Modules
//!
//! - [`error`]: Error types for ref operations
//! - [`types`]: [`Head`] and [`BranchRef`]
//! - [`traits`]: The [`RefStore`] storage interface
//! - [`names`]: Branch name validation
//! - [`memory`]: In-memory [`InMemoryRefStore`]
//! - [`file`]: On-disk [`FileRefStore`]

pub mod error;
pub mod file;
pub mod memory;
pub mod names;
pub mod traits;
pub mod types;

pub use error::{RefError, Result};
pub use file::FileRefStore;
pub use memory::InMemoryRefStore;
pub use names::{branch_ref_name, validate_branch_name};
pub use traits::RefStore;
pub use types::{BranchRef, Head};
