//! Versioned filesystem for folio.
//!
//! A [`Repository`] pairs an object store with a ref store. A [`Workspace`]
//! is one writer's view of a branch: it is opened at the branch tip (its
//! *base*), mutated in memory, and committed in two steps:
//!
//! 1. [`Workspace::prepare`] writes the new trees and commit object. If the
//!    branch moved since the base was read, the changes are merged path by
//!    path with the new tip; overlapping changes fail with
//!    [`FsError::Conflict`].
//! 2. [`Workspace::finish`] moves the branch with a compare-and-swap, which
//!    is the only point where concurrent writers synchronize.
//!
//! Paths are `/`-separated and relative to the repository root; the root
//! itself is the empty path.

pub mod error;
pub mod merge;
pub mod path;
pub mod repo;
pub mod staging;
pub mod workspace;

pub use error::{FsError, FsResult};
pub use repo::Repository;
pub use staging::{Staged, StagingMap};
pub use workspace::{PreparedCommit, Published, Workspace};
