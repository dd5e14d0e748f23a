//! # folio-db
//!
//! Database views over a folio repository.
//!
//! A [`Database`] loads one branch into memory as a tree of containers and
//! documents. Every change enlists the indexes of the containers above it in
//! the running transaction. On [`Database::save`] those indexes are rebuilt
//! and validated, the tree is written out and the branch is published with a
//! compare-and-swap.
//!
//! A save that fails (for example because another writer changed the same
//! document first) does not lose its changes: the
//! [`CommitCoordinator`] commits them to a fresh `conflict-<uuid>` branch,
//! puts the view back on its own branch and returns the original error.
//!
//! ```no_run
//! use folio_db::{Database, DbConfig};
//! use folio_doc::{Container, Document};
//!
//! # fn main() -> folio_db::DbResult<()> {
//! let mut db = Database::open_path(std::path::Path::new("data"), DbConfig::default())?;
//! db.insert("people", Container::new())?;
//! db.insert_path("people/alice", Document::new().with("email", "alice@example.org"))?;
//! if let Err(e) = db.save() {
//!     eprintln!("saved to {:?} instead: {e}", db.last_quarantine());
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod coordinator;
pub mod database;
pub mod error;
mod session;
pub mod view;

pub use config::{DbConfig, CONFIG_FILE, DEFAULT_COMMIT_MESSAGE, DEFAULT_CONFLICT_PREFIX};
pub use coordinator::{unique_branch_name, CommitCoordinator, CommitState};
pub use database::Database;
pub use error::{DbError, DbResult, FailureClass};
pub use view::ViewState;
