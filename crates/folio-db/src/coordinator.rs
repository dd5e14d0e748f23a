//! Commit with quarantine on failure.
//!
//! When a commit fails, its changes are not dropped. They are written to a
//! freshly named side branch instead, where someone can resolve them by
//! hand, and the caller still gets the original error. The view always ends
//! up back on the branch it started on, reloaded from that branch's tip.

use std::ops::{Deref, DerefMut};

use folio_txn::{Transaction, TxnState};
use tracing::{error, warn};
use uuid::Uuid;

use crate::error::{DbError, DbResult, FailureClass};
use crate::view::ViewState;

/// `prefix-<uuid>`, or a bare uuid for an empty prefix.
pub fn unique_branch_name(prefix: &str) -> String {
    let id = Uuid::new_v4();
    if prefix.is_empty() {
        id.to_string()
    } else {
        format!("{prefix}-{id}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CommitState {
    #[default]
    Idle,
    Committing,
    Committed,
    /// The last commit failed; its changes went to a quarantine branch if
    /// that commit succeeded.
    Conflicted,
}

/// Switches a view back to `branch` when dropped.
struct RestoreBranch<'v> {
    view: &'v mut ViewState,
    branch: String,
}

impl Deref for RestoreBranch<'_> {
    type Target = ViewState;

    fn deref(&self) -> &ViewState {
        self.view
    }
}

impl DerefMut for RestoreBranch<'_> {
    fn deref_mut(&mut self) -> &mut ViewState {
        self.view
    }
}

impl Drop for RestoreBranch<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.view.open_branch(&self.branch) {
            error!(branch = %self.branch, error = %e, "failed to switch the view back");
        }
    }
}

fn failure_message(class: FailureClass) -> &'static str {
    match class {
        FailureClass::ConcurrencyConflict => "trying to commit this transaction caused a conflict",
        FailureClass::StorageFailure => "problem while writing transaction to the backing store",
        FailureClass::Unknown => "problem while trying to commit this transaction",
    }
}

/// Runs commits for one view.
#[derive(Debug)]
pub struct CommitCoordinator {
    prefix: String,
    state: CommitState,
    last_quarantine: Option<String>,
}

impl CommitCoordinator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            state: CommitState::Idle,
            last_quarantine: None,
        }
    }

    pub fn state(&self) -> CommitState {
        self.state
    }

    /// Branch that received the most recent quarantined changeset.
    pub fn last_quarantine(&self) -> Option<&str> {
        self.last_quarantine.as_deref()
    }

    /// Commit `txn`. On failure the changes are quarantined and the
    /// original error is returned. `txn` is replaced by a fresh transaction
    /// either way.
    pub(crate) fn save(
        &mut self,
        txn: &mut Transaction<ViewState, DbError>,
        view: &mut ViewState,
    ) -> DbResult<()> {
        self.state = CommitState::Committing;
        let result = txn.commit(view);
        let decided = txn.state() == TxnState::Committed;
        *txn = Transaction::new();

        let original = match result {
            Ok(()) => {
                self.state = CommitState::Committed;
                return Ok(());
            }
            Err(e) if decided => {
                // Only tpc_finish failed; the commit itself is durable.
                warn!(error = %e, "commit is durable but finishing it failed");
                self.state = CommitState::Committed;
                return Err(e);
            }
            Err(e) => e,
        };

        let class = original.class();
        error!(class = %class, error = %original, "{}", failure_message(class));
        self.state = CommitState::Conflicted;

        let branch = unique_branch_name(&self.prefix);
        let mut guard = RestoreBranch {
            branch: view.branch().to_string(),
            view,
        };
        match quarantine(&mut guard, &branch) {
            Ok(()) => {
                error!(
                    branch = %branch,
                    "wrote problematic changeset to branch '{branch}', you have to resolve this yourself"
                );
                self.last_quarantine = Some(branch);
            }
            Err(second) => {
                error!(
                    branch = %branch,
                    error = %second,
                    "this doesn't look good... failed to write problematic changeset to branch '{branch}', error was '{second}'"
                );
            }
        }
        drop(guard);
        Err(original)
    }
}

/// Replay the view's changes onto `branch` and commit them there.
fn quarantine(view: &mut ViewState, branch: &str) -> DbResult<()> {
    view.rebind(branch)?;
    Transaction::new().commit(view)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn branch_names_are_prefixed_and_unique() {
        let a = unique_branch_name("conflict");
        let b = unique_branch_name("conflict");
        assert!(a.starts_with("conflict-"));
        assert_ne!(a, b);
        assert_eq!(a.len(), "conflict-".len() + 36);
        assert!(folio_fs::path::normalize(&a).is_ok());
    }

    #[test]
    fn empty_prefix_is_a_bare_id() {
        let name = unique_branch_name("");
        assert!(Uuid::parse_str(&name).is_ok());
    }

    #[test]
    fn coordinator_starts_idle() {
        let coordinator = CommitCoordinator::new("conflict");
        assert_eq!(coordinator.state(), CommitState::Idle);
        assert!(coordinator.last_quarantine().is_none());
    }
}
