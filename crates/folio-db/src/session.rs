//! Transaction participants of a database view.

use folio_txn::Participant;
use tracing::{debug, info};

use crate::error::DbError;
use crate::view::ViewState;

/// Rebuilds and validates one container's index as part of a transaction.
///
/// A session exists from the first change below its container until the
/// transaction finishes or aborts.
#[derive(Debug)]
pub(crate) struct IndexSession {
    container: String,
}

impl IndexSession {
    pub(crate) fn new(container: &str) -> Self {
        Self {
            container: container.to_string(),
        }
    }
}

impl Participant<ViewState, DbError> for IndexSession {
    fn sort_key(&self) -> String {
        format!("index/{}", self.container)
    }

    fn before_commit(&mut self, view: &mut ViewState) -> Result<(), DbError> {
        debug!(container = %self.container, "rebuilding index");
        view.rebuild_index(&self.container)
    }

    fn tpc_vote(&mut self, view: &mut ViewState) -> Result<(), DbError> {
        view.validate_index(&self.container)
    }

    fn tpc_finish(&mut self, view: &mut ViewState) -> Result<(), DbError> {
        view.close_session(&self.container);
        Ok(())
    }

    fn abort(&mut self, view: &mut ViewState) {
        view.close_session(&self.container);
    }
}

/// Writes the document mirror and publishes the branch.
///
/// The branch is moved during the vote, so a concurrent writer's conflict
/// still aborts every participant. Sorts after all index sessions.
#[derive(Debug)]
pub(crate) struct StoreParticipant;

impl Participant<ViewState, DbError> for StoreParticipant {
    fn sort_key(&self) -> String {
        "store".to_string()
    }

    fn tpc_vote(&mut self, view: &mut ViewState) -> Result<(), DbError> {
        view.flush()?;
        let message = view.commit_message.clone();
        view.published = view.store.workspace_mut().commit(&message)?;
        Ok(())
    }

    fn tpc_finish(&mut self, view: &mut ViewState) -> Result<(), DbError> {
        view.store_left();
        view.root.purge_removed();
        match view.published.take() {
            Some(published) if published.merged => {
                info!(
                    branch = %view.branch(),
                    commit = %published.commit.short_hex(),
                    "merged concurrent changes, reloading view"
                );
                view.reload()
            }
            _ => Ok(()),
        }
    }

    fn abort(&mut self, view: &mut ViewState) {
        view.store_left();
        view.published = None;
    }
}
