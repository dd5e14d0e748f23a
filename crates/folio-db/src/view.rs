//! The state a database view shares with its transaction participants.

use std::collections::BTreeSet;

use folio_doc::{Container, DocStore, Node};
use folio_fs::{path, Published, Repository, Workspace};
use folio_index::{
    apply, plan, ContentResolver, Extensions, Index, IndexError, IndexHost, IndexLocation,
    IndexRegistry, IndexResult,
};
use folio_txn::{JoinQueue, Participant};
use tracing::debug;

use crate::error::DbResult;
use crate::session::{IndexSession, StoreParticipant};

pub(crate) type DbParticipant = Box<dyn Participant<ViewState, crate::DbError>>;

/// One branch of a repository, loaded into memory.
///
/// This is the context every transaction participant works on: the staged
/// workspace, the document mirror, the named-index registry and the queue of
/// participants waiting to join.
pub struct ViewState {
    pub(crate) store: DocStore,
    pub(crate) root: Container,
    pub(crate) registry: IndexRegistry,
    pub(crate) extensions: Extensions<Node>,
    pub(crate) commit_message: String,
    /// Set by the store participant once the branch has moved.
    pub(crate) published: Option<Published>,
    pending: Vec<DbParticipant>,
    /// Containers with an open index session.
    sessions: BTreeSet<String>,
    store_joined: bool,
    /// Containers whose index was written during the current rebuild.
    touched: Vec<String>,
}

impl ViewState {
    pub(crate) fn open(repo: Repository, branch: &str, commit_message: String) -> DbResult<Self> {
        let store = DocStore::new(Workspace::open(repo, branch)?);
        let root = Container::load(&store)?;
        let mut view = Self {
            store,
            root,
            registry: IndexRegistry::new(),
            extensions: Extensions::new(),
            commit_message,
            published: None,
            pending: Vec::new(),
            sessions: BTreeSet::new(),
            store_joined: false,
            touched: Vec::new(),
        };
        view.rebuild_registry();
        Ok(view)
    }

    pub(crate) fn branch(&self) -> &str {
        self.store.workspace().branch()
    }

    pub(crate) fn repository(&self) -> &Repository {
        self.store.workspace().repository()
    }

    /// Re-open `branch` at its tip, dropping everything buffered.
    pub(crate) fn open_branch(&mut self, branch: &str) -> DbResult<()> {
        let repo = self.repository().clone();
        self.store = DocStore::new(Workspace::open(repo, branch)?);
        self.reload()?;
        self.reset_joins();
        debug!(branch, "view opened");
        Ok(())
    }

    /// Move the buffered changes onto a new branch forked from the current
    /// base, and queue them to be written again in full.
    pub(crate) fn rebind(&mut self, branch: &str) -> DbResult<()> {
        let forked = self.store.workspace().fork(branch)?;
        self.store = DocStore::new(forked);
        self.reset_joins();
        self.root.mark_all_dirty();
        let mut indexed = Vec::new();
        self.root.walk(&mut |container| {
            if container.index().is_some() {
                indexed.push(container.path().to_string());
            }
        });
        for container in indexed {
            self.join_session(&container);
        }
        self.join_store();
        debug!(branch, sessions = self.sessions.len(), "view rebound");
        Ok(())
    }

    /// Reload the mirror from the workspace.
    pub(crate) fn reload(&mut self) -> DbResult<()> {
        self.root = Container::load(&self.store)?;
        self.rebuild_registry();
        Ok(())
    }

    pub(crate) fn rebuild_registry(&mut self) {
        self.registry.clear();
        let registry = &mut self.registry;
        self.root.walk(&mut |container| {
            if let Some(index) = container.index() {
                registry.register(container.path(), index);
            }
        });
    }

    pub(crate) fn flush(&mut self) -> DbResult<()> {
        self.root.flush(&mut self.store)?;
        Ok(())
    }

    // ---------------------------------------------------------------
    // Joins
    // ---------------------------------------------------------------

    /// Record that the container at `dir` changed: every indexed container
    /// from `dir` up to the root gets a session, and the store joins.
    pub(crate) fn enlist(&mut self, dir: &str) {
        let mut current = Some(dir);
        while let Some(dir) = current {
            let indexed = self
                .root
                .container_at(dir)
                .is_some_and(|container| container.index().is_some());
            if indexed {
                self.join_session(dir);
            }
            current = path::parent(dir);
        }
        self.join_store();
    }

    fn join_session(&mut self, container: &str) {
        if self.sessions.insert(container.to_string()) {
            debug!(container, "index session opened");
            self.pending.push(Box::new(IndexSession::new(container)));
        }
    }

    fn join_store(&mut self) {
        if !self.store_joined {
            self.store_joined = true;
            self.pending.push(Box::new(StoreParticipant));
        }
    }

    pub(crate) fn close_session(&mut self, container: &str) {
        if self.sessions.remove(container) {
            debug!(container, "index session closed");
        }
    }

    pub(crate) fn store_left(&mut self) {
        self.store_joined = false;
    }

    /// Drop queued participants and open sessions.
    pub(crate) fn reset_joins(&mut self) {
        self.pending.clear();
        self.sessions.clear();
        self.store_joined = false;
        self.published = None;
        self.touched.clear();
    }

    pub(crate) fn has_pending_changes(&self) -> bool {
        !self.pending.is_empty() || self.root.needs_flush() || self.store.workspace().has_changes()
    }

    // ---------------------------------------------------------------
    // Indexes
    // ---------------------------------------------------------------

    /// Rebuild the index owned by `container` from the container's own
    /// items. Containers whose indexes receive records are enlisted.
    pub(crate) fn rebuild_index(&mut self, container: &str) -> DbResult<()> {
        let Some(owner) = self.root.container_at(container) else {
            return Ok(());
        };
        let Some(index) = owner.index() else {
            return Ok(());
        };
        let steps = plan(
            index,
            IndexLocation::root(container),
            &owner.snapshot(),
            &self.extensions,
        )?;
        let registry = std::mem::take(&mut self.registry);
        let applied = apply(&mut *self, &registry, steps);
        self.registry = registry;
        let touched = std::mem::take(&mut self.touched);
        applied?;
        for dir in touched {
            self.enlist(&dir);
        }
        Ok(())
    }

    pub(crate) fn validate_index(&self, container: &str) -> DbResult<()> {
        if let Some(index) = self.root.container_at(container).and_then(Container::index) {
            index.validate(&self.extensions)?;
        }
        Ok(())
    }
}

impl JoinQueue<ViewState, crate::DbError> for ViewState {
    fn drain_joins(&mut self) -> Vec<DbParticipant> {
        std::mem::take(&mut self.pending)
    }
}

impl IndexHost for ViewState {
    fn flush(&mut self) -> IndexResult<()> {
        self.root
            .flush(&mut self.store)
            .map_err(|e| IndexError::Backend(e.to_string()))
    }

    fn index(&self, location: &IndexLocation) -> Option<&Index> {
        self.root
            .container_at(&location.container)?
            .index()?
            .locate(&location.subpath)
    }

    fn index_mut(
        &mut self,
        location: &IndexLocation,
    ) -> IndexResult<(&mut Index, &dyn ContentResolver)> {
        let index = self
            .root
            .container_at_mut(&location.container)
            .and_then(Container::index_mut)
            .and_then(|index| index.locate_mut(&location.subpath))
            .ok_or_else(|| IndexError::Configuration(format!("no index at {location}")))?;
        self.touched.push(location.container.clone());
        Ok((index, &self.store))
    }
}
