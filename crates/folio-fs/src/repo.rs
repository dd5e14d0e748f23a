//! Repository handle: an object store plus a ref store.

use std::path::Path;
use std::sync::Arc;

use folio_refs::{BranchRef, FileRefStore, Head, InMemoryRefStore, RefStore};
use folio_store::{Blob, CommitObject, FsObjectStore, InMemoryObjectStore, ObjectStore, Tree};
use folio_types::ContentHash;
use tracing::info;

use crate::error::{FsError, FsResult};

/// Branch used when HEAD has never been set.
pub const DEFAULT_BRANCH: &str = "main";

/// Shared handle to the stores of one repository.
///
/// Cloning is cheap; every clone talks to the same stores, so threads that
/// each open their own [`Workspace`](crate::Workspace) over a clone see each
/// other's commits.
#[derive(Clone)]
pub struct Repository {
    store: Arc<dyn ObjectStore>,
    refs: Arc<dyn RefStore>,
}

impl std::fmt::Debug for Repository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Repository").finish_non_exhaustive()
    }
}

impl Repository {
    pub fn new(store: Arc<dyn ObjectStore>, refs: Arc<dyn RefStore>) -> Self {
        Self { store, refs }
    }

    /// An ephemeral repository whose HEAD names [`DEFAULT_BRANCH`].
    pub fn in_memory() -> FsResult<Self> {
        let refs = InMemoryRefStore::new();
        refs.set_head(DEFAULT_BRANCH)?;
        Ok(Self::new(Arc::new(InMemoryObjectStore::new()), Arc::new(refs)))
    }

    /// Create the on-disk layout below `root` (idempotent).
    pub fn init(root: &Path, default_branch: &str) -> FsResult<Self> {
        let refs = FileRefStore::open(root)?;
        if refs.head()?.is_none() {
            refs.set_head(default_branch)?;
            info!(root = %root.display(), branch = default_branch, "initialized repository");
        }
        let store = FsObjectStore::open(root)?;
        Ok(Self::new(Arc::new(store), Arc::new(refs)))
    }

    /// Open an existing on-disk repository.
    pub fn open(root: &Path) -> FsResult<Self> {
        if !root.join("HEAD").is_file() {
            return Err(FsError::NotARepository(root.to_path_buf()));
        }
        let refs = FileRefStore::open(root)?;
        let store = FsObjectStore::open(root)?;
        Ok(Self::new(Arc::new(store), Arc::new(refs)))
    }

    pub fn store(&self) -> &dyn ObjectStore {
        self.store.as_ref()
    }

    pub fn refs(&self) -> &dyn RefStore {
        self.refs.as_ref()
    }

    /// The branch named by HEAD, or [`DEFAULT_BRANCH`].
    pub fn default_branch(&self) -> FsResult<String> {
        Ok(match self.refs.head()? {
            Some(Head::Symbolic(branch)) => branch,
            _ => DEFAULT_BRANCH.to_string(),
        })
    }

    pub fn branches(&self) -> FsResult<Vec<BranchRef>> {
        Ok(self.refs.branches()?)
    }

    pub fn branch_tip(&self, branch: &str) -> FsResult<Option<ContentHash>> {
        Ok(self.refs.branch_tip(branch)?)
    }

    pub fn read_commit(&self, id: &ContentHash) -> FsResult<CommitObject> {
        Ok(CommitObject::from_stored_object(&self.store.require(id)?)?)
    }

    pub fn read_tree(&self, id: &ContentHash) -> FsResult<Tree> {
        Ok(Tree::from_stored_object(&self.store.require(id)?)?)
    }

    /// Raw bytes of a blob, by hash. Historical content stays readable after
    /// the path that held it was overwritten or removed.
    pub fn show(&self, id: &ContentHash) -> FsResult<Vec<u8>> {
        Ok(Blob::from_stored_object(&self.store.require(id)?)?.data)
    }

    /// Commits reachable from `branch` by first parents, newest first.
    pub fn history(&self, branch: &str, limit: usize) -> FsResult<Vec<(ContentHash, CommitObject)>> {
        let mut out = Vec::new();
        let mut next = self.branch_tip(branch)?;
        while let Some(id) = next {
            if out.len() >= limit {
                break;
            }
            let commit = self.read_commit(&id)?;
            next = commit.parents.first().copied();
            out.push((id, commit));
        }
        Ok(out)
    }
}
