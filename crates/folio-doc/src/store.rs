//! Path-level persistence used by containers.

use folio_fs::{FsError, Workspace};
use folio_index::{ContentResolver, IndexError, IndexResult};
use folio_types::ContentHash;
use tracing::warn;

use crate::codec::DOC_SUFFIX;
use crate::error::DocResult;

/// The persistence surface of a document tree: a [`Workspace`] plus the
/// removal tolerance flushes rely on.
#[derive(Debug, Clone)]
pub struct DocStore {
    workspace: Workspace,
}

impl DocStore {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }

    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    pub fn workspace_mut(&mut self) -> &mut Workspace {
        &mut self.workspace
    }

    pub fn into_workspace(self) -> Workspace {
        self.workspace
    }

    pub fn exists(&self, path: &str) -> DocResult<bool> {
        Ok(self.workspace.exists(path)?)
    }

    pub fn is_dir(&self, path: &str) -> DocResult<bool> {
        Ok(self.workspace.is_dir(path)?)
    }

    pub fn mkdir(&mut self, path: &str) -> DocResult<()> {
        Ok(self.workspace.mkdir(path)?)
    }

    pub fn write(&mut self, path: &str, data: &[u8]) -> DocResult<ContentHash> {
        Ok(self.workspace.write(path, data)?)
    }

    pub fn read(&self, path: &str) -> DocResult<Vec<u8>> {
        Ok(self.workspace.read(path)?)
    }

    pub fn hash(&self, path: &str) -> DocResult<ContentHash> {
        Ok(self.workspace.hash(path)?)
    }

    pub fn show(&self, id: &ContentHash) -> DocResult<Vec<u8>> {
        Ok(self.workspace.show(id)?)
    }

    /// Remove a file. A file that is already gone is logged and skipped, so
    /// a removal can be flushed more than once. Returns whether anything
    /// was removed.
    pub fn remove_file(&mut self, path: &str) -> DocResult<bool> {
        match self.workspace.rm(path) {
            Ok(()) => Ok(true),
            Err(FsError::NotFound(missing)) => {
                warn!(path = %missing, "file already removed (probably a repeated flush)");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Remove a directory tree, tolerating its absence like
    /// [`remove_file`](Self::remove_file).
    pub fn remove_dir(&mut self, path: &str) -> DocResult<bool> {
        match self.workspace.rmtree(path) {
            Ok(()) => Ok(true),
            Err(FsError::NotFound(missing)) => {
                warn!(path = %missing, "directory already removed (probably a repeated flush)");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl ContentResolver for DocStore {
    fn is_dir(&self, path: &str) -> IndexResult<bool> {
        self.workspace
            .is_dir(path)
            .map_err(|e| IndexError::Backend(e.to_string()))
    }

    fn content_hash(&self, path: &str) -> IndexResult<ContentHash> {
        self.workspace
            .hash(path)
            .map_err(|e| IndexError::Backend(e.to_string()))
    }

    fn leaf_suffix(&self) -> &str {
        DOC_SUFFIX
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_fs::Repository;

    fn store() -> DocStore {
        DocStore::new(Workspace::open(Repository::in_memory().unwrap(), "main").unwrap())
    }

    #[test]
    fn repeated_removal_is_tolerated() {
        let mut store = store();
        store.write("a/b.json", b"{}").unwrap();
        assert!(store.remove_file("a/b.json").unwrap());
        assert!(!store.remove_file("a/b.json").unwrap());
        assert!(store.remove_dir("a").unwrap());
        assert!(!store.remove_dir("a").unwrap());
    }

    #[test]
    fn type_errors_are_not_tolerated() {
        let mut store = store();
        store.mkdir("dir").unwrap();
        assert!(store.remove_file("dir").is_err());
    }

    #[test]
    fn resolver_hashes_files_and_directories() {
        let mut store = store();
        let id = store.write("d/x.json", b"{}").unwrap();
        assert_eq!(store.content_hash("d/x.json").unwrap(), id);
        assert!(ContentResolver::is_dir(&store, "d").unwrap());
        let before = store.content_hash("d").unwrap();
        store.write("d/y.json", b"{}").unwrap();
        assert_ne!(store.content_hash("d").unwrap(), before);
        assert!(matches!(store.content_hash("nope"), Err(IndexError::Backend(_))));
        assert_eq!(store.leaf_suffix(), ".json");
    }
}
