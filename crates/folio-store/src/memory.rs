//! Object store held entirely in memory.
//!
//! Objects are shelved by [`ObjectKind`], so a caller can ask how many
//! commits a run produced, or walk the commits themselves, without touching
//! blobs and trees.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use folio_types::ContentHash;
use tracing::trace;

use crate::error::{StoreError, StoreResult};
use crate::object::{CommitObject, ObjectKind, StoredObject};
use crate::traits::ObjectStore;

type Shelves = HashMap<ObjectKind, BTreeMap<ContentHash, Vec<u8>>>;

/// An [`ObjectStore`] that forgets everything on drop.
///
/// One store can back several workspaces on different threads.
#[derive(Default)]
pub struct InMemoryObjectStore {
    shelves: RwLock<Shelves>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn shelves(&self) -> StoreResult<RwLockReadGuard<'_, Shelves>> {
        self.shelves
            .read()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    fn shelves_mut(&self) -> StoreResult<RwLockWriteGuard<'_, Shelves>> {
        self.shelves
            .write()
            .map_err(|e| StoreError::Poisoned(e.to_string()))
    }

    /// Number of stored objects of `kind`.
    pub fn count(&self, kind: ObjectKind) -> StoreResult<usize> {
        Ok(self.shelves()?.get(&kind).map_or(0, BTreeMap::len))
    }

    /// Ids of every stored object of `kind`, in ascending order.
    pub fn ids(&self, kind: ObjectKind) -> StoreResult<Vec<ContentHash>> {
        Ok(self
            .shelves()?
            .get(&kind)
            .map(|shelf| shelf.keys().copied().collect())
            .unwrap_or_default())
    }

    /// Every stored commit, decoded, ordered by id.
    pub fn commits(&self) -> StoreResult<Vec<(ContentHash, CommitObject)>> {
        let shelves = self.shelves()?;
        let Some(shelf) = shelves.get(&ObjectKind::Commit) else {
            return Ok(Vec::new());
        };
        shelf
            .iter()
            .map(|(id, data)| {
                let object = StoredObject::new(ObjectKind::Commit, data.clone());
                Ok((*id, CommitObject::from_stored_object(&object)?))
            })
            .collect()
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn read(&self, id: &ContentHash) -> StoreResult<Option<StoredObject>> {
        let shelves = self.shelves()?;
        Ok(shelves.iter().find_map(|(kind, shelf)| {
            shelf
                .get(id)
                .map(|data| StoredObject::new(*kind, data.clone()))
        }))
    }

    fn write(&self, object: &StoredObject) -> StoreResult<ContentHash> {
        let id = object.compute_id();
        let mut shelves = self.shelves_mut()?;
        let shelf = shelves.entry(object.kind).or_default();
        if !shelf.contains_key(&id) {
            trace!(%id, kind = %object.kind, size = object.size(), "object stored");
            shelf.insert(id, object.data.clone());
        }
        Ok(id)
    }

    fn exists(&self, id: &ContentHash) -> StoreResult<bool> {
        Ok(self.shelves()?.values().any(|shelf| shelf.contains_key(id)))
    }

    fn delete(&self, id: &ContentHash) -> StoreResult<bool> {
        let mut shelves = self.shelves_mut()?;
        Ok(shelves
            .values_mut()
            .any(|shelf| shelf.remove(id).is_some()))
    }
}

impl std::fmt::Debug for InMemoryObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut debug = f.debug_struct("InMemoryObjectStore");
        for kind in [ObjectKind::Blob, ObjectKind::Tree, ObjectKind::Commit] {
            if let Ok(count) = self.count(kind) {
                debug.field(&kind.to_string(), &count);
            }
        }
        debug.finish()
    }
}
