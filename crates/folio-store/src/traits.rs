use folio_types::ContentHash;

use crate::error::StoreResult;
use crate::object::StoredObject;

/// Content-addressed object store.
///
/// All implementations must satisfy these invariants:
/// - Objects are immutable once written; the same data always produces the
///   same id.
/// - Concurrent reads are always safe.
/// - The store never interprets object contents.
/// - All I/O errors are propagated, never silently ignored.
pub trait ObjectStore: Send + Sync {
    /// Read an object by its content hash.
    ///
    /// Returns `Ok(None)` if the object does not exist.
    fn read(&self, id: &ContentHash) -> StoreResult<Option<StoredObject>>;

    /// Write an object and return its content hash. Writing an object that
    /// already exists is a no-op.
    fn write(&self, object: &StoredObject) -> StoreResult<ContentHash>;

    /// Check whether an object exists in the store.
    fn exists(&self, id: &ContentHash) -> StoreResult<bool>;

    /// Delete an object by id. Returns `true` if the object existed.
    ///
    /// Intended for garbage collection only.
    fn delete(&self, id: &ContentHash) -> StoreResult<bool>;

    /// Read an object that must exist.
    fn require(&self, id: &ContentHash) -> StoreResult<StoredObject> {
        self.read(id)?.ok_or(crate::error::StoreError::NotFound(*id))
    }

    /// Write multiple objects and return their ids.
    fn write_batch(&self, objects: &[StoredObject]) -> StoreResult<Vec<ContentHash>> {
        objects.iter().map(|obj| self.write(obj)).collect()
    }
}
