//! Loose-object store on the local filesystem.
//!
//! Layout, relative to the store root:
//!
//! ```text
//! objects/
//!   ab/
//!     cdef0123…   (bincode-framed StoredObject)
//! ```
//!
//! Objects are written to a temporary file in the fan-out directory and
//! renamed into place, so readers never observe a torn object.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use folio_types::ContentHash;
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::object::StoredObject;
use crate::traits::ObjectStore;

/// Object store keeping one file per object under `<root>/objects`.
#[derive(Debug)]
pub struct FsObjectStore {
    objects_dir: PathBuf,
}

impl FsObjectStore {
    /// Open (or create) the object directory below `root`.
    pub fn open(root: &Path) -> StoreResult<Self> {
        let objects_dir = root.join("objects");
        fs::create_dir_all(&objects_dir)?;
        Ok(Self { objects_dir })
    }

    fn object_path(&self, id: &ContentHash) -> PathBuf {
        let (dir, rest) = id.fanout();
        self.objects_dir.join(dir).join(rest)
    }
}

impl ObjectStore for FsObjectStore {
    fn read(&self, id: &ContentHash) -> StoreResult<Option<StoredObject>> {
        let path = self.object_path(id);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let object: StoredObject =
            bincode::deserialize(&bytes).map_err(|e| StoreError::CorruptObject {
                id: *id,
                reason: e.to_string(),
            })?;
        let computed = object.compute_id();
        if computed != *id {
            return Err(StoreError::HashMismatch { id: *id, computed });
        }
        Ok(Some(object))
    }

    fn write(&self, object: &StoredObject) -> StoreResult<ContentHash> {
        let id = object.compute_id();
        let path = self.object_path(&id);
        if path.exists() {
            return Ok(id);
        }
        let dir = path
            .parent()
            .ok_or_else(|| StoreError::Serialization(format!("no parent for {}", path.display())))?;
        fs::create_dir_all(dir)?;

        let bytes =
            bincode::serialize(object).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&bytes)?;
        tmp.persist(&path).map_err(|e| StoreError::Io(e.error))?;
        debug!(id = %id.short_hex(), kind = %object.kind, size = object.size(), "object written");
        Ok(id)
    }

    fn exists(&self, id: &ContentHash) -> StoreResult<bool> {
        Ok(self.object_path(id).exists())
    }

    fn delete(&self, id: &ContentHash) -> StoreResult<bool> {
        match fs::remove_file(self.object_path(id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
