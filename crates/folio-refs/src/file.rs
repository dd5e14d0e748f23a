//! File-backed reference store.
//!
//! Layout, relative to the repository root:
//!
//! ```text
//! HEAD                  "ref: refs/heads/main"
//! refs/heads/main       hex commit hash
//! refs/heads/feature/x  hex commit hash
//! ```
//!
//! Every write goes through a temporary file and a rename. Writers hold an
//! exclusive OS-level lock on `refs.lock` for the read and the rename, so
//! compare-and-swap is serialized across every store and process sharing a
//! root, not just within one handle.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use folio_types::ContentHash;
use fs2::FileExt;
use tracing::debug;
use walkdir::WalkDir;

use crate::error::{RefError, Result};
use crate::names::{branch_from_ref_name, validate_branch_name};
use crate::traits::RefStore;
use crate::types::Head;

const HEAD_FILE: &str = "HEAD";
const SYMBOLIC_PREFIX: &str = "ref: refs/heads/";
const LOCK_FILE: &str = "refs.lock";

/// Exclusive advisory lock on the root's `refs.lock`.
///
/// `flock` locks belong to the open file description, so two guards taken
/// through separate opens exclude each other even inside one process. The
/// lock goes away with the file handle.
struct RefLock {
    _file: File,
}

impl RefLock {
    fn acquire(root: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(root.join(LOCK_FILE))?;
        FileExt::lock_exclusive(&file)?;
        Ok(Self { _file: file })
    }
}

/// A [`RefStore`] keeping one file per ref below a repository root.
#[derive(Debug)]
pub struct FileRefStore {
    root: PathBuf,
}

impl FileRefStore {
    /// Open (or create) the ref layout below `root`.
    pub fn open(root: &Path) -> Result<Self> {
        fs::create_dir_all(root.join("refs").join("heads"))?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    fn ref_path(&self, name: &str) -> PathBuf {
        name.split('/')
            .fold(self.root.clone(), |path, component| path.join(component))
    }

    fn write_atomic(&self, path: &Path, contents: &str) -> Result<()> {
        let dir = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(contents.as_bytes())?;
        tmp.persist(path).map_err(|e| RefError::Io(e.error))?;
        Ok(())
    }

    fn read_hash_file(&self, name: &str, path: &Path) -> Result<Option<ContentHash>> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        ContentHash::from_hex(text.trim())
            .map(Some)
            .map_err(|e| RefError::Corrupt {
                name: name.to_string(),
                reason: e.to_string(),
            })
    }
}

impl RefStore for FileRefStore {
    fn read_ref(&self, name: &str) -> Result<Option<ContentHash>> {
        self.read_hash_file(name, &self.ref_path(name))
    }

    fn compare_and_swap(
        &self,
        name: &str,
        expected: Option<ContentHash>,
        new: ContentHash,
    ) -> Result<bool> {
        if let Some(branch) = branch_from_ref_name(name) {
            validate_branch_name(branch)?;
        }
        let _lock = RefLock::acquire(&self.root)?;
        let path = self.ref_path(name);
        let current = self.read_hash_file(name, &path)?;
        if current != expected {
            debug!(name, ?current, ?expected, "ref moved, compare-and-swap refused");
            return Ok(false);
        }
        self.write_atomic(&path, &format!("{}\n", new.to_hex()))?;
        debug!(name, tip = %new.short_hex(), "ref updated");
        Ok(true)
    }

    fn delete_ref(&self, name: &str) -> Result<bool> {
        let _lock = RefLock::acquire(&self.root)?;
        if let (Some(Head::Symbolic(current)), Some(branch)) =
            (self.head()?, branch_from_ref_name(name))
        {
            if current == branch {
                return Err(RefError::DeleteCurrentBranch {
                    name: branch.to_string(),
                });
            }
        }
        match fs::remove_file(self.ref_path(name)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn list_refs(&self, prefix: &str) -> Result<Vec<(String, ContentHash)>> {
        let refs_dir = self.root.join("refs");
        let mut out = Vec::new();
        for entry in WalkDir::new(&refs_dir).sort_by_file_name() {
            let entry = entry.map_err(|e| RefError::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&self.root) else {
                continue;
            };
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            // Leftover temp files from an interrupted write are not refs.
            if name.rsplit('/').next().is_some_and(|leaf| leaf.starts_with(".tmp")) {
                continue;
            }
            if !name.starts_with(prefix) {
                continue;
            }
            if let Some(hash) = self.read_hash_file(&name, entry.path())? {
                out.push((name, hash));
            }
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }

    fn head(&self) -> Result<Option<Head>> {
        let text = match fs::read_to_string(self.root.join(HEAD_FILE)) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let text = text.trim();
        if let Some(branch) = text.strip_prefix(SYMBOLIC_PREFIX) {
            return Ok(Some(Head::Symbolic(branch.to_string())));
        }
        ContentHash::from_hex(text)
            .map(|hash| Some(Head::Detached(hash)))
            .map_err(|e| RefError::Corrupt {
                name: HEAD_FILE.to_string(),
                reason: e.to_string(),
            })
    }

    fn set_head(&self, branch: &str) -> Result<()> {
        validate_branch_name(branch)?;
        let _lock = RefLock::acquire(&self.root)?;
        self.write_atomic(
            &self.root.join(HEAD_FILE),
            &format!("{SYMBOLIC_PREFIX}{branch}\n"),
        )
    }
}
