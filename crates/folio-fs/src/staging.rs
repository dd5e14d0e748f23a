//! Flattened staging area and tree construction.
//!
//! A workspace holds its whole branch as a flat map from path to [`Staged`]
//! entry. Directories are explicit entries so that empty directories survive
//! a commit. The root directory is implicit and never appears in the map.

use std::collections::BTreeMap;

use folio_store::{EntryMode, ObjectStore, Tree, TreeEntry};
use folio_types::ContentHash;

use crate::error::FsResult;
use crate::path::{join, parent};

/// A staged path: a file with its blob id, or a directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Staged {
    File(ContentHash),
    Dir,
}

impl Staged {
    pub fn is_dir(&self) -> bool {
        matches!(self, Staged::Dir)
    }
}

/// Path → entry for every file and directory below the root.
pub type StagingMap = BTreeMap<String, Staged>;

/// Read the tree `root` and all its subtrees into a flat map.
pub fn flatten(store: &dyn ObjectStore, root: &ContentHash) -> FsResult<StagingMap> {
    let mut out = StagingMap::new();
    flatten_into(store, root, "", &mut out)?;
    Ok(out)
}

fn flatten_into(
    store: &dyn ObjectStore,
    tree_id: &ContentHash,
    dir: &str,
    out: &mut StagingMap,
) -> FsResult<()> {
    let tree = Tree::from_stored_object(&store.require(tree_id)?)?;
    for entry in tree.entries {
        let path = join(dir, &entry.name);
        match entry.mode {
            EntryMode::File => {
                out.insert(path, Staged::File(entry.id));
            }
            EntryMode::Directory => {
                out.insert(path.clone(), Staged::Dir);
                flatten_into(store, &entry.id, &path, out)?;
            }
        }
    }
    Ok(())
}

/// Builds nested tree objects from a flat staging map.
pub struct TreeBuilder<'m> {
    children: BTreeMap<&'m str, Vec<(&'m str, Staged)>>,
}

impl<'m> TreeBuilder<'m> {
    pub fn new(map: &'m StagingMap) -> Self {
        let mut children: BTreeMap<&str, Vec<(&str, Staged)>> = BTreeMap::new();
        for (path, staged) in map {
            if let Some(dir) = parent(path) {
                children.entry(dir).or_default().push((path.as_str(), *staged));
            }
        }
        Self { children }
    }

    /// Write every tree below `dir` and return the id of `dir`'s tree.
    pub fn write(&self, store: &dyn ObjectStore, dir: &str) -> FsResult<ContentHash> {
        self.build(dir, Some(store))
    }

    /// Id the tree for `dir` would have, without writing anything.
    pub fn compute(&self, dir: &str) -> FsResult<ContentHash> {
        self.build(dir, None)
    }

    fn build(&self, dir: &str, store: Option<&dyn ObjectStore>) -> FsResult<ContentHash> {
        let mut entries = Vec::new();
        for (path, staged) in self.children.get(dir).into_iter().flatten() {
            let name = crate::path::file_name(path);
            let entry = match staged {
                Staged::File(id) => TreeEntry::new(EntryMode::File, name, *id),
                Staged::Dir => TreeEntry::new(EntryMode::Directory, name, self.build(path, store)?),
            };
            entries.push(entry);
        }
        let stored = Tree::new(entries).to_stored_object()?;
        match store {
            Some(store) => Ok(store.write(&stored)?),
            None => Ok(stored.compute_id()),
        }
    }
}
