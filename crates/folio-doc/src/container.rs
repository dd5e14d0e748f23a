//! Containers: the directories of the document tree.
//!
//! A container at path `p` is stored as the directory `p` holding
//! `__folder__.json` (entry names, entry kinds and the container's index)
//! plus one `<name>.json` per document and one subdirectory per child
//! container. Changes are buffered in memory and written by
//! [`Container::flush`].

use std::collections::BTreeMap;

use folio_fs::path;
use folio_index::{Index, SourceItem};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::codec::{decode, encode, DOC_SUFFIX, FOLDER_FILE};
use crate::error::{DocError, DocResult};
use crate::node::{Node, NodeKind};
use crate::store::DocStore;

/// Buffered state of one container entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Matches what was last flushed or loaded.
    Present,
    /// Needs to be written on the next flush.
    Modified,
    /// Deleted; removed from the store on every flush until purged.
    Removed,
}

#[derive(Debug, Clone, PartialEq)]
struct Entry {
    state: EntryState,
    node: Node,
}

/// Contents of `__folder__.json`.
#[derive(Debug, Serialize, Deserialize)]
struct FolderRecord {
    entries: BTreeMap<String, NodeKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    index: Option<Index>,
}

/// Check a name for use as a container entry.
pub fn validate_name(name: &str) -> DocResult<()> {
    let reason = if name.is_empty() {
        "empty name"
    } else if name == "." || name == ".." {
        "relative name"
    } else if name.contains('/') {
        "names cannot contain '/'"
    } else if name.ends_with(DOC_SUFFIX) {
        "names cannot end with the document suffix"
    } else {
        return Ok(());
    };
    Err(DocError::InvalidName {
        name: name.to_string(),
        reason: reason.to_string(),
    })
}

/// A name-ordered mapping of documents and containers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Container {
    path: String,
    entries: BTreeMap<String, Entry>,
    index: Option<Index>,
    /// The folder file needs rewriting.
    dirty: bool,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resource path; the root container's is `""`.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// `true` if the next flush would write or remove anything.
    pub fn needs_flush(&self) -> bool {
        self.dirty
            || self.entries.values().any(|entry| match (&entry.state, &entry.node) {
                (EntryState::Present, Node::Container(child)) => child.needs_flush(),
                (EntryState::Present, Node::Document(_)) => false,
                _ => true,
            })
    }

    // ---------------------------------------------------------------
    // Mapping access
    // ---------------------------------------------------------------

    pub fn get(&self, name: &str) -> Option<&Node> {
        self.entries
            .get(name)
            .filter(|entry| entry.state != EntryState::Removed)
            .map(|entry| &entry.node)
    }

    /// Mutable access to an entry, which is marked modified.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Node> {
        let entry = self
            .entries
            .get_mut(name)
            .filter(|entry| entry.state != EntryState::Removed)?;
        entry.state = EntryState::Modified;
        Some(&mut entry.node)
    }

    pub fn entry_state(&self, name: &str) -> Option<EntryState> {
        self.entries.get(name).map(|entry| entry.state)
    }

    pub fn contains_key(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Live entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Node)> {
        self.entries
            .iter()
            .filter(|(_, entry)| entry.state != EntryState::Removed)
            .map(|(name, entry)| (name.as_str(), &entry.node))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.iter().map(|(name, _)| name)
    }

    /// Insert or replace an entry, returning the live entry it replaced.
    ///
    /// The node is attached below this container: it and everything in it
    /// are given resource paths and will be written on the next flush.
    pub fn insert(&mut self, name: &str, node: impl Into<Node>) -> DocResult<Option<Node>> {
        validate_name(name)?;
        let mut node = node.into();
        if let Node::Container(child) = &mut node {
            child.attach(path::join(&self.path, name));
            child.mark_all_dirty();
        }
        let kind = node.kind();
        let previous = self.entries.insert(
            name.to_string(),
            Entry {
                state: EntryState::Modified,
                node,
            },
        );
        let replaced = match previous {
            Some(entry) if entry.state != EntryState::Removed => {
                if entry.node.kind() != kind {
                    self.dirty = true;
                }
                Some(entry.node)
            }
            _ => {
                self.dirty = true;
                None
            }
        };
        debug!(container = %self.path, name, kind = ?kind, "entry set");
        Ok(replaced)
    }

    /// Mark an entry removed. Returns `false` if there was no live entry.
    pub fn remove(&mut self, name: &str) -> bool {
        match self.entries.get_mut(name) {
            Some(entry) if entry.state != EntryState::Removed => {
                entry.state = EntryState::Removed;
                self.dirty = true;
                debug!(container = %self.path, name, "entry removed");
                true
            }
            _ => false,
        }
    }

    // ---------------------------------------------------------------
    // Index
    // ---------------------------------------------------------------

    pub fn index(&self) -> Option<&Index> {
        self.index.as_ref()
    }

    /// Mutable access to the index; the folder file will be rewritten.
    pub fn index_mut(&mut self) -> Option<&mut Index> {
        if self.index.is_some() {
            self.dirty = true;
        }
        self.index.as_mut()
    }

    pub fn set_index(&mut self, index: Option<Index>) -> Option<Index> {
        self.dirty = true;
        std::mem::replace(&mut self.index, index)
    }

    /// The live items of this container, as an index rebuild sees them.
    pub fn snapshot(&self) -> Vec<SourceItem<'_, Node>> {
        self.iter()
            .map(|(name, node)| SourceItem {
                key: name,
                value: node,
                path: path::join(&self.path, name),
            })
            .collect()
    }

    // ---------------------------------------------------------------
    // Tree navigation
    // ---------------------------------------------------------------

    /// The live node at a path relative to this container.
    pub fn node_at(&self, relative: &str) -> Option<&Node> {
        let (dir, name) = match relative.rsplit_once('/') {
            Some((dir, name)) => (self.container_at(dir)?, name),
            None => (self, relative),
        };
        dir.get(name)
    }

    /// The live container at a path relative to this one; `""` is `self`.
    pub fn container_at(&self, relative: &str) -> Option<&Container> {
        let mut current = self;
        for name in relative.split('/').filter(|s| !s.is_empty()) {
            current = current.get(name)?.as_container()?;
        }
        Some(current)
    }

    /// Like [`container_at`](Self::container_at) without marking anything
    /// modified on the way down.
    pub fn container_at_mut(&mut self, relative: &str) -> Option<&mut Container> {
        let mut current = self;
        for name in relative.split('/').filter(|s| !s.is_empty()) {
            current = match current.entries.get_mut(name) {
                Some(Entry {
                    state: EntryState::Present | EntryState::Modified,
                    node: Node::Container(child),
                }) => child,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Visit this container and every live container below it, parents
    /// first.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a Container)) {
        visit(self);
        for (_, node) in self.iter() {
            if let Node::Container(child) = node {
                child.walk(visit);
            }
        }
    }

    // ---------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------

    /// Give this container and all of its descendants their resource paths.
    pub fn attach(&mut self, path: String) {
        for (name, entry) in self.entries.iter_mut() {
            if let Node::Container(child) = &mut entry.node {
                child.attach(path::join(&path, name));
            }
        }
        self.path = path;
    }

    /// Mark everything live in this subtree as needing a write.
    pub fn mark_all_dirty(&mut self) {
        self.dirty = true;
        for entry in self.entries.values_mut() {
            if entry.state == EntryState::Removed {
                continue;
            }
            entry.state = EntryState::Modified;
            if let Node::Container(child) = &mut entry.node {
                child.mark_all_dirty();
            }
        }
    }

    /// Forget removed entries. Called once a removal is durable.
    pub fn purge_removed(&mut self) {
        self.entries
            .retain(|_, entry| entry.state != EntryState::Removed);
        for entry in self.entries.values_mut() {
            if let Node::Container(child) = &mut entry.node {
                child.purge_removed();
            }
        }
    }

    /// Write buffered changes to `store`.
    ///
    /// Removals are re-issued on every flush until purged and tolerate the
    /// target already being gone, so flushing repeatedly is safe.
    pub fn flush(&mut self, store: &mut DocStore) -> DocResult<()> {
        if !self.path.is_empty() && !store.exists(&self.path)? {
            store.mkdir(&self.path)?;
        }
        for (name, entry) in self.entries.iter_mut() {
            let child_path = path::join(&self.path, name);
            let doc_file = format!("{child_path}{DOC_SUFFIX}");
            match (entry.state, &mut entry.node) {
                (EntryState::Removed, Node::Container(_)) => {
                    store.remove_dir(&child_path)?;
                }
                (EntryState::Removed, Node::Document(_)) => {
                    store.remove_file(&doc_file)?;
                }
                (state, Node::Container(child)) => {
                    if state == EntryState::Modified && store.exists(&doc_file)? {
                        store.remove_file(&doc_file)?;
                    }
                    child.flush(store)?;
                    entry.state = EntryState::Present;
                }
                (EntryState::Modified, Node::Document(doc)) => {
                    if store.is_dir(&child_path)? {
                        store.remove_dir(&child_path)?;
                    }
                    store.write(&doc_file, &encode(doc, &doc_file)?)?;
                    entry.state = EntryState::Present;
                }
                (EntryState::Present, Node::Document(_)) => {}
            }
        }
        if self.dirty {
            let folder_file = path::join(&self.path, FOLDER_FILE);
            let record = FolderRecord {
                entries: self
                    .iter()
                    .map(|(name, node)| (name.to_string(), node.kind()))
                    .collect(),
                index: self.index.clone(),
            };
            store.write(&folder_file, &encode(&record, &folder_file)?)?;
            self.dirty = false;
            debug!(container = %self.path, entries = record.entries.len(), "folder written");
        }
        Ok(())
    }

    /// Load the whole tree stored in `store`. A store without a root folder
    /// file loads as an empty root.
    pub fn load(store: &DocStore) -> DocResult<Container> {
        Self::load_at(store, "")
    }

    fn load_at(store: &DocStore, dir: &str) -> DocResult<Container> {
        let folder_file = path::join(dir, FOLDER_FILE);
        if !store.exists(&folder_file)? {
            if dir.is_empty() {
                return Ok(Container::new());
            }
            return Err(DocError::NotFound(folder_file));
        }
        let record: FolderRecord = decode(&store.read(&folder_file)?, &folder_file)?;
        let mut entries = BTreeMap::new();
        for (name, kind) in record.entries {
            let child_path = path::join(dir, &name);
            let node = match kind {
                NodeKind::Document => {
                    let file = format!("{child_path}{DOC_SUFFIX}");
                    Node::Document(decode(&store.read(&file)?, &file)?)
                }
                NodeKind::Container => Node::Container(Self::load_at(store, &child_path)?),
            };
            entries.insert(
                name,
                Entry {
                    state: EntryState::Present,
                    node,
                },
            );
        }
        Ok(Container {
            path: dir.to_string(),
            entries,
            index: record.index,
            dirty: false,
        })
    }
}
