//! Named-index registry owned by a database view.

use std::collections::BTreeMap;
use std::fmt;

use tracing::warn;

use crate::index::Index;

/// Where an index lives: the resource path of the owning container plus the
/// chain of subindex names below the container's root index.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IndexLocation {
    pub container: String,
    pub subpath: Vec<String>,
}

impl IndexLocation {
    pub fn root(container: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            subpath: Vec::new(),
        }
    }

    pub fn child(&self, name: &str) -> Self {
        let mut subpath = self.subpath.clone();
        subpath.push(name.to_string());
        Self {
            container: self.container.clone(),
            subpath,
        }
    }
}

impl fmt::Display for IndexLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.container)?;
        if !self.subpath.is_empty() {
            write!(f, "#{}", self.subpath.join("/"))?;
        }
        Ok(())
    }
}

/// Index name → location, for supply links.
#[derive(Debug, Clone, Default)]
pub struct IndexRegistry {
    by_name: BTreeMap<String, IndexLocation>,
}

impl IndexRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&IndexLocation> {
        self.by_name.get(name)
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.by_name.keys().map(String::as_str)
    }

    /// Register `name`. A name already bound elsewhere is rebound.
    pub fn insert(&mut self, name: impl Into<String>, location: IndexLocation) {
        let name = name.into();
        if let Some(previous) = self.by_name.get(&name) {
            if previous != &location {
                warn!(name = %name, from = %previous, to = %location, "index name rebound");
            }
        }
        self.by_name.insert(name, location);
    }

    /// Register every named index owned by the container at `container`.
    pub fn register(&mut self, container: &str, index: &Index) {
        for (name, subpath) in index.named() {
            self.insert(
                name,
                IndexLocation {
                    container: container.to_string(),
                    subpath,
                },
            );
        }
    }

    /// Drop registrations owned by `container` or anything below it.
    pub fn forget_below(&mut self, container: &str) {
        self.by_name.retain(|_, location| {
            let owned = location.container == container
                || container.is_empty()
                || location
                    .container
                    .strip_prefix(container)
                    .is_some_and(|rest| rest.starts_with('/'));
            !owned
        });
    }

    pub fn clear(&mut self) {
        self.by_name.clear();
    }
}
