//! Application-provided behavior resolved by name: key mappers for keyed
//! hash indexes and hooks for dict indexes.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::dict::DictIndex;
use crate::error::{IndexError, IndexResult};
use crate::proxy::Proxied;

/// One item of the snapshot an index is rebuilt from.
#[derive(Debug)]
pub struct SourceItem<'a, V> {
    /// Name of the item in its container.
    pub key: &'a str,
    pub value: &'a V,
    /// Resource path of the item, without the leaf suffix.
    pub path: String,
}

/// `(original key, proxied value) -> new key`; `None` skips the item.
pub type MapperFn<V> = Arc<dyn Fn(&str, Proxied<'_, V>) -> Option<String> + Send + Sync>;

/// Update and validation behavior for a [`DictIndex`].
pub trait DictHook<V>: Send + Sync {
    /// Compute the new entries from the current index and the snapshot.
    fn update(
        &self,
        current: &DictIndex,
        items: &[SourceItem<'_, V>],
    ) -> IndexResult<BTreeMap<String, Vec<String>>>;

    fn validate(&self, _index: &DictIndex) -> IndexResult<()> {
        Ok(())
    }
}

/// Registry of named mappers and hooks.
pub struct Extensions<V> {
    mappers: HashMap<String, MapperFn<V>>,
    dict_hooks: HashMap<String, Arc<dyn DictHook<V>>>,
}

impl<V> Default for Extensions<V> {
    fn default() -> Self {
        Self {
            mappers: HashMap::new(),
            dict_hooks: HashMap::new(),
        }
    }
}

impl<V> Clone for Extensions<V> {
    fn clone(&self) -> Self {
        Self {
            mappers: self.mappers.clone(),
            dict_hooks: self.dict_hooks.clone(),
        }
    }
}

impl<V> fmt::Debug for Extensions<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut mappers: Vec<_> = self.mappers.keys().collect();
        mappers.sort();
        let mut hooks: Vec<_> = self.dict_hooks.keys().collect();
        hooks.sort();
        f.debug_struct("Extensions")
            .field("mappers", &mappers)
            .field("dict_hooks", &hooks)
            .finish()
    }
}

impl<V> Extensions<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_key_mapper<F>(&mut self, name: impl Into<String>, mapper: F)
    where
        F: Fn(&str, Proxied<'_, V>) -> Option<String> + Send + Sync + 'static,
    {
        self.mappers.insert(name.into(), Arc::new(mapper));
    }

    pub fn register_dict_hook(&mut self, name: impl Into<String>, hook: impl DictHook<V> + 'static) {
        self.dict_hooks.insert(name.into(), Arc::new(hook));
    }

    pub fn key_mapper(&self, name: &str) -> IndexResult<&MapperFn<V>> {
        self.mappers
            .get(name)
            .ok_or_else(|| IndexError::Configuration(format!("no key mapper registered as '{name}'")))
    }

    pub fn dict_hook(&self, name: &str) -> IndexResult<&Arc<dyn DictHook<V>>> {
        self.dict_hooks
            .get(name)
            .ok_or_else(|| IndexError::Configuration(format!("no dict hook registered as '{name}'")))
    }
}
