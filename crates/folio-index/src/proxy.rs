//! Read-only dotted-path access to mapping-like values.

use serde_json::{Map, Value};

use crate::error::{IndexError, IndexResult};

/// Values that may expose a JSON object view.
pub trait AsMapping {
    fn as_mapping(&self) -> Option<&Map<String, Value>>;
}

impl AsMapping for Value {
    fn as_mapping(&self) -> Option<&Map<String, Value>> {
        self.as_object()
    }
}

impl AsMapping for Map<String, Value> {
    fn as_mapping(&self) -> Option<&Map<String, Value>> {
        Some(self)
    }
}

/// Read-only view over a mapping where `get("a.b.c")` walks nested objects.
///
/// Iteration, length and membership only see the top level.
#[derive(Debug, Clone, Copy)]
pub struct KeyProxy<'p> {
    map: &'p Map<String, Value>,
}

impl<'p> KeyProxy<'p> {
    pub fn new(map: &'p Map<String, Value>) -> Self {
        Self { map }
    }

    /// Resolve a dotted key one segment at a time. Fails at the first
    /// segment that is missing or whose parent is not an object.
    pub fn get(&self, key: &str) -> IndexResult<&'p Value> {
        let mut segments = key.split('.');
        let not_found = |segment: &str| IndexError::KeyNotFound {
            key: key.to_string(),
            segment: segment.to_string(),
        };

        let first = segments.next().unwrap_or(key);
        let mut current = self.map.get(first).ok_or_else(|| not_found(first))?;
        for segment in segments {
            current = current
                .as_object()
                .and_then(|object| object.get(segment))
                .ok_or_else(|| not_found(segment))?;
        }
        Ok(current)
    }

    pub fn keys(&self) -> impl Iterator<Item = &'p String> + 'p {
        self.map.keys()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.map.contains_key(key)
    }

    pub fn inner(&self) -> &'p Map<String, Value> {
        self.map
    }
}

/// What a key mapper sees: a [`KeyProxy`] for mapping-like values, the raw
/// value otherwise.
#[derive(Debug)]
pub enum Proxied<'p, V> {
    Mapping(KeyProxy<'p>),
    Raw(&'p V),
}

impl<V> Clone for Proxied<'_, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<V> Copy for Proxied<'_, V> {}

impl<'p, V: AsMapping> Proxied<'p, V> {
    pub fn of(value: &'p V) -> Self {
        match value.as_mapping() {
            Some(map) => Proxied::Mapping(KeyProxy::new(map)),
            None => Proxied::Raw(value),
        }
    }
}

impl<'p, V> Proxied<'p, V> {
    pub fn as_proxy(&self) -> Option<KeyProxy<'p>> {
        match self {
            Proxied::Mapping(proxy) => Some(*proxy),
            Proxied::Raw(_) => None,
        }
    }

    /// Swap the raw side for another view of the same value.
    pub fn map_raw<W>(self, f: impl FnOnce(&'p V) -> &'p W) -> Proxied<'p, W> {
        match self {
            Proxied::Mapping(proxy) => Proxied::Mapping(proxy),
            Proxied::Raw(value) => Proxied::Raw(f(value)),
        }
    }
}
