//! Lazy key remapping over a key/value sequence.

use std::collections::HashMap;
use std::hash::Hash;

use crate::proxy::{AsMapping, Proxied};

/// Iterator that remaps the keys of `(key, &value)` pairs through a mapper.
///
/// Each pull draws source pairs until the mapper returns a key, caches
/// `new key -> value`, and yields the new key. Pairs for which the mapper
/// returns `None` are skipped. The cache only holds pairs already yielded.
pub struct LazyRemap<'a, I, F, K, V, N>
where
    I: Iterator<Item = (K, &'a V)>,
    F: FnMut(&K, Proxied<'a, V>) -> Option<N>,
    V: 'a,
{
    source: I,
    mapper: F,
    cache: HashMap<N, &'a V>,
}

impl<'a, I, F, K, V, N> LazyRemap<'a, I, F, K, V, N>
where
    I: Iterator<Item = (K, &'a V)>,
    F: FnMut(&K, Proxied<'a, V>) -> Option<N>,
    V: AsMapping + 'a,
    N: Eq + Hash + Clone,
{
    pub fn new(source: I, mapper: F) -> Self {
        Self {
            source,
            mapper,
            cache: HashMap::new(),
        }
    }

    /// Value whose remapped key is `key`, if it has been yielded.
    pub fn get(&self, key: &N) -> Option<&'a V> {
        self.cache.get(key).copied()
    }

    /// Number of pairs yielded so far.
    pub fn yielded(&self) -> usize {
        self.cache.len()
    }
}

impl<'a, I, F, K, V, N> Iterator for LazyRemap<'a, I, F, K, V, N>
where
    I: Iterator<Item = (K, &'a V)>,
    F: FnMut(&K, Proxied<'a, V>) -> Option<N>,
    V: AsMapping + 'a,
    N: Eq + Hash + Clone,
{
    type Item = N;

    fn next(&mut self) -> Option<N> {
        loop {
            let (key, value) = self.source.next()?;
            if let Some(new_key) = (self.mapper)(&key, Proxied::of(value)) {
                self.cache.insert(new_key.clone(), value);
                return Some(new_key);
            }
        }
    }
}
