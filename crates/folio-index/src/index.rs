//! The [`Index`] capability and its container variant.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::dict::DictIndex;
use crate::error::{IndexError, IndexResult};
use crate::ext::Extensions;
use crate::hash::HashIndex;
use crate::keyed::KeyedHashIndex;

/// A lookup result: a content hash in hex for forward hash indexes, the
/// source key for inverse ones, the stored value for dict indexes.
pub type Match = String;

/// Any index a container can own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Index {
    Container(ContainerIndex),
    Dict(DictIndex),
    Hash(HashIndex),
    Keyed(KeyedHashIndex),
}

/// Named subindexes, kept in name order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerIndex {
    #[serde(default)]
    pub children: BTreeMap<String, Index>,
}

impl ContainerIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_child(mut self, name: impl Into<String>, index: Index) -> Self {
        self.children.insert(name.into(), index);
        self
    }

    /// Without a subindex, concatenate every child's matches in child
    /// order. With one, delegate to exactly that child.
    pub fn find(&self, key: &str, subindex: Option<&str>) -> IndexResult<Vec<Match>> {
        match subindex {
            Some(name) => self
                .children
                .get(name)
                .ok_or_else(|| IndexError::NoSuchSubindex(name.to_string()))?
                .find(key, None),
            None => {
                let mut found = Vec::new();
                for child in self.children.values() {
                    found.extend(child.find(key, None)?);
                }
                Ok(found)
            }
        }
    }
}

impl Index {
    pub fn kind(&self) -> &'static str {
        match self {
            Index::Container(_) => "container",
            Index::Dict(_) => "dict",
            Index::Hash(_) => "hash",
            Index::Keyed(_) => "keyed",
        }
    }

    /// All matches for `key`. Leaf indexes ignore `subindex`.
    pub fn find(&self, key: &str, subindex: Option<&str>) -> IndexResult<Vec<Match>> {
        match self {
            Index::Container(container) => container.find(key, subindex),
            Index::Dict(dict) => Ok(dict.find(key)),
            Index::Hash(hash) => Ok(hash.find(key)),
            Index::Keyed(keyed) => Ok(keyed.index.find(key)),
        }
    }

    pub fn find_first(&self, key: &str, subindex: Option<&str>) -> IndexResult<Option<Match>> {
        Ok(self.find(key, subindex)?.into_iter().next())
    }

    /// Check consistency; container indexes check every child.
    pub fn validate<V>(&self, extensions: &Extensions<V>) -> IndexResult<()> {
        match self {
            Index::Container(container) => container
                .children
                .values()
                .try_for_each(|child| child.validate(extensions)),
            Index::Dict(dict) => match &dict.hook {
                Some(hook) => extensions.dict_hook(hook)?.validate(dict),
                None => Ok(()),
            },
            Index::Hash(hash) => hash.validate(),
            Index::Keyed(keyed) => keyed.index.validate(),
        }
    }

    /// The hash index at the core of a hash or keyed index.
    pub fn as_hash(&self) -> Option<&HashIndex> {
        match self {
            Index::Hash(hash) => Some(hash),
            Index::Keyed(keyed) => Some(&keyed.index),
            _ => None,
        }
    }

    pub fn as_hash_mut(&mut self) -> Option<&mut HashIndex> {
        match self {
            Index::Hash(hash) => Some(hash),
            Index::Keyed(keyed) => Some(&mut keyed.index),
            _ => None,
        }
    }

    /// Follow `subpath` through container indexes.
    pub fn locate(&self, subpath: &[String]) -> Option<&Index> {
        match subpath.split_first() {
            None => Some(self),
            Some((head, rest)) => match self {
                Index::Container(container) => container.children.get(head)?.locate(rest),
                _ => None,
            },
        }
    }

    pub fn locate_mut(&mut self, subpath: &[String]) -> Option<&mut Index> {
        match subpath.split_first() {
            None => Some(self),
            Some((head, rest)) => match self {
                Index::Container(container) => container.children.get_mut(head)?.locate_mut(rest),
                _ => None,
            },
        }
    }

    /// Every named hash or keyed index below (and including) this one, with
    /// its subpath.
    pub fn named(&self) -> Vec<(String, Vec<String>)> {
        let mut out = Vec::new();
        self.collect_named(&mut Vec::new(), &mut out);
        out
    }

    fn collect_named(&self, prefix: &mut Vec<String>, out: &mut Vec<(String, Vec<String>)>) {
        match self {
            Index::Container(container) => {
                for (name, child) in &container.children {
                    prefix.push(name.clone());
                    child.collect_named(prefix, out);
                    prefix.pop();
                }
            }
            Index::Hash(_) | Index::Keyed(_) => {
                if let Some(name) = self.as_hash().and_then(|h| h.name.clone()) {
                    out.push((name, prefix.clone()));
                }
            }
            Index::Dict(_) => {}
        }
    }
}

impl From<HashIndex> for Index {
    fn from(index: HashIndex) -> Self {
        Index::Hash(index)
    }
}

impl From<KeyedHashIndex> for Index {
    fn from(index: KeyedHashIndex) -> Self {
        Index::Keyed(index)
    }
}

impl From<DictIndex> for Index {
    fn from(index: DictIndex) -> Self {
        Index::Dict(index)
    }
}

impl From<ContainerIndex> for Index {
    fn from(index: ContainerIndex) -> Self {
        Index::Container(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn dict(pairs: &[(&str, &str)]) -> Index {
        let mut index = DictIndex::new();
        for (k, v) in pairs {
            index.insert(*k, vec![v.to_string()]);
        }
        index.into()
    }

    fn fanout() -> Index {
        ContainerIndex::new()
            .with_child("b", dict(&[("k", "from-b")]))
            .with_child("a", dict(&[("k", "from-a"), ("only-a", "x")]))
            .into()
    }

    #[test]
    fn container_concatenates_in_name_order() {
        let index = fanout();
        assert_eq!(index.find("k", None).unwrap(), vec!["from-a", "from-b"]);
        assert_eq!(index.find_first("k", None).unwrap().as_deref(), Some("from-a"));
        assert!(index.find("nothing", None).unwrap().is_empty());
    }

    #[test]
    fn container_delegates_to_named_child() {
        let index = fanout();
        assert_eq!(index.find("k", Some("b")).unwrap(), vec!["from-b"]);
        assert_eq!(
            index.find("k", Some("zzz")).unwrap_err(),
            IndexError::NoSuchSubindex("zzz".into())
        );
    }

    #[test]
    fn leaves_ignore_subindex() {
        let index = dict(&[("k", "v")]);
        assert_eq!(index.find("k", Some("anything")).unwrap(), vec!["v"]);
    }

    #[test]
    fn duplicates_are_preserved() {
        let index: Index = ContainerIndex::new()
            .with_child("one", dict(&[("k", "same")]))
            .with_child("two", dict(&[("k", "same")]))
            .into();
        assert_eq!(index.find("k", None).unwrap(), vec!["same", "same"]);
    }

    #[test]
    fn named_indexes_are_collected_with_subpaths() {
        let index: Index = ContainerIndex::new()
            .with_child("by_hash", HashIndex::new().with_name("parent").into())
            .with_child(
                "nested",
                ContainerIndex::new()
                    .with_child("keyed", KeyedHashIndex::new(HashIndex::new().with_name("child")).into())
                    .with_child("anon", HashIndex::new().into())
                    .into(),
            )
            .into();
        assert_eq!(
            index.named(),
            vec![
                ("parent".to_string(), vec!["by_hash".to_string()]),
                ("child".to_string(), vec!["nested".to_string(), "keyed".to_string()]),
            ]
        );
        assert!(index
            .locate(&["nested".into(), "keyed".into()])
            .and_then(Index::as_hash)
            .is_some());
        assert!(index.locate(&["by_hash".into(), "deeper".into()]).is_none());
    }

    #[test]
    fn validate_reaches_every_child() {
        let mut bad = HashIndex::new();
        bad.records.insert("k".into(), "garbage".into());
        let index: Index = ContainerIndex::new()
            .with_child("ok", HashIndex::new().into())
            .with_child("bad", bad.into())
            .into();
        assert!(index.validate(&Extensions::<Value>::new()).is_err());
    }

    #[test]
    fn unknown_dict_hook_fails_validation() {
        let index: Index = DictIndex::new().with_hook("missing").into();
        assert!(matches!(
            index.validate(&Extensions::<Value>::new()),
            Err(IndexError::Configuration(_))
        ));
    }

    #[test]
    fn serialized_form_is_tagged() {
        let index: Index = HashIndex::new().with_name("n").into();
        let json = serde_json::to_value(&index).unwrap();
        assert_eq!(json["kind"], "hash");
        assert_eq!(json["name"], "n");
        let back: Index = serde_json::from_value(json).unwrap();
        assert_eq!(back, index);
    }
}
