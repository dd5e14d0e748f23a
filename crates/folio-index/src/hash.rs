//! Content-hash index.
//!
//! A [`HashIndex`] maps keys to the content hash of the resource each key
//! names (or, when inverse, hashes back to keys). Records pushed in by
//! supplying subindexes live in named auxiliary namespaces, scanned in
//! creation order when the direct bucket misses.

use std::collections::BTreeMap;

use folio_types::ContentHash;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{IndexError, IndexResult, IndexUpdateError};

/// Answers the path and hash questions a rebuild asks of the store.
pub trait ContentResolver {
    fn is_dir(&self, path: &str) -> IndexResult<bool>;

    /// Content hash of the file or directory at `path`.
    fn content_hash(&self, path: &str) -> IndexResult<ContentHash>;

    /// Suffix appended to a leaf resource's path to name its file.
    fn leaf_suffix(&self) -> &str;
}

/// A named partition of a hash index's records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Namespace {
    pub name: String,
    pub records: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashIndex {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Name of the index this one pushes its records into.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supply: Option<String>,
    #[serde(default)]
    pub inverse: bool,
    #[serde(default)]
    pub clear_before_update: bool,
    #[serde(default)]
    pub records: BTreeMap<String, String>,
    /// Kept as a list so creation order survives persistence.
    #[serde(default)]
    pub auxiliary: Vec<Namespace>,
}

impl HashIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_supply(mut self, target: impl Into<String>) -> Self {
        self.supply = Some(target.into());
        self
    }

    pub fn with_inverse(mut self, inverse: bool) -> Self {
        self.inverse = inverse;
        self
    }

    pub fn with_clear_before_update(mut self, clear: bool) -> Self {
        self.clear_before_update = clear;
        self
    }

    pub fn namespace(&self, name: &str) -> Option<&BTreeMap<String, String>> {
        self.auxiliary
            .iter()
            .find(|ns| ns.name == name)
            .map(|ns| &ns.records)
    }

    fn namespace_mut(&mut self, name: &str) -> &mut BTreeMap<String, String> {
        let position = match self.auxiliary.iter().position(|ns| ns.name == name) {
            Some(position) => position,
            None => {
                self.auxiliary.push(Namespace {
                    name: name.to_string(),
                    records: BTreeMap::new(),
                });
                self.auxiliary.len() - 1
            }
        };
        &mut self.auxiliary[position].records
    }

    /// Direct bucket first, then each namespace in creation order.
    pub fn find(&self, key: &str) -> Vec<String> {
        self.records
            .get(key)
            .or_else(|| self.auxiliary.iter().find_map(|ns| ns.records.get(key)))
            .map(|found| vec![found.clone()])
            .unwrap_or_default()
    }

    /// Rebuild from `(key, resource path)` pairs.
    ///
    /// Records go to the auxiliary `namespace` when given, else the direct
    /// bucket. The whole pass is computed before anything is written, so a
    /// duplicate target key leaves the index untouched.
    pub fn update(
        &mut self,
        entries: &[(String, String)],
        namespace: Option<&str>,
        resolver: &dyn ContentResolver,
    ) -> IndexResult<()> {
        let mut computed = BTreeMap::new();
        for (key, path) in entries {
            let path = if resolver.is_dir(path)? {
                path.clone()
            } else {
                format!("{path}{}", resolver.leaf_suffix())
            };
            let hash = resolver.content_hash(&path)?.to_hex();
            let (target_key, target_value) = if self.inverse {
                (hash, key.clone())
            } else {
                (key.clone(), hash)
            };
            if let Some(first) = computed.get(&target_key) {
                return Err(IndexUpdateError {
                    key: target_key,
                    first: String::clone(first),
                    second: target_value,
                }
                .into());
            }
            computed.insert(target_key, target_value);
        }

        let clear = self.clear_before_update;
        let target = match namespace {
            Some(ns) => self.namespace_mut(ns),
            None => &mut self.records,
        };
        if clear {
            target.clear();
        }
        let written = computed.len();
        target.extend(computed);
        debug!(
            index = self.name.as_deref().unwrap_or("<unnamed>"),
            namespace = namespace.unwrap_or("<direct>"),
            written,
            "hash index updated"
        );
        Ok(())
    }

    /// Hash sides must be valid content hashes; a supplying index must be
    /// named and hold no records of its own.
    pub fn validate(&self) -> IndexResult<()> {
        let label = self.name.clone().unwrap_or_else(|| "<unnamed>".to_string());
        if self.supply.is_some() {
            if self.name.is_none() {
                return Err(IndexError::Configuration(
                    "a supplying index must be named".to_string(),
                ));
            }
            if !self.records.is_empty() || !self.auxiliary.is_empty() {
                return Err(IndexError::Invalid {
                    index: label,
                    reason: "supplying index holds records".to_string(),
                });
            }
        }
        let buckets = std::iter::once(&self.records).chain(self.auxiliary.iter().map(|ns| &ns.records));
        for records in buckets {
            for (key, value) in records {
                let hash = if self.inverse { key } else { value };
                if let Err(e) = hash.parse::<ContentHash>() {
                    return Err(IndexError::Invalid {
                        index: label,
                        reason: format!("record '{key}' -> '{value}': {e}"),
                    });
                }
            }
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::testing::MapResolver;
    use super::*;
    use proptest::prelude::*;

    fn entries(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, p)| (k.to_string(), p.to_string()))
            .collect()
    }

    fn resolver() -> MapResolver {
        MapResolver::default()
            .with_doc("docs/a", "{\"v\": 1}")
            .with_doc("docs/b", "{\"v\": 2}")
            .with_doc("docs/same", "{\"v\": 1}")
    }

    #[test]
    fn forward_lookup_returns_content_hash() {
        let resolver = resolver();
        let mut index = HashIndex::new();
        index
            .update(&entries(&[("a", "docs/a"), ("b", "docs/b")]), None, &resolver)
            .unwrap();

        let expected = ContentHash::of(b"{\"v\": 1}").to_hex();
        assert_eq!(index.find("a"), vec![expected]);
        assert!(index.find("missing").is_empty());
    }

    #[test]
    fn inverse_lookup_returns_key() {
        let resolver = resolver();
        let mut index = HashIndex::new().with_inverse(true);
        index
            .update(&entries(&[("a", "docs/a")]), None, &resolver)
            .unwrap();

        let hash = ContentHash::of(b"{\"v\": 1}").to_hex();
        assert_eq!(index.find(&hash), vec!["a".to_string()]);
    }

    #[test]
    fn duplicate_target_key_aborts_without_writing() {
        let resolver = resolver();
        let mut index = HashIndex::new().with_inverse(true);
        index
            .update(&entries(&[("b", "docs/b")]), None, &resolver)
            .unwrap();
        let before = index.clone();

        let err = index
            .update(&entries(&[("a", "docs/a"), ("same", "docs/same")]), None, &resolver)
            .unwrap_err();
        let hash = ContentHash::of(b"{\"v\": 1}").to_hex();
        assert_eq!(
            err,
            IndexError::Duplicate(IndexUpdateError {
                key: hash,
                first: "a".into(),
                second: "same".into(),
            })
        );
        assert_eq!(index, before);
    }

    #[test]
    fn directories_are_hashed_without_suffix() {
        let mut resolver = resolver();
        resolver.dirs.insert("docs/sub".to_string());
        let mut index = HashIndex::new();
        index
            .update(&entries(&[("sub", "docs/sub")]), None, &resolver)
            .unwrap();
        assert_eq!(
            index.find("sub"),
            vec![ContentHash::of(b"docs/sub").to_hex()]
        );
    }

    #[test]
    fn clear_before_update_replaces_bucket() {
        let resolver = resolver();
        let mut index = HashIndex::new().with_clear_before_update(true);
        index
            .update(&entries(&[("a", "docs/a")]), None, &resolver)
            .unwrap();
        index
            .update(&entries(&[("b", "docs/b")]), None, &resolver)
            .unwrap();
        assert!(index.find("a").is_empty());
        assert_eq!(index.records.len(), 1);
    }

    #[test]
    fn incremental_update_merges() {
        let resolver = resolver();
        let mut index = HashIndex::new();
        index
            .update(&entries(&[("a", "docs/a")]), None, &resolver)
            .unwrap();
        index
            .update(&entries(&[("b", "docs/b")]), None, &resolver)
            .unwrap();
        assert_eq!(index.records.len(), 2);
    }

    #[test]
    fn namespaces_are_scanned_in_creation_order() {
        let resolver = resolver();
        let mut index = HashIndex::new();
        index
            .update(&entries(&[("k", "docs/b")]), Some("zeta"), &resolver)
            .unwrap();
        index
            .update(&entries(&[("k", "docs/a")]), Some("alpha"), &resolver)
            .unwrap();

        assert_eq!(index.find("k"), vec![ContentHash::of(b"{\"v\": 2}").to_hex()]);
        let names: Vec<_> = index.auxiliary.iter().map(|ns| ns.name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }

    #[test]
    fn direct_bucket_wins_over_namespaces() {
        let resolver = resolver();
        let mut index = HashIndex::new();
        index
            .update(&entries(&[("k", "docs/b")]), Some("ns"), &resolver)
            .unwrap();
        index
            .update(&entries(&[("k", "docs/a")]), None, &resolver)
            .unwrap();
        assert_eq!(index.find("k"), vec![ContentHash::of(b"{\"v\": 1}").to_hex()]);
    }

    #[test]
    fn namespace_order_survives_serialization() {
        let resolver = resolver();
        let mut index = HashIndex::new().with_name("parent");
        for ns in ["second", "first", "third"] {
            index
                .update(&entries(&[("k", "docs/a")]), Some(ns), &resolver)
                .unwrap();
        }
        let json = serde_json::to_string(&index).unwrap();
        let back: HashIndex = serde_json::from_str(&json).unwrap();
        let names: Vec<_> = back.auxiliary.iter().map(|ns| ns.name.as_str()).collect();
        assert_eq!(names, vec!["second", "first", "third"]);
    }

    #[test]
    fn validate_checks_hashes_and_supply() {
        let mut index = HashIndex::new();
        index.records.insert("k".into(), "not-a-hash".into());
        assert!(matches!(index.validate(), Err(IndexError::Invalid { .. })));

        let unnamed = HashIndex::new().with_supply("parent");
        assert!(matches!(unnamed.validate(), Err(IndexError::Configuration(_))));

        let mut supplier = HashIndex::new().with_name("child").with_supply("parent");
        supplier.validate().unwrap();
        supplier
            .records
            .insert("k".into(), ContentHash::of(b"x").to_hex());
        assert!(supplier.validate().is_err());
    }

    #[test]
    fn backend_errors_propagate() {
        let resolver = MapResolver::default();
        let mut index = HashIndex::new();
        let err = index
            .update(&entries(&[("a", "nowhere")]), None, &resolver)
            .unwrap_err();
        assert!(matches!(err, IndexError::Backend(_)));
        assert!(index.records.is_empty());
    }

    proptest! {
        #[test]
        fn update_then_find_round_trips(bodies in prop::collection::btree_map("[a-z]{1,6}", "[a-z0-9]{0,12}", 0..12)) {
            let mut resolver = MapResolver::default();
            let mut pairs = Vec::new();
            for (key, body) in &bodies {
                // Unique content per key keeps inverse mode collision free.
                let body = format!("{key}:{body}");
                resolver.files.insert(format!("d/{key}.json"), body.into_bytes());
                pairs.push((key.clone(), format!("d/{key}")));
            }

            let mut index = HashIndex::new();
            index.update(&pairs, None, &resolver).unwrap();
            for (key, path) in &pairs {
                let expected = resolver.content_hash(&format!("{path}.json")).unwrap().to_hex();
                prop_assert_eq!(index.find(key), vec![expected]);
            }

            let mut inverse = HashIndex::new().with_inverse(true);
            inverse.update(&pairs, None, &resolver).unwrap();
            for (key, path) in &pairs {
                let hash = resolver.content_hash(&format!("{path}.json")).unwrap().to_hex();
                prop_assert_eq!(inverse.find(&hash), vec![key.clone()]);
            }
        }

        #[test]
        fn clearing_update_is_idempotent(keys in prop::collection::btree_set("[a-z]{1,4}", 0..8)) {
            let mut resolver = MapResolver::default();
            let mut pairs = Vec::new();
            for key in &keys {
                resolver.files.insert(format!("{key}.json"), key.as_bytes().to_vec());
                pairs.push((key.clone(), key.clone()));
            }
            let mut index = HashIndex::new().with_clear_before_update(true);
            index.update(&pairs, None, &resolver).unwrap();
            let once = index.clone();
            index.update(&pairs, None, &resolver).unwrap();
            prop_assert_eq!(index, once);
        }

        #[test]
        fn duplicates_leave_state_unchanged(keys in prop::collection::btree_set("[a-z]{1,4}", 2..8)) {
            let mut resolver = MapResolver::default();
            resolver.files.insert("shared.json".into(), b"same".to_vec());
            resolver.files.insert("seed.json".into(), b"seed".to_vec());
            let pairs: Vec<_> = keys.iter().map(|k| (k.clone(), "shared".to_string())).collect();

            let mut index = HashIndex::new().with_inverse(true);
            index.update(&[("seed".to_string(), "seed".to_string())], None, &resolver).unwrap();
            let before = index.clone();
            let is_duplicate = matches!(
                index.update(&pairs, None, &resolver),
                Err(IndexError::Duplicate(_))
            );
            prop_assert!(is_duplicate);
            prop_assert_eq!(index, before);
        }
    }
}
