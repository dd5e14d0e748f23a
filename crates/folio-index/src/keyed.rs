//! Hash index keyed by a value extracted from each item.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::IndexResult;
use crate::ext::{Extensions, SourceItem};
use crate::hash::HashIndex;
use crate::proxy::{AsMapping, Proxied};
use crate::remap::LazyRemap;

/// Field used by [`KeyMapper::default`].
pub const DEFAULT_KEY_FIELD: &str = "id";

/// How a [`KeyedHashIndex`] derives each item's key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyMapper {
    /// A (dotted) field of mapping-like items. Scalars are stringified;
    /// null, missing or structured values skip the item.
    Field(String),
    /// A closure registered on the database view under this name.
    Registered(String),
}

impl Default for KeyMapper {
    fn default() -> Self {
        KeyMapper::Field(DEFAULT_KEY_FIELD.to_string())
    }
}

/// Stringify the scalar at `path` of a mapping-like value.
pub fn field_key<V>(value: Proxied<'_, V>, path: &str) -> Option<String> {
    match value.as_proxy()?.get(path).ok()? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyedHashIndex {
    pub index: HashIndex,
    #[serde(default)]
    pub mapper: KeyMapper,
}

impl KeyedHashIndex {
    pub fn new(index: HashIndex) -> Self {
        Self {
            index,
            mapper: KeyMapper::default(),
        }
    }

    pub fn with_field(mut self, path: impl Into<String>) -> Self {
        self.mapper = KeyMapper::Field(path.into());
        self
    }

    pub fn with_mapper(mut self, name: impl Into<String>) -> Self {
        self.mapper = KeyMapper::Registered(name.into());
        self
    }

    /// Remap a snapshot to `(derived key, resource path)` pairs.
    pub fn remap<V: AsMapping>(
        &self,
        items: &[SourceItem<'_, V>],
        extensions: &Extensions<V>,
    ) -> IndexResult<Vec<(String, String)>> {
        let registered = match &self.mapper {
            KeyMapper::Registered(name) => Some(extensions.key_mapper(name)?),
            KeyMapper::Field(_) => None,
        };
        let mut remap = LazyRemap::new(items.iter().map(|item| (item.key, item)), |key, proxied| {
            let proxied = proxied.map_raw(|item| item.value);
            match (&self.mapper, registered) {
                (_, Some(f)) => f(*key, proxied),
                (KeyMapper::Field(path), None) => field_key(proxied, path),
                (KeyMapper::Registered(_), None) => None,
            }
        });
        let mut entries = Vec::with_capacity(items.len());
        while let Some(key) = remap.next() {
            if let Some(item) = remap.get(&key) {
                entries.push((key, item.path.clone()));
            }
        }
        debug!(
            items = items.len(),
            mapped = entries.len(),
            "remapped keyed index snapshot"
        );
        Ok(entries)
    }
}

impl<V: AsMapping> AsMapping for SourceItem<'_, V> {
    fn as_mapping(&self) -> Option<&serde_json::Map<String, Value>> {
        self.value.as_mapping()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn items(values: &[(&'static str, Value)]) -> Vec<(&'static str, Value)> {
        values.to_vec()
    }

    fn snapshot<'a>(values: &'a [(&'static str, Value)]) -> Vec<SourceItem<'a, Value>> {
        values
            .iter()
            .map(|(key, value)| SourceItem {
                key,
                value,
                path: format!("people/{key}"),
            })
            .collect()
    }

    #[test]
    fn default_field_is_id() {
        let values = items(&[
            ("a", json!({"id": 1})),
            ("b", json!({"id": null})),
            ("c", json!({"id": "three"})),
            ("d", json!({"name": "no id"})),
        ]);
        let keyed = KeyedHashIndex::new(HashIndex::new());
        let entries = keyed.remap(&snapshot(&values), &Extensions::new()).unwrap();
        assert_eq!(
            entries,
            vec![
                ("1".to_string(), "people/a".to_string()),
                ("three".to_string(), "people/c".to_string()),
            ]
        );
    }

    #[test]
    fn dotted_field() {
        let values = items(&[("a", json!({"meta": {"email": "a@x.org"}}))]);
        let keyed = KeyedHashIndex::new(HashIndex::new()).with_field("meta.email");
        let entries = keyed.remap(&snapshot(&values), &Extensions::new()).unwrap();
        assert_eq!(entries[0].0, "a@x.org");
    }

    #[test]
    fn registered_mapper_sees_original_key() {
        let mut extensions: Extensions<Value> = Extensions::new();
        extensions.register_key_mapper("upper", |key, _| Some(key.to_uppercase()));
        let values = items(&[("a", json!({})), ("b", json!(5))]);
        let keyed = KeyedHashIndex::new(HashIndex::new()).with_mapper("upper");
        let entries = keyed.remap(&snapshot(&values), &extensions).unwrap();
        let keys: Vec<_> = entries.into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["A", "B"]);
    }

    #[test]
    fn unknown_mapper_is_a_configuration_error() {
        let keyed = KeyedHashIndex::new(HashIndex::new()).with_mapper("missing");
        let values = items(&[("a", json!({}))]);
        assert!(matches!(
            keyed.remap(&snapshot(&values), &Extensions::new()),
            Err(crate::error::IndexError::Configuration(_))
        ));
    }

    #[test]
    fn mapper_serializes_by_kind() {
        let keyed = KeyedHashIndex::new(HashIndex::new()).with_field("email");
        let json = serde_json::to_value(&keyed.mapper).unwrap();
        assert_eq!(json, json!({"field": "email"}));
    }
}
