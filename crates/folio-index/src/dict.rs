//! Application-maintained dictionary index.
//!
//! A [`DictIndex`] holds whatever entries a registered hook computes from the
//! container's items. Folio itself only stores, finds and persists them.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A direct key → matches store whose contents are maintained by an
/// application hook. Without a hook, update and validate do nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DictIndex {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hook: Option<String>,
    #[serde(default)]
    pub entries: BTreeMap<String, Vec<String>>,
}

impl DictIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_hook(mut self, hook: impl Into<String>) -> Self {
        self.hook = Some(hook.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, matches: Vec<String>) {
        self.entries.insert(key.into(), matches);
    }

    pub fn find(&self, key: &str) -> Vec<String> {
        self.entries.get(key).cloned().unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_returns_stored_list() {
        let mut index = DictIndex::new();
        index.insert("color", vec!["red".into(), "blue".into()]);
        assert_eq!(index.find("color"), vec!["red", "blue"]);
        assert!(index.find("size").is_empty());
    }

    #[test]
    fn hookless_index_serializes_compactly() {
        let json = serde_json::to_value(DictIndex::new()).unwrap();
        assert_eq!(json, serde_json::json!({"entries": {}}));
    }
}
