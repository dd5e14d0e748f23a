use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use folio_index::AsMapping;

use crate::container::Container;
use crate::error::{DocError, DocResult};

/// A persistent leaf: one JSON object, stored as `<path>.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Document {
    fields: Map<String, Value>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a JSON value; only objects are documents.
    pub fn from_value(value: Value) -> DocResult<Self> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(DocError::NotADocument(format!(
                "expected a JSON object, got {other}"
            ))),
        }
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(field.into(), value.into());
        self
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(field.into(), value.into())
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

impl From<Map<String, Value>> for Document {
    fn from(fields: Map<String, Value>) -> Self {
        Self { fields }
    }
}

/// What a container entry holds, as recorded in its folder file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Document,
    Container,
}

/// An entry of a container.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Document(Document),
    Container(Container),
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Document(_) => NodeKind::Document,
            Node::Container(_) => NodeKind::Container,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Node::Document(doc) => Some(doc),
            Node::Container(_) => None,
        }
    }

    pub fn as_document_mut(&mut self) -> Option<&mut Document> {
        match self {
            Node::Document(doc) => Some(doc),
            Node::Container(_) => None,
        }
    }

    pub fn as_container(&self) -> Option<&Container> {
        match self {
            Node::Container(container) => Some(container),
            Node::Document(_) => None,
        }
    }

    pub fn as_container_mut(&mut self) -> Option<&mut Container> {
        match self {
            Node::Container(container) => Some(container),
            Node::Document(_) => None,
        }
    }
}

impl From<Document> for Node {
    fn from(doc: Document) -> Self {
        Node::Document(doc)
    }
}

impl From<Container> for Node {
    fn from(container: Container) -> Self {
        Node::Container(container)
    }
}

impl AsMapping for Document {
    fn as_mapping(&self) -> Option<&Map<String, Value>> {
        Some(&self.fields)
    }
}

/// Documents are mapping-like; containers are handed to key mappers raw.
impl AsMapping for Node {
    fn as_mapping(&self) -> Option<&Map<String, Value>> {
        self.as_document().map(Document::fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn only_objects_are_documents() {
        assert!(Document::from_value(json!({"a": 1})).is_ok());
        assert!(matches!(
            Document::from_value(json!([1, 2])),
            Err(DocError::NotADocument(_))
        ));
    }

    #[test]
    fn document_serializes_as_plain_object() {
        let doc = Document::new().with("value", "b");
        assert_eq!(serde_json::to_value(&doc).unwrap(), json!({"value": "b"}));
    }

    #[test]
    fn containers_are_not_mappings() {
        let doc: Node = Document::new().with("id", 1).into();
        assert_eq!(doc.as_mapping().unwrap()["id"], 1);
        let folder: Node = Container::new().into();
        assert!(folder.as_mapping().is_none());
        assert_eq!(folder.kind(), NodeKind::Container);
    }
}
