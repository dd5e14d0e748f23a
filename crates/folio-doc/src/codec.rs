//! Canonical JSON encoding.
//!
//! Every object is written with its keys sorted and four-space indentation,
//! so equal content always produces equal bytes and therefore an equal
//! content hash.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};

use crate::error::{DocError, DocResult};

/// Suffix of the file that stores a document.
pub const DOC_SUFFIX: &str = ".json";

/// Name of the file that describes a container.
pub const FOLDER_FILE: &str = "__folder__.json";

const INDENT: &[u8] = b"    ";

/// Rebuild every object with its keys in sorted order.
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.into_iter().collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k, canonicalize(v)))
                    .collect::<Map<_, _>>(),
            )
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

/// Encode `value` canonically. `path` is only used in error messages.
pub fn encode<T: Serialize + ?Sized>(value: &T, path: &str) -> DocResult<Vec<u8>> {
    let codec_err = |source| DocError::Codec {
        path: path.to_string(),
        source,
    };
    let value = canonicalize(serde_json::to_value(value).map_err(codec_err)?);
    let mut out = Vec::new();
    let mut ser = serde_json::Serializer::with_formatter(&mut out, PrettyFormatter::with_indent(INDENT));
    value.serialize(&mut ser).map_err(codec_err)?;
    Ok(out)
}

pub fn decode<T: DeserializeOwned>(data: &[u8], path: &str) -> DocResult<T> {
    serde_json::from_slice(data).map_err(|source| DocError::Codec {
        path: path.to_string(),
        source,
    })
}
