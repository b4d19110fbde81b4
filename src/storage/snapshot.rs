//! JSON snapshot encoding
//!
//! The snapshot is a single JSON object mapping zero-padded ids to item records.
//! Keys are sorted at every level and indented with four spaces so identical
//! store contents always produce identical bytes.

use crate::state::Item;
use crate::storage::{StoreError, StoreResult};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

const INDENT: &[u8] = b"    ";

/// Encodes the id -> item map into snapshot bytes
pub fn encode(items: &BTreeMap<String, Item>) -> StoreResult<Vec<u8>> {
    let value = sort_keys(serde_json::to_value(items).map_err(StoreError::Encode)?);

    let mut buf = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(INDENT));
    value
        .serialize(&mut serializer)
        .map_err(StoreError::Encode)?;
    buf.push(b'\n');

    Ok(buf)
}

/// Decodes snapshot bytes, checking every record
///
/// A record is rejected if it misses a required attribute, if its key does not
/// match its id, or if it breaks the downloaded/path invariant.
pub fn decode(bytes: &[u8]) -> StoreResult<BTreeMap<String, Item>> {
    let raw: BTreeMap<String, Value> =
        serde_json::from_slice(bytes).map_err(StoreError::Malformed)?;

    let mut items = BTreeMap::new();
    for (key, record) in raw {
        let item: Item = serde_json::from_value(record).map_err(|e| StoreError::InvalidRecord {
            key: key.clone(),
            reason: e.to_string(),
        })?;

        if item.key() != key {
            return Err(StoreError::InvalidRecord {
                reason: format!("key does not match id {}", item.id()),
                key,
            });
        }

        if let Err(defect) = item.check() {
            return Err(StoreError::InvalidRecord {
                key,
                reason: defect.to_string(),
            });
        }

        items.insert(key, item);
    }

    Ok(items)
}

/// Writes `bytes` to `path` through a temporary sibling file
///
/// The rename means readers see either the previous snapshot or the new one,
/// never a truncated file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> StoreResult<()> {
    let mut tmp_name = path.as_os_str().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = Path::new(&tmp_name);

    let written = fs::write(tmp_path, bytes).and_then(|()| fs::rename(tmp_path, path));
    if written.is_err() {
        let _ = fs::remove_file(tmp_path);
    }
    written.map_err(StoreError::Io)
}

/// Rebuilds every object with its keys inserted in sorted order
fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> = map
                .into_iter()
                .map(|(key, value)| (key, sort_keys(value)))
                .collect();
            Value::Object(sorted.into_iter().collect::<Map<String, Value>>())
        }
        Value::Array(values) => Value::Array(values.into_iter().map(sort_keys).collect()),
        other => other,
    }
}
