//! YAML and JSON data handling utilities.

use manifold_types::{ManifoldError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The document separator used in multi-document YAML streams.
pub const DOCUMENT_SEPARATOR: &str = "---\n";

/// Deep merge two values.
/// Recursively merges objects, with overlay values taking precedence.
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_val) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_val) => deep_merge(base_val, overlay_val),
                    None => overlay_val,
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_, overlay_val) => overlay_val,
    }
}

/// Split a multi-document YAML stream into raw documents.
///
/// A `---` line, optionally followed by a comment, ends the current
/// document. Returned chunks may be blank.
pub fn split_documents(text: &str) -> Vec<&str> {
    let mut documents = Vec::new();
    let mut start = 0;
    let mut offset = 0;

    for line in text.split_inclusive('\n') {
        let line_start = offset;
        offset += line.len();

        if is_separator_line(line) {
            documents.push(&text[start..line_start]);
            start = offset;
        }
    }
    documents.push(&text[start..]);
    documents
}

fn is_separator_line(line: &str) -> bool {
    match line.strip_prefix("---") {
        Some(rest) => {
            let rest = rest.trim_end();
            rest.is_empty() || (rest.starts_with([' ', '\t']) && rest.trim_start().starts_with('#'))
        }
        None => false,
    }
}

/// Whether a raw document holds nothing but whitespace and comments.
pub fn is_blank_document(document: &str) -> bool {
    document.lines().all(|line| {
        let line = line.trim();
        line.is_empty() || line.starts_with('#')
    })
}

/// Decode every non-empty document of a multi-document YAML stream.
///
/// Blank and comment-only documents are skipped, so empty input yields no
/// documents.
pub fn parse_yaml_documents(bytes: &[u8]) -> Result<Vec<Value>> {
    let mut values = Vec::new();
    for (index, document) in serde_yaml::Deserializer::from_slice(bytes).enumerate() {
        let value = Value::deserialize(document)
            .map_err(|e| ManifoldError::Decode(format!("document {}: {}", index, e)))?;
        if !value.is_null() {
            values.push(value);
        }
    }
    Ok(values)
}

/// Serialize a value as a YAML document.
pub fn to_yaml_string(value: &impl Serialize) -> Result<String> {
    serde_yaml::to_string(value).map_err(|e| ManifoldError::Serialization(e.to_string()))
}

/// Get value at a path in dotted notation.
pub fn get_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;

    for part in path.split('.').filter(|p| !p.is_empty()) {
        match current {
            Value::Object(map) => {
                current = map.get(part)?;
            }
            Value::Array(arr) => {
                let index: usize = part.parse().ok()?;
                current = arr.get(index)?;
            }
            _ => return None,
        }
    }

    Some(current)
}
