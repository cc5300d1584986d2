//! Generated documents.

use manifold_core::util::to_yaml_string;
use manifold_types::{ManifoldError, ObjectKey, Result};
use serde_json::Value;
use std::io::Write;

/// A single generated document with its identity facets.
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    key: ObjectKey,
    kind: String,
    content: Value,
}

impl Object {
    /// Wrap a decoded document.
    ///
    /// The document must be a mapping with a non-empty string `kind`.
    /// `apiVersion`, `metadata.namespace` and `metadata.name` default to
    /// empty when absent.
    pub fn from_json(content: Value) -> Result<Self> {
        let map = content.as_object().ok_or_else(|| {
            ManifoldError::Decode(format!("document must be a mapping, got {}", type_name(&content)))
        })?;

        let kind = match map.get("kind") {
            Some(Value::String(kind)) if !kind.is_empty() => kind.clone(),
            Some(Value::String(_)) | None => {
                return Err(ManifoldError::Decode("document has no kind".to_string()))
            }
            Some(other) => {
                return Err(ManifoldError::Decode(format!(
                    "document kind must be a string, got {}",
                    type_name(other)
                )))
            }
        };

        let api_version = map.get("apiVersion").and_then(Value::as_str).unwrap_or("");
        let metadata = map.get("metadata");
        let facet = |name: &str| {
            metadata
                .and_then(|m| m.get(name))
                .and_then(Value::as_str)
                .unwrap_or("")
        };
        let key = ObjectKey::new(api_version, &kind, facet("namespace"), facet("name"));

        Ok(Self { key, kind, content })
    }

    /// Identity key of this document.
    pub fn key(&self) -> &ObjectKey {
        &self.key
    }

    /// The document's kind.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The document's `apiVersion`, empty if absent.
    pub fn api_version(&self) -> &str {
        self.content
            .get("apiVersion")
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    /// The document's `metadata.namespace`, empty for cluster-scoped objects.
    pub fn namespace(&self) -> &str {
        self.metadata_str("namespace")
    }

    /// The document's `metadata.name`.
    pub fn name(&self) -> &str {
        self.metadata_str("name")
    }

    fn metadata_str(&self, field: &str) -> &str {
        self.content
            .get("metadata")
            .and_then(|m| m.get(field))
            .and_then(Value::as_str)
            .unwrap_or("")
    }

    /// Borrow the full document.
    pub fn content(&self) -> &Value {
        &self.content
    }

    /// Take the full document.
    pub fn into_content(self) -> Value {
        self.content
    }

    /// Serialize as a single YAML document, without separators.
    pub fn to_yaml(&self) -> Result<String> {
        to_yaml_string(&self.content)
            .map_err(|e| e.context(format!("failed to encode object {} to yaml", self.key)))
    }

    /// Write this document as YAML to `w`.
    pub fn write_yaml<W: Write + ?Sized>(&self, w: &mut W) -> Result<()> {
        let yaml = self.to_yaml()?;
        w.write_all(yaml.as_bytes()).map_err(|e| {
            ManifoldError::Serialization(format!("failed to write object {}: {}", self.key, e))
        })
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}
