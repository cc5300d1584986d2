//! Deduplicating collection of generated documents.

use crate::object::Object;
use indexmap::IndexMap;
use manifold_core::util::data::DOCUMENT_SEPARATOR;
use manifold_core::util::parse_yaml_documents;
use manifold_types::{ManifoldError, ObjectKey, Result, ResultExt};
use std::io::Write;

/// Documents keyed by identity, unique within one store.
///
/// Iteration follows insertion order; [`ObjectStore::sorted`] gives a stable
/// key order.
#[derive(Debug, Clone, Default)]
pub struct ObjectStore {
    objects: IndexMap<ObjectKey, Object>,
}

impl ObjectStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `object`.
    ///
    /// Fails with [`ManifoldError::DuplicateObject`] if its key is already
    /// present, leaving the store unchanged.
    pub fn add(&mut self, object: Object) -> Result<()> {
        if self.objects.contains_key(object.key()) {
            return Err(ManifoldError::DuplicateObject(object.key().to_string()));
        }
        self.objects.insert(object.key().clone(), object);
        Ok(())
    }

    /// Decode a multi-document YAML stream and add every document.
    ///
    /// Blank and comment-only documents are skipped. Stops at the first
    /// decode or duplicate error; documents added before it stay in the
    /// store. Returns the number of documents added.
    pub fn add_yaml(&mut self, bytes: &[u8]) -> Result<usize> {
        let documents = parse_yaml_documents(bytes)?;
        let count = documents.len();

        for (index, document) in documents.into_iter().enumerate() {
            let object = Object::from_json(document)
                .with_context(|| format!("document {}", index))?;
            self.add(object)?;
        }

        Ok(count)
    }

    /// Look up a document by key.
    pub fn get(&self, key: &ObjectKey) -> Option<&Object> {
        self.objects.get(key)
    }

    /// Whether a document with `key` is present.
    pub fn contains(&self, key: &ObjectKey) -> bool {
        self.objects.contains_key(key)
    }

    /// Number of documents.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Documents in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &Object> {
        self.objects.values()
    }

    /// Documents in key order.
    pub fn sorted(&self) -> impl Iterator<Item = &Object> {
        let mut objects: Vec<&Object> = self.objects.values().collect();
        objects.sort_by(|a, b| a.key().cmp(b.key()));
        objects.into_iter()
    }

    /// Write every document in key order, separated by `---`.
    pub fn write_yaml<W: Write + ?Sized>(&self, w: &mut W) -> Result<()> {
        for (index, object) in self.sorted().enumerate() {
            if index > 0 {
                w.write_all(DOCUMENT_SEPARATOR.as_bytes()).map_err(|e| {
                    ManifoldError::Serialization(format!("failed to write separator: {}", e))
                })?;
            }
            object.write_yaml(w)?;
        }
        Ok(())
    }

    /// The store as a multi-document YAML string.
    pub fn to_yaml_string(&self) -> Result<String> {
        let mut buf = Vec::new();
        self.write_yaml(&mut buf)?;
        String::from_utf8(buf).map_err(|e| ManifoldError::Serialization(e.to_string()))
    }
}

impl IntoIterator for ObjectStore {
    type Item = Object;
    type IntoIter = indexmap::map::IntoValues<ObjectKey, Object>;

    fn into_iter(self) -> Self::IntoIter {
        self.objects.into_values()
    }
}
