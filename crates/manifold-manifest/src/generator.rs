//! The generator abstraction and generator manifests.

use crate::object::Object;
use manifold_types::{
    ChartFetcher, ChartRenderer, GroupVersionKind, ManifoldError, OverlayEngine, Path,
    ResourceFetcher, Result, Value,
};
use std::path::{Path as FsPath, PathBuf};

/// Lazy, single-pass sequence of generated documents.
///
/// Dropping it before exhaustion stops generation.
pub type ObjectIter<'a> = Box<dyn Iterator<Item = Result<Object>> + 'a>;

/// Collaborators a generator may call while producing documents.
#[derive(Clone, Copy)]
pub struct GenerateContext<'a> {
    /// Remote raw manifest fetcher
    pub fetcher: &'a dyn ResourceFetcher,
    /// Chart downloader
    pub charts: &'a dyn ChartFetcher,
    /// Chart templating engine
    pub renderer: &'a dyn ChartRenderer,
    /// Overlay engine
    pub overlay: &'a dyn OverlayEngine,
}

/// A constructed generator.
pub trait Generator {
    /// Produce this generator's documents.
    ///
    /// Each call returns a fresh sequence.
    fn generate<'a>(&'a self, ctx: &'a GenerateContext<'a>) -> Result<ObjectIter<'a>>;
}

/// One entry of the generators field: type meta plus an untyped spec.
#[derive(Debug, Clone)]
pub struct GeneratorManifest {
    /// Generator type
    pub gvk: GroupVersionKind,
    /// The `spec` field, null if absent
    pub spec: Value,
    /// Directory of the instance the manifest was declared in
    pub instance_dir: PathBuf,
}

impl GeneratorManifest {
    /// Read type meta and spec from a manifest value.
    pub fn from_value(value: &Value, instance_dir: &FsPath) -> Result<Self> {
        if !value.is_struct() {
            return Err(ManifoldError::InvalidSpec(
                "generator manifest must be a struct".to_string(),
            ));
        }

        let gvk = GroupVersionKind::from_type_meta(
            type_meta(value, "apiVersion")?,
            type_meta(value, "kind")?,
        );
        Ok(Self {
            gvk,
            spec: value.get("spec").cloned().unwrap_or_default(),
            instance_dir: instance_dir.to_path_buf(),
        })
    }

    /// Decode the `spec` field into a typed structure.
    pub fn decode_spec<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        self.spec.decode().map_err(|e| {
            ManifoldError::InvalidSpec(format!("when decoding {} spec: {}", self.gvk.kind, e))
        })
    }
}

fn type_meta<'v>(value: &'v Value, label: &str) -> Result<&'v str> {
    value
        .get(label)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ManifoldError::InvalidSpec(format!("generator manifest has no {}", label)))
}

/// Extract the generator manifests at `field` of an instance root.
///
/// The field may be a list, or a struct whose fields are taken in
/// declaration order. A missing field yields no manifests.
pub fn manifests_from_value(
    root: &Value,
    field: &Path,
    instance_dir: &FsPath,
) -> Result<Vec<GeneratorManifest>> {
    let Some(generators) = root.lookup(field) else {
        return Ok(Vec::new());
    };

    let entries: Vec<(String, &Value)> = match generators {
        Value::Null => Vec::new(),
        Value::List(items) => items
            .iter()
            .enumerate()
            .map(|(i, v)| (i.to_string(), v.as_ref()))
            .collect(),
        Value::Struct(_) => generators
            .fields()
            .map(|(label, f)| (label.to_string(), f.value()))
            .collect(),
        _ => {
            return Err(ManifoldError::InvalidSpec(format!(
                "'{}' must be a list or struct of generators",
                field
            )))
        }
    };

    entries
        .into_iter()
        .map(|(label, value)| {
            GeneratorManifest::from_value(value, instance_dir)
                .map_err(|e| e.context(format!("{}.{}", field, label)))
        })
        .collect()
}
