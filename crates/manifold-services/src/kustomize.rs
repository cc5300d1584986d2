//! Overlays through the `kustomize` binary.

use manifold_core::util::{to_yaml_string, Tool};
use manifold_types::{ManifoldError, OverlayEngine, Result};
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::debug;

/// File the collected objects are written to before the overlay runs.
pub const OBJECTS_FILE: &str = "manifold_objects.yaml";

/// Runs `kustomize build` over a scratch directory.
pub struct KustomizeCli {
    kustomize: Tool,
}

impl KustomizeCli {
    /// Create an overlay engine using the `kustomize` binary at `binary`.
    pub fn new(binary: impl AsRef<Path>) -> Self {
        Self {
            kustomize: Tool::new("kustomize", binary),
        }
    }
}

/// The kustomization with the objects file appended to its resources.
pub fn kustomization_with_objects(spec: &Value) -> Result<Value> {
    let mut kustomization = match spec {
        Value::Object(map) => map.clone(),
        Value::Null => serde_json::Map::new(),
        other => {
            return Err(ManifoldError::InvalidSpec(format!(
                "kustomization must be a mapping, got {}",
                other
            )))
        }
    };

    if kustomization.get("resources").map_or(true, Value::is_null) {
        kustomization.insert("resources".to_string(), Value::Array(Vec::new()));
    }
    match kustomization.get_mut("resources") {
        Some(Value::Array(items)) => items.push(Value::String(OBJECTS_FILE.to_string())),
        _ => {
            return Err(ManifoldError::InvalidSpec(
                "kustomization resources must be a list".to_string(),
            ))
        }
    }

    Ok(Value::Object(kustomization))
}

impl OverlayEngine for KustomizeCli {
    fn apply(&self, resources: &str, spec: &Value) -> Result<String> {
        let workdir = tempfile::Builder::new().prefix("manifold-kustomize-").tempdir()?;

        fs::write(workdir.path().join(OBJECTS_FILE), resources)?;
        let kustomization = to_yaml_string(&kustomization_with_objects(spec)?)?;
        fs::write(workdir.path().join("kustomization.yaml"), kustomization)?;

        debug!("Running kustomize in {}", workdir.path().display());
        let output = self.kustomize.run([
            std::ffi::OsStr::new("build"),
            workdir.path().as_os_str(),
        ])?;

        String::from_utf8(output).map_err(|e| ManifoldError::Tool {
            tool: self.kustomize.name().to_string(),
            message: format!("output is not valid UTF-8: {}", e),
        })
    }
}
