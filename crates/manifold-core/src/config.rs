//! Configuration management for Manifold.
//!
//! Configuration is assembled from layers. Values are resolved in this
//! priority order:
//!
//! 1. Values set programmatically (command-line flags)
//! 2. Environment variables (`MANIFOLD_*`)
//! 3. Values loaded from the configuration file
//! 4. Default values
//!
//! ## Example
//!
//! ```no_run
//! use manifold_core::config::{BuildConfig, Config};
//!
//! let mut config = Config::load(BuildConfig::default_path())?.with_process_env();
//! config.set("kind_filter", "ConfigMap|Secret")?;
//!
//! let build = BuildConfig::from_config(&config)?;
//! assert_eq!(build.kind_filter.as_deref(), Some("ConfigMap|Secret"));
//! # Ok::<(), manifold_types::ManifoldError>(())
//! ```

use crate::util::data::{deep_merge, get_path};
use manifold_types::{ManifoldError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Configuration layer priority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConfigLayer {
    /// Default values
    Default = 0,
    /// Values loaded from file
    Loaded = 1,
    /// Values from environment variables
    Environment = 2,
    /// Values set programmatically
    Set = 3,
}

impl ConfigLayer {
    /// All layers from lowest to highest priority.
    pub const ORDERED: [ConfigLayer; 4] = [
        ConfigLayer::Default,
        ConfigLayer::Loaded,
        ConfigLayer::Environment,
        ConfigLayer::Set,
    ];
}

/// Environment variables and the configuration keys they populate.
pub const ENV_MAPPINGS: &[(&str, &str)] = &[
    ("MANIFOLD_CACHE_DIR", "cache_dir"),
    ("MANIFOLD_KIND_FILTER", "kind_filter"),
    ("MANIFOLD_GENERATORS_FIELD", "generators_field"),
    ("MANIFOLD_SECRETS_FIELD", "secrets_field"),
    ("MANIFOLD_HELM_BIN", "tools.helm"),
    ("MANIFOLD_KUSTOMIZE_BIN", "tools.kustomize"),
    ("MANIFOLD_SOPS_BIN", "tools.sops"),
];

/// Layered configuration store.
///
/// Holds untyped data per layer; typed views such as [`BuildConfig`] are
/// decoded from the merged result.
#[derive(Clone, Debug, Default)]
pub struct Config {
    layers: HashMap<ConfigLayer, Value>,
    file_path: Option<PathBuf>,
}

impl Config {
    /// Create an empty configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configuration from a file path.
    ///
    /// If the file doesn't exist, an empty configuration is created.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut layers = HashMap::new();

        if path.exists() {
            debug!("Loading configuration from {}", path.display());
            let content = fs::read_to_string(path).map_err(|e| {
                ManifoldError::Config(format!("failed to read {}: {}", path.display(), e))
            })?;

            let value: Value = serde_yaml::from_str(&content).map_err(|e| {
                ManifoldError::Config(format!("failed to parse {}: {}", path.display(), e))
            })?;

            match value {
                Value::Null => {}
                Value::Object(_) => {
                    layers.insert(ConfigLayer::Loaded, value);
                }
                _ => {
                    return Err(ManifoldError::Config(format!(
                        "{} must contain a mapping",
                        path.display()
                    )))
                }
            }
        }

        Ok(Self {
            layers,
            file_path: Some(path.to_path_buf()),
        })
    }

    /// Path the configuration was loaded from, if any.
    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    /// Populate the environment layer from the given variables.
    ///
    /// Only names listed in [`ENV_MAPPINGS`] are considered; empty values
    /// are ignored.
    pub fn with_env_vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        let mut layer = Value::Object(Map::new());
        for (name, key) in ENV_MAPPINGS {
            if let Some(value) = vars.get(*name).filter(|v| !v.is_empty()) {
                debug!("Using {} from {}", key, name);
                set_value_at_path(&mut layer, key, Value::String(value.clone()));
            }
        }

        self.layers.insert(ConfigLayer::Environment, layer);
        self
    }

    /// Populate the environment layer from the process environment.
    pub fn with_process_env(self) -> Self {
        self.with_env_vars(std::env::vars())
    }

    /// Get a configuration value by dotted key, respecting layer priority.
    ///
    /// Returns None if the key doesn't exist in any layer.
    pub fn get<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        for layer in ConfigLayer::ORDERED.iter().rev() {
            if let Some(value) = self.layers.get(layer).and_then(|d| get_path(d, key)) {
                if let Ok(typed) = serde_json::from_value(value.clone()) {
                    return Some(typed);
                }
            }
        }

        None
    }

    /// Set a configuration value programmatically.
    pub fn set(&mut self, key: &str, value: impl Serialize) -> Result<()> {
        if key.split('.').all(str::is_empty) {
            return Err(ManifoldError::Config("empty configuration key".to_string()));
        }

        let value = serde_json::to_value(value)
            .map_err(|e| ManifoldError::Config(format!("failed to serialize {}: {}", key, e)))?;

        let layer = self
            .layers
            .entry(ConfigLayer::Set)
            .or_insert_with(|| Value::Object(Map::new()));
        set_value_at_path(layer, key, value);

        Ok(())
    }

    /// Merged data of all layers.
    pub fn merged_data(&self) -> Value {
        ConfigLayer::ORDERED
            .iter()
            .filter_map(|layer| self.layers.get(layer))
            .fold(Value::Object(Map::new()), |merged, data| {
                deep_merge(merged, data.clone())
            })
    }
}

fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was replaced by an object"),
    }
}

// Set value at dotted path, creating intermediate objects as needed
fn set_value_at_path(data: &mut Value, path: &str, value: Value) {
    let mut parts: Vec<&str> = path.split('.').filter(|p| !p.is_empty()).collect();
    let Some(last) = parts.pop() else {
        return;
    };

    let mut current = data;
    for part in parts {
        current = ensure_object(current)
            .entry(part.to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    ensure_object(current).insert(last.to_string(), value);
}

/// Paths of the external tools used by the generators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Chart templating binary
    pub helm: PathBuf,

    /// Overlay engine binary
    pub kustomize: PathBuf,

    /// Secret decryption binary
    pub sops: PathBuf,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            helm: PathBuf::from("helm"),
            kustomize: PathBuf::from("kustomize"),
            sops: PathBuf::from("sops"),
        }
    }
}

/// Settings of a `build` run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    /// Root of the persistent fetch cache
    pub cache_dir: PathBuf,

    /// Top-level field holding the generator manifests
    pub generators_field: String,

    /// Top-level field holding the secrets tree
    pub secrets_field: String,

    /// Only emit objects whose kind fully matches this pattern
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind_filter: Option<String>,

    /// External tool locations
    pub tools: ToolsConfig,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            cache_dir: Self::default_cache_dir(),
            generators_field: "generators".to_string(),
            secrets_field: "secrets".to_string(),
            kind_filter: None,
            tools: ToolsConfig::default(),
        }
    }
}

impl BuildConfig {
    /// Decode build settings from a layered configuration.
    ///
    /// Keys missing from every layer take their default values.
    pub fn from_config(config: &Config) -> Result<Self> {
        let defaults = serde_json::to_value(Self::default())
            .map_err(|e| ManifoldError::Config(format!("failed to serialize defaults: {}", e)))?;
        let merged = deep_merge(defaults, config.merged_data());

        let mut build: BuildConfig = serde_json::from_value(merged)
            .map_err(|e| ManifoldError::Config(format!("invalid build configuration: {}", e)))?;

        build.cache_dir = crate::util::fs::expand_path(&build.cache_dir);
        if build.kind_filter.as_deref() == Some("") {
            build.kind_filter = None;
        }

        Ok(build)
    }

    /// Default location of the configuration file.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(crate::APP_NAME)
            .join("config.yml")
    }

    /// Default root of the fetch cache.
    pub fn default_cache_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join(crate::APP_NAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write_config(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path().join("absent.yml")).unwrap();
        let build = BuildConfig::from_config(&config).unwrap();

        assert_eq!(build, BuildConfig::default());
        assert_eq!(build.generators_field, "generators");
        assert_eq!(build.secrets_field, "secrets");
        assert_eq!(build.tools.helm, PathBuf::from("helm"));
    }

    #[test]
    fn test_loaded_values() {
        let (_dir, path) = write_config("cache_dir: /var/cache/m\ntools:\n  helm: /opt/helm\n");
        let config = Config::load(&path).unwrap();
        let build = BuildConfig::from_config(&config).unwrap();

        assert_eq!(build.cache_dir, PathBuf::from("/var/cache/m"));
        assert_eq!(build.tools.helm, PathBuf::from("/opt/helm"));
        assert_eq!(build.tools.sops, PathBuf::from("sops"));
        assert_eq!(config.file_path(), Some(path.as_path()));
    }

    #[test]
    fn test_layer_priority() {
        let (_dir, path) = write_config("kind_filter: Deployment\nsecrets_field: file\n");
        let mut config = Config::load(&path).unwrap().with_env_vars([
            ("MANIFOLD_KIND_FILTER", "Service"),
            ("MANIFOLD_SECRETS_FIELD", "env"),
            ("UNRELATED", "x"),
        ]);
        config.set("kind_filter", "ConfigMap").unwrap();

        let build = BuildConfig::from_config(&config).unwrap();
        assert_eq!(build.kind_filter.as_deref(), Some("ConfigMap"));
        assert_eq!(build.secrets_field, "env");
        assert_eq!(config.get::<String>("kind_filter").unwrap(), "ConfigMap");
    }

    #[test]
    fn test_env_nested_and_empty() {
        let config = Config::new().with_env_vars([
            ("MANIFOLD_SOPS_BIN", "/usr/local/bin/sops"),
            ("MANIFOLD_CACHE_DIR", ""),
        ]);
        let build = BuildConfig::from_config(&config).unwrap();

        assert_eq!(build.tools.sops, PathBuf::from("/usr/local/bin/sops"));
        assert_eq!(build.cache_dir, BuildConfig::default_cache_dir());
    }

    #[test]
    fn test_set_nested_key() {
        let mut config = Config::new();
        config.set("tools.kustomize", "/bin/kustomize").unwrap();
        assert_eq!(
            config.merged_data(),
            json!({"tools": {"kustomize": "/bin/kustomize"}})
        );
        assert!(config.set("", 1).is_err());
    }

    #[test]
    fn test_invalid_file() {
        let (_dir, path) = write_config("- just\n- a list\n");
        assert!(matches!(Config::load(&path), Err(ManifoldError::Config(_))));

        let (_dir, path) = write_config("generators_field: [1, 2]\n");
        let config = Config::load(&path).unwrap();
        assert!(matches!(
            BuildConfig::from_config(&config),
            Err(ManifoldError::Config(_))
        ));
    }

    #[test]
    fn test_empty_kind_filter_is_none() {
        let mut config = Config::new();
        config.set("kind_filter", "").unwrap();
        assert_eq!(BuildConfig::from_config(&config).unwrap().kind_filter, None);
    }

    #[test]
    fn test_default_path() {
        let path = BuildConfig::default_path();
        assert!(path.ends_with("manifold/config.yml"));
    }
}
