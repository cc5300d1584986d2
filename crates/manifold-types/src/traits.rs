//! Core trait definitions for the collaborators the pipeline depends on.
//!
//! The generation pipeline never evaluates configuration, renders charts,
//! runs overlays, or decrypts files itself. It calls into implementations of
//! these traits, which live in `manifold-core` and `manifold-services`.

use crate::errors::Result;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Options passed to the configuration evaluator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Injected tag values (`name=value`)
    pub tags: Vec<String>,
    /// Restrict loading to instances of this package
    pub package: Option<String>,
}

/// One evaluated configuration instance.
#[derive(Debug, Clone)]
pub struct Instance {
    /// Root value of the instance
    pub root: Value,
    /// Directory the instance was loaded from
    pub dir: PathBuf,
    /// Root of the enclosing module (for `module://` references)
    pub module_root: PathBuf,
}

/// Trait for configuration evaluators.
///
/// Given a load path, yields zero or more evaluated instances.
pub trait Evaluator {
    /// Load and evaluate all instances found at `path`.
    fn load(&self, path: &Path, options: &LoadOptions) -> Result<Vec<Instance>>;
}

/// Trait for secret decryption backends.
pub trait SecretResolver: Send + Sync {
    /// Decrypt the file at `path`.
    ///
    /// `text_mode` asks for the plaintext as-is rather than in the file's
    /// structured format.
    fn decrypt(&self, path: &Path, text_mode: bool) -> Result<Vec<u8>>;
}

/// Trait for fetching remote raw resources.
pub trait ResourceFetcher: Send + Sync {
    /// Fetch the resource at `url`, returning its raw bytes.
    fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Reference to a chart in a repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartRef {
    /// Repository location: `oci://…`, `http(s)://…`, or a local path
    pub repository: String,
    /// Chart name within the repository
    pub chart_name: String,
    /// Chart version
    pub version: String,
}

impl ChartRef {
    /// Where the chart comes from.
    pub fn source(&self) -> ChartSource {
        ChartSource::classify(&self.repository)
    }
}

/// Where a chart comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChartSource {
    /// OCI registry (`oci://`)
    Oci,
    /// HTTP chart repository
    Http,
    /// Directory relative to the instance
    Local,
}

impl ChartSource {
    /// Classify a repository location.
    pub fn classify(repository: &str) -> Self {
        if repository.starts_with("oci://") {
            ChartSource::Oci
        } else if repository.starts_with("http://") || repository.starts_with("https://") {
            ChartSource::Http
        } else {
            ChartSource::Local
        }
    }
}

/// Trait for locating chart sources on disk.
pub trait ChartFetcher: Send + Sync {
    /// Make the chart available locally and return its directory.
    fn fetch_chart(&self, chart: &ChartRef) -> Result<PathBuf>;
}

/// Release parameters for chart rendering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Release {
    /// Release name
    pub name: String,
    /// Target namespace
    pub namespace: String,
    /// Whether to include the chart's CRDs
    pub include_crds: bool,
    /// Values passed to the chart
    pub values: serde_json::Map<String, serde_json::Value>,
    /// Target platform version override
    pub kube_version: Option<String>,
    /// Supported API surface override
    pub api_versions: Vec<String>,
}

/// Trait for chart templating engines.
pub trait ChartRenderer: Send + Sync {
    /// Render the chart at `chart_dir`.
    ///
    /// Returns rendered documents keyed by template path. Notes, blank
    /// documents, and partial templates are already filtered out.
    fn render(&self, chart_dir: &Path, release: &Release) -> Result<BTreeMap<String, String>>;
}

/// Trait for overlay transformation engines.
pub trait OverlayEngine: Send + Sync {
    /// Apply `spec` to the multi-document YAML `resources`.
    ///
    /// Returns a new multi-document YAML stream.
    fn apply(&self, resources: &str, spec: &serde_json::Value) -> Result<String>;
}
