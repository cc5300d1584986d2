//! # Manifold Services
//!
//! Implementations of the collaborator traits from `manifold-types` backed
//! by the network and by external tools.
//!
//! - **HTTP**: cached fetching of remote raw manifests
//! - **Helm**: chart download (HTTP repositories and OCI registries) and rendering
//! - **Kustomize**: overlay application on collected objects
//! - **SOPS**: decryption of secret files

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod fetch;
pub mod helm;
pub mod kustomize;
pub mod sops;

pub use fetch::HttpFetcher;
pub use helm::{HelmChartFetcher, HelmCli};
pub use kustomize::KustomizeCli;
pub use sops::SopsCli;

use std::path::{Path, PathBuf};

/// Cache subdirectory for fetched raw resources.
pub const RESOURCES_CACHE: &str = "resources";

/// Cache subdirectory for downloaded charts.
pub const HELM_CACHE: &str = "helm";

/// Directory under `cache_dir` holding fetched raw resources.
pub fn resources_cache_dir(cache_dir: &Path) -> PathBuf {
    cache_dir.join(RESOURCES_CACHE)
}

/// Directory under `cache_dir` holding downloaded charts.
pub fn helm_cache_dir(cache_dir: &Path) -> PathBuf {
    cache_dir.join(HELM_CACHE)
}

fn http_client() -> manifold_types::Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .user_agent(format!("manifold/{}", manifold_core::VERSION))
        .build()
        .map_err(|e| manifold_types::ManifoldError::Fetch(format!("failed to create HTTP client: {}", e)))
}
