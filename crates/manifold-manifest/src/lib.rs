//! # Manifold Manifest
//!
//! Document generation pipeline:
//! - Generator manifests extracted from evaluated instances (after secret injection)
//! - A registry mapping generator types to constructors
//! - The built-in `Bundle` and `Objects` generators
//! - A deduplicating object store
//! - The build orchestrator that filters and serializes generated documents
//!
//! ## Example
//!
//! ```no_run
//! use manifold_manifest::{build, GenerateContext, GeneratorRegistry, InstanceFields};
//! use manifold_core::YamlEvaluator;
//! use manifold_services::{HelmChartFetcher, HelmCli, HttpFetcher, KustomizeCli, SopsCli};
//! use manifold_types::{Evaluator, LoadOptions};
//! use std::path::Path;
//!
//! let instances = YamlEvaluator::new().load(Path::new("envs/prod"), &LoadOptions::default())?;
//! let manifests = manifold_manifest::manifests_for_instances(
//!     &instances,
//!     &InstanceFields::default(),
//!     &SopsCli::new("sops"),
//! )?;
//!
//! let cache = Path::new("/tmp/manifold");
//! let fetcher = HttpFetcher::new(manifold_services::resources_cache_dir(cache))?;
//! let charts = HelmChartFetcher::new(manifold_services::helm_cache_dir(cache), "helm")?;
//! let ctx = GenerateContext {
//!     fetcher: &fetcher,
//!     charts: &charts,
//!     renderer: &HelmCli::new("helm"),
//!     overlay: &KustomizeCli::new("kustomize"),
//! };
//!
//! let registry = GeneratorRegistry::standard();
//! build::run(&mut std::io::stdout(), &manifests, &registry, &ctx, &Default::default())?;
//! # Ok::<(), manifold_types::ManifoldError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod build;
pub mod bundle;
pub mod generator;
pub mod object;
pub mod objects;
pub mod pipeline;
pub mod registry;
pub mod store;

// Re-export main types
pub use build::{compile_kind_filter, BuildOptions, BuildSummary};
pub use bundle::BundleGenerator;
pub use generator::{
    manifests_from_value, GenerateContext, Generator, GeneratorManifest, ObjectIter,
};
pub use object::Object;
pub use objects::ObjectsGenerator;
pub use pipeline::{manifests_for_instance, manifests_for_instances, InstanceFields};
pub use registry::GeneratorRegistry;
pub use store::ObjectStore;
