//! The `Bundle` generator: raw resources, Helm charts and a kustomize overlay.

use crate::generator::{GenerateContext, Generator, GeneratorManifest, ObjectIter};
use crate::object::Object;
use crate::registry::GeneratorRegistry;
use crate::store::ObjectStore;
use manifold_core::util::list_yaml_files;
use manifold_types::api::{BundleSpec, HelmChart, HelmOptions};
use manifold_types::{api, ChartSource, Result, ResultExt};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Collects documents into one store, then optionally overlays them.
#[derive(Debug, Clone)]
pub struct BundleGenerator {
    spec: BundleSpec,
    instance_dir: PathBuf,
}

impl BundleGenerator {
    /// Decode the bundle spec from a manifest.
    pub fn from_manifest(manifest: &GeneratorManifest) -> Result<Self> {
        Ok(Self {
            spec: manifest.decode_spec()?,
            instance_dir: manifest.instance_dir.clone(),
        })
    }

    /// Run every stage and return the final store.
    pub fn collect(&self, ctx: &GenerateContext<'_>) -> Result<ObjectStore> {
        let mut store = ObjectStore::new();

        for resource in &self.spec.resource {
            add_resource(&mut store, resource, &self.instance_dir, ctx)?;
        }

        for chart in &self.spec.helm {
            add_chart(&mut store, chart, &self.spec.helm_options, &self.instance_dir, ctx)?;
        }

        if let Some(kustomization) = self.spec.kustomization() {
            store = overlay(&store, kustomization, ctx)?;
        }

        info!("Bundle produced {} object(s)", store.len());
        Ok(store)
    }
}

impl Generator for BundleGenerator {
    fn generate<'a>(&'a self, ctx: &'a GenerateContext<'a>) -> Result<ObjectIter<'a>> {
        let store = self.collect(ctx)?;
        Ok(Box::new(store.into_iter().map(Ok)))
    }
}

/// Register the `Bundle` generator.
pub fn register(registry: &GeneratorRegistry) {
    registry.register(api::bundle_gvk(), |manifest| {
        Ok(Box::new(BundleGenerator::from_manifest(manifest)?))
    });
}

fn is_url(resource: &str) -> bool {
    resource.starts_with("http://") || resource.starts_with("https://")
}

fn add_resource(
    store: &mut ObjectStore,
    resource: &str,
    instance_dir: &Path,
    ctx: &GenerateContext<'_>,
) -> Result<()> {
    let data = if is_url(resource) {
        ctx.fetcher
            .fetch(resource)
            .with_context(|| format!("when getting cached resource from URL {}", resource))?
    } else {
        let path = instance_dir.join(resource);
        let metadata = fs::metadata(&path)
            .with_context(|| format!("when accessing resource {}", path.display()))?;

        if metadata.is_dir() {
            return add_resource_directory(store, &path);
        }
        fs::read(&path).with_context(|| format!("when reading resource file {}", path.display()))?
    };

    debug!("Adding resource {}", resource);
    store
        .add_yaml(&data)
        .context("when adding resource objects to store")?;
    Ok(())
}

fn add_resource_directory(store: &mut ObjectStore, dir: &Path) -> Result<()> {
    let files = list_yaml_files(dir)
        .with_context(|| format!("unable to read directory {}", dir.display()))?;

    for file in files {
        let data = fs::read(&file)
            .with_context(|| format!("when reading resource file {}", file.display()))?;
        store.add_yaml(&data).with_context(|| {
            format!("when adding resource objects from {} to store", file.display())
        })?;
    }
    Ok(())
}

fn add_chart(
    store: &mut ObjectStore,
    chart: &HelmChart,
    options: &HelmOptions,
    instance_dir: &Path,
    ctx: &GenerateContext<'_>,
) -> Result<()> {
    let chart_ref = chart.chart_ref();
    let chart_dir = match chart_ref.source() {
        ChartSource::Local => instance_dir.join(&chart.repository),
        ChartSource::Oci | ChartSource::Http => ctx
            .charts
            .fetch_chart(&chart_ref)
            .context("when downloading chart")?,
    };

    if chart.create_namespace && !chart.namespace.is_empty() {
        let namespace = Object::from_json(json!({
            "apiVersion": "v1",
            "kind": "Namespace",
            "metadata": {"name": chart.namespace},
        }))?;
        store
            .add(namespace)
            .context("when adding namespace object to store")?;
    }

    debug!("Rendering chart {}", chart_dir.display());
    let rendered = ctx
        .renderer
        .render(&chart_dir, &chart.release(options))
        .context("when rendering helm templates")?;

    for (template, documents) in rendered {
        store
            .add_yaml(documents.as_bytes())
            .with_context(|| format!("when adding helm objects to store from {}", template))?;
    }
    Ok(())
}

fn overlay(
    store: &ObjectStore,
    kustomization: &serde_json::Value,
    ctx: &GenerateContext<'_>,
) -> Result<ObjectStore> {
    let resources = store.to_yaml_string()?;
    let output = ctx
        .overlay
        .apply(&resources, kustomization)
        .context("when running kustomize")?;

    let mut overlaid = ObjectStore::new();
    overlaid
        .add_yaml(output.as_bytes())
        .context("when adding kustomize output to store")?;
    Ok(overlaid)
}
