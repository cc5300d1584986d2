//! Generate manifests for a configuration path.

use crate::cli::BuildArgs;
use anyhow::{bail, Context, Result};
use manifold_core::{BuildConfig, Config, YamlEvaluator};
use manifold_manifest::{build, BuildOptions, GenerateContext, GeneratorRegistry, InstanceFields};
use manifold_services::{
    helm_cache_dir, resources_cache_dir, HelmChartFetcher, HelmCli, HttpFetcher, KustomizeCli,
    SopsCli,
};
use manifold_types::{Evaluator, LoadOptions, Path};
use std::io::{self, BufWriter, Write};
use tracing::info;

pub fn execute(args: &BuildArgs) -> Result<()> {
    if let Some(dir) = &args.chdir {
        std::env::set_current_dir(dir)
            .with_context(|| format!("failed to change directory to {}", dir.display()))?;
    }

    let settings = settings(args)?;
    info!("Using cache directory {}", settings.cache_dir.display());

    let load_options = LoadOptions {
        tags: args.tags.clone(),
        package: args.package.clone(),
    };
    let instances = YamlEvaluator::new()
        .load(std::path::Path::new(&args.path), &load_options)
        .with_context(|| format!("failed to load {}", args.path))?;
    info!("Loaded {} instance(s) from {}", instances.len(), args.path);

    let fields = InstanceFields {
        generators: Path::parse(&settings.generators_field),
        secrets: Path::parse(&settings.secrets_field),
    };
    let sops = SopsCli::new(&settings.tools.sops);
    let manifests = manifold_manifest::manifests_for_instances(&instances, &fields, &sops)?;

    let fetcher = HttpFetcher::new(resources_cache_dir(&settings.cache_dir))?;
    let charts = HelmChartFetcher::new(helm_cache_dir(&settings.cache_dir), &settings.tools.helm)?;
    let renderer = HelmCli::new(&settings.tools.helm);
    let overlay = KustomizeCli::new(&settings.tools.kustomize);
    let ctx = GenerateContext {
        fetcher: &fetcher,
        charts: &charts,
        renderer: &renderer,
        overlay: &overlay,
    };

    let options = BuildOptions::with_kind_filter(settings.kind_filter.as_deref())?;
    let registry = GeneratorRegistry::standard();

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    let result = build::run(&mut out, &manifests, &registry, &ctx, &options);
    // Whatever was generated before a failure still goes out.
    out.flush().context("failed to flush output")?;
    let summary = result?;

    info!(
        "Wrote {} object(s) from {} generator(s)",
        summary.emitted,
        manifests.len()
    );
    Ok(())
}

/// Layered settings: defaults, config file, `MANIFOLD_*` variables, then flags.
fn settings(args: &BuildArgs) -> Result<BuildConfig> {
    let path = match &args.config {
        Some(path) => {
            if !path.exists() {
                bail!("config file {} does not exist", path.display());
            }
            path.clone()
        }
        None => BuildConfig::default_path(),
    };

    let mut config = Config::load(&path)?.with_process_env();

    if let Some(cache_dir) = &args.cache_dir {
        config.set("cache_dir", cache_dir)?;
    }
    if let Some(kind) = &args.kind {
        config.set("kind_filter", kind)?;
    }
    if let Some(field) = &args.generators_field {
        config.set("generators_field", field)?;
    }
    if let Some(field) = &args.secrets_field {
        config.set("secrets_field", field)?;
    }

    Ok(BuildConfig::from_config(&config)?)
}
