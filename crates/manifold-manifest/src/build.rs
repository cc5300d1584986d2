//! The build orchestrator: dispatch, filter and serialize.

use crate::generator::{GenerateContext, GeneratorManifest};
use crate::registry::GeneratorRegistry;
use manifold_core::util::data::DOCUMENT_SEPARATOR;
use manifold_types::{ManifoldError, Result};
use regex::{Regex, RegexBuilder};
use std::io::Write;
use tracing::{debug, info};

/// Options for a build run.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Only emit documents whose kind matches this pattern
    pub kind_filter: Option<Regex>,
}

impl BuildOptions {
    /// Options with a compiled kind filter, if `pattern` is given.
    pub fn with_kind_filter(pattern: Option<&str>) -> Result<Self> {
        Ok(Self {
            kind_filter: pattern.map(compile_kind_filter).transpose()?,
        })
    }

    fn keeps(&self, kind: &str) -> bool {
        self.kind_filter.as_ref().map_or(true, |re| re.is_match(kind))
    }
}

/// Compile a kind filter: case-insensitive, matching the whole kind.
pub fn compile_kind_filter(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(&format!("^(?:{})$", pattern))
        .case_insensitive(true)
        .build()
        .map_err(|e| ManifoldError::FilterCompile(format!("{}: {}", pattern, e)))
}

/// Counts from a completed build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildSummary {
    /// Documents written
    pub emitted: usize,
    /// Documents suppressed by the kind filter
    pub filtered: usize,
}

/// Run every manifest in order and write their documents to `w`.
///
/// A separator precedes every written document except the first. The first
/// error aborts the run; output already written stays written.
pub fn run<W: Write + ?Sized>(
    w: &mut W,
    manifests: &[GeneratorManifest],
    registry: &GeneratorRegistry,
    ctx: &GenerateContext<'_>,
    options: &BuildOptions,
) -> Result<BuildSummary> {
    let mut summary = BuildSummary::default();

    for (index, manifest) in manifests.iter().enumerate() {
        run_one(w, manifest, registry, ctx, options, &mut summary)
            .map_err(|e| e.context(format!("generator #{} ({})", index, manifest.gvk)))?;
    }

    info!(
        "Build complete: {} document(s) emitted, {} filtered",
        summary.emitted, summary.filtered
    );
    Ok(summary)
}

fn run_one<W: Write + ?Sized>(
    w: &mut W,
    manifest: &GeneratorManifest,
    registry: &GeneratorRegistry,
    ctx: &GenerateContext<'_>,
    options: &BuildOptions,
    summary: &mut BuildSummary,
) -> Result<()> {
    debug!("Resolving generator {}", manifest.gvk);
    let generator = registry.resolve(manifest)?;

    for object in generator.generate(ctx)? {
        let object = object?;

        if !options.keeps(object.kind()) {
            debug!("Filtered out {}", object.key());
            summary.filtered += 1;
            continue;
        }

        if summary.emitted > 0 {
            w.write_all(DOCUMENT_SEPARATOR.as_bytes()).map_err(|e| {
                ManifoldError::Serialization(format!("failed to write separator: {}", e))
            })?;
        }
        object.write_yaml(w)?;
        summary.emitted += 1;
    }
    Ok(())
}
