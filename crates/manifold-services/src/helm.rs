//! Helm chart download and rendering.
//!
//! Charts from HTTP repositories are resolved through the repository's
//! `index.yaml` and unpacked from their `.tgz` archive. Charts in OCI
//! registries are pulled with the `helm` binary. Rendering always shells out
//! to `helm template`.

use flate2::read::GzDecoder;
use manifold_core::util::data::{is_blank_document, split_documents};
use manifold_core::util::Tool;
use manifold_types::{
    ChartFetcher, ChartRef, ChartRenderer, ChartSource, ManifoldError, Release, Result,
};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tar::Archive;
use tracing::{debug, info};
use url::Url;

/// Normalised cache directory name of a chart.
///
/// Repository and chart name are joined as a slash-separated path and
/// cleaned, then every `:/`, `.`, `/` and `:` becomes `-`, and the version is
/// appended after a final `-`.
pub fn extract_path(chart: &ChartRef) -> String {
    let joined = join_clean(&[&chart.repository, &chart.chart_name]);

    let mut out = String::with_capacity(joined.len() + chart.version.len() + 1);
    let mut chars = joined.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            ':' if chars.peek() == Some(&'/') => {
                chars.next();
                out.push('-');
            }
            '.' | '/' | ':' => out.push('-'),
            other => out.push(other),
        }
    }

    out.push('-');
    out.push_str(&chart.version);
    out
}

fn join_clean(parts: &[&str]) -> String {
    let joined = parts
        .iter()
        .filter(|p| !p.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("/");
    if joined.is_empty() {
        return joined;
    }

    let rooted = joined.starts_with('/');
    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => match segments.last() {
                Some(last) if *last != ".." => {
                    segments.pop();
                }
                _ if !rooted => segments.push(".."),
                _ => {}
            },
            other => segments.push(other),
        }
    }

    let body = segments.join("/");
    if rooted {
        format!("/{}", body)
    } else if body.is_empty() {
        ".".to_string()
    } else {
        body
    }
}

#[derive(Debug, Deserialize)]
struct IndexFile {
    #[serde(default)]
    entries: HashMap<String, Vec<IndexEntry>>,
}

#[derive(Debug, Deserialize)]
struct IndexEntry {
    version: String,
    #[serde(default)]
    urls: Vec<String>,
}

/// Downloads charts into a persistent cache.
///
/// A chart already present in the cache is reused without any network
/// access.
pub struct HelmChartFetcher {
    cache_dir: PathBuf,
    client: reqwest::blocking::Client,
    helm: Tool,
}

impl HelmChartFetcher {
    /// Create a fetcher caching under `cache_dir`, pulling OCI charts with
    /// the `helm` binary at `helm_binary`.
    pub fn new(cache_dir: impl AsRef<Path>, helm_binary: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            cache_dir: cache_dir.as_ref().to_path_buf(),
            client: crate::http_client()?,
            helm: Tool::new("helm", helm_binary),
        })
    }

    /// Directory the chart is (or will be) unpacked to.
    pub fn chart_dir(&self, chart: &ChartRef) -> PathBuf {
        let base = self.cache_dir.join(extract_path(chart));
        match chart.source() {
            ChartSource::Oci => {
                let name = chart
                    .repository
                    .trim_end_matches('/')
                    .rsplit('/')
                    .next()
                    .unwrap_or_default();
                base.join(name)
            }
            _ => base.join(&chart.chart_name),
        }
    }

    /// Resolve the archive URL of a chart in an HTTP repository.
    pub fn chart_url(&self, chart: &ChartRef) -> Result<Url> {
        let repository = Url::parse(&format!("{}/", chart.repository.trim_end_matches('/')))
            .map_err(|e| {
                ManifoldError::Fetch(format!("invalid repository '{}': {}", chart.repository, e))
            })?;
        let index_url = repository
            .join("index.yaml")
            .map_err(|e| ManifoldError::Fetch(e.to_string()))?;

        debug!("Downloading repository index {}", index_url);
        let body = self.get(index_url.as_str())?;
        let index: IndexFile = serde_yaml::from_slice(&body).map_err(|e| {
            ManifoldError::Fetch(format!(
                "loading repository '{}' index file: {}",
                chart.repository, e
            ))
        })?;

        let entry = resolve_version(&index, chart)?;
        let first = entry.urls.first().ok_or_else(|| {
            ManifoldError::Fetch(format!(
                "chart '{}' version '{}' has no downloadable URLs",
                chart.chart_name, entry.version
            ))
        })?;

        repository
            .join(first)
            .map_err(|e| ManifoldError::Fetch(format!("resolving chart URL '{}': {}", first, e)))
    }

    fn get(&self, url: &str) -> Result<Vec<u8>> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| ManifoldError::Fetch(format!("when fetching {}: {}", url, e)))?;
        if !response.status().is_success() {
            return Err(ManifoldError::Fetch(format!(
                "failed to fetch {}: status {}",
                url,
                response.status().as_u16()
            )));
        }
        response
            .bytes()
            .map(|b| b.to_vec())
            .map_err(|e| ManifoldError::Fetch(format!("when reading {}: {}", url, e)))
    }

    fn pull_http(&self, chart: &ChartRef, target: &Path) -> Result<()> {
        let url = self.chart_url(chart)?;
        info!("Downloading chart {}", url);
        let archive = self.get(url.as_str())?;

        // Unpack next to the target and move into place once complete.
        let staging = tempfile::tempdir_in(&self.cache_dir)?;
        Archive::new(GzDecoder::new(archive.as_slice()))
            .unpack(staging.path())
            .map_err(|e| ManifoldError::Fetch(format!("extracting {}: {}", url, e)))?;

        let top = chart.chart_name.rsplit('/').next().unwrap_or_default();
        let unpacked = staging.path().join(top);
        if !unpacked.is_dir() {
            return Err(ManifoldError::Fetch(format!(
                "archive {} does not contain chart directory '{}'",
                url, top
            )));
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::rename(&unpacked, target)?;
        Ok(())
    }

    fn pull_oci(&self, chart: &ChartRef) -> Result<()> {
        info!("Pulling chart {}", chart.repository);
        let mut args = vec![
            "pull".to_string(),
            chart.repository.clone(),
            "--untar".to_string(),
            "--destination".to_string(),
            self.cache_dir.display().to_string(),
            "--untardir".to_string(),
            extract_path(chart),
        ];
        if !chart.version.is_empty() {
            args.push("--version".to_string());
            args.push(chart.version.clone());
        }
        self.helm.run(&args)?;
        Ok(())
    }
}

fn resolve_version<'a>(index: &'a IndexFile, chart: &ChartRef) -> Result<&'a IndexEntry> {
    let versions = index.entries.get(&chart.chart_name).ok_or_else(|| {
        ManifoldError::Fetch(format!(
            "chart '{}' not found in repository '{}'",
            chart.chart_name, chart.repository
        ))
    })?;

    let found = if chart.version.is_empty() {
        versions.first()
    } else {
        versions.iter().find(|v| {
            v.version == chart.version || v.version.trim_start_matches('v') == chart.version
        })
    };

    found.ok_or_else(|| {
        ManifoldError::Fetch(format!(
            "getting chart '{}' version '{}': no such version",
            chart.repository, chart.version
        ))
    })
}

impl ChartFetcher for HelmChartFetcher {
    fn fetch_chart(&self, chart: &ChartRef) -> Result<PathBuf> {
        let source = chart.source();
        if source == ChartSource::Local {
            return Ok(PathBuf::from(&chart.repository));
        }

        let target = self.chart_dir(chart);
        if target.exists() {
            debug!("Using cached chart at {}", target.display());
            return Ok(target);
        }

        fs::create_dir_all(&self.cache_dir)?;
        match source {
            ChartSource::Oci => self.pull_oci(chart)?,
            _ => self.pull_http(chart, &target)?,
        }

        if !target.exists() {
            return Err(ManifoldError::Fetch(format!(
                "chart was pulled but {} does not exist",
                target.display()
            )));
        }
        Ok(target)
    }
}

/// Default release name of `helm template`.
pub const DEFAULT_RELEASE_NAME: &str = "release-name";

const SOURCE_HEADER: &str = "# Source: ";

/// Renders charts with `helm template`.
pub struct HelmCli {
    helm: Tool,
}

impl HelmCli {
    /// Create a renderer using the `helm` binary at `binary`.
    pub fn new(binary: impl AsRef<Path>) -> Self {
        Self {
            helm: Tool::new("helm", binary),
        }
    }

    fn args(chart_dir: &Path, release: &Release, values_file: &Path) -> Vec<String> {
        let name = if release.name.is_empty() {
            DEFAULT_RELEASE_NAME
        } else {
            release.name.as_str()
        };

        let mut args = vec![
            "template".to_string(),
            name.to_string(),
            chart_dir.display().to_string(),
            "--values".to_string(),
            values_file.display().to_string(),
        ];
        if !release.namespace.is_empty() {
            args.push("--namespace".to_string());
            args.push(release.namespace.clone());
        }
        if release.include_crds {
            args.push("--include-crds".to_string());
        }
        if let Some(kube_version) = &release.kube_version {
            args.push("--kube-version".to_string());
            args.push(kube_version.clone());
        }
        for api_version in &release.api_versions {
            args.push("--api-versions".to_string());
            args.push(api_version.clone());
        }
        args
    }
}

impl ChartRenderer for HelmCli {
    fn render(&self, chart_dir: &Path, release: &Release) -> Result<BTreeMap<String, String>> {
        let mut values_file = tempfile::Builder::new()
            .prefix("manifold-values-")
            .suffix(".yaml")
            .tempfile()?;
        values_file.write_all(&serde_json::to_vec(&release.values)?)?;
        values_file.flush()?;

        debug!("Rendering chart {} as release {}", chart_dir.display(), release.name);
        let output = self
            .helm
            .run(Self::args(chart_dir, release, values_file.path()))?;
        let output = String::from_utf8(output).map_err(|e| ManifoldError::Tool {
            tool: "helm".to_string(),
            message: format!("output is not valid UTF-8: {}", e),
        })?;

        Ok(split_rendered(&output))
    }
}

/// Group `helm template` output by template path.
///
/// Notes, blank documents, and partial templates (base name starting with
/// `_`) are dropped.
pub fn split_rendered(output: &str) -> BTreeMap<String, String> {
    let mut templates: BTreeMap<String, String> = BTreeMap::new();

    for document in split_documents(output) {
        if is_blank_document(document) {
            continue;
        }

        let source = document
            .lines()
            .find_map(|line| line.strip_prefix(SOURCE_HEADER))
            .map(str::trim)
            .unwrap_or("manifest");
        if !keep_template(source) {
            continue;
        }

        let entry = templates.entry(source.to_string()).or_default();
        if !entry.is_empty() {
            entry.push_str(manifold_core::util::data::DOCUMENT_SEPARATOR);
        }
        entry.push_str(document);
        if !document.ends_with('\n') {
            entry.push('\n');
        }
    }

    templates
}

/// Whether a rendered template should become objects.
pub fn keep_template(path: &str) -> bool {
    if path.ends_with("NOTES.txt") {
        return false;
    }
    let base = path.rsplit('/').next().unwrap_or(path);
    !base.starts_with('_')
}
