//! Cached HTTP fetching of raw resources.

use manifold_types::{ManifoldError, ResourceFetcher, Result};
use reqwest::StatusCode;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Fetches remote resources and keeps a copy on disk.
///
/// Entries are keyed by URL and never expire: once a URL has been fetched,
/// later runs read the cached copy without touching the network.
pub struct HttpFetcher {
    cache_dir: PathBuf,
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    /// Create a fetcher caching under `cache_dir`.
    pub fn new(cache_dir: impl AsRef<Path>) -> Result<Self> {
        Ok(Self {
            cache_dir: cache_dir.as_ref().to_path_buf(),
            client: crate::http_client()?,
        })
    }

    /// Cache key for a URL: the hex form of the first 8 bytes of its SHA-256.
    pub fn cache_key(url: &str) -> String {
        let digest = Sha256::digest(url.as_bytes());
        hex::encode(&digest[..8])
    }

    /// Location of the cache entry for a URL.
    pub fn cache_path(&self, url: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.yaml", Self::cache_key(url)))
    }

    fn download(&self, url: &str) -> Result<Vec<u8>> {
        info!("Fetching {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| ManifoldError::Fetch(format!("when fetching {}: {}", url, e)))?;

        if response.status() != StatusCode::OK {
            return Err(ManifoldError::Fetch(format!(
                "failed to fetch {}: status {}",
                url,
                response.status().as_u16()
            )));
        }

        let bytes = response
            .bytes()
            .map_err(|e| ManifoldError::Fetch(format!("when reading {}: {}", url, e)))?;
        Ok(bytes.to_vec())
    }

    fn store(&self, path: &Path, data: &[u8]) -> Result<()> {
        let mut file = tempfile::NamedTempFile::new_in(&self.cache_dir)?;
        file.write_all(data)?;
        file.persist(path)
            .map_err(|e| ManifoldError::Fetch(format!("when caching {}: {}", path.display(), e)))?;
        Ok(())
    }
}

impl ResourceFetcher for HttpFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        fs::create_dir_all(&self.cache_dir).map_err(|e| {
            ManifoldError::Fetch(format!(
                "when creating cache directory {}: {}",
                self.cache_dir.display(),
                e
            ))
        })?;

        let cache_path = self.cache_path(url);
        if cache_path.exists() {
            debug!("Using cached copy of {} at {}", url, cache_path.display());
            return fs::read(&cache_path).map_err(|e| {
                ManifoldError::Fetch(format!("when reading cached {}: {}", url, e))
            });
        }

        let data = self.download(url)?;
        self.store(&cache_path, &data)?;
        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_key() {
        assert_eq!(
            HttpFetcher::cache_key("https://example.com/app.yaml"),
            "4ff67eedea1b1437"
        );
        assert_eq!(
            HttpFetcher::cache_key("https://raw.githubusercontent.com/org/repo/main/crds.yaml"),
            "b61abdd9215764b0"
        );
    }

    #[test]
    fn test_cached_entry_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = HttpFetcher::new(dir.path()).unwrap();
        // Unroutable; only reachable if the cache were bypassed.
        let url = "http://127.0.0.1:9/never.yaml";

        let path = fetcher.cache_path(url);
        fs::write(&path, "kind: ConfigMap\n").unwrap();

        assert_eq!(fetcher.fetch(url).unwrap(), b"kind: ConfigMap\n");
        assert_eq!(fetcher.fetch(url).unwrap(), b"kind: ConfigMap\n");
    }

    #[test]
    fn test_unreachable_url_fails_without_cache_entry() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = HttpFetcher::new(dir.path().join("resources")).unwrap();
        let url = "http://127.0.0.1:9/missing.yaml";

        assert!(matches!(fetcher.fetch(url), Err(ManifoldError::Fetch(_))));
        assert!(!fetcher.cache_path(url).exists());
    }
}
