//! Secret decryption through the `sops` binary.

use manifold_core::util::fs::{is_json_file, is_yaml_file};
use manifold_core::util::Tool;
use manifold_types::{ManifoldError, Result, SecretResolver};
use std::ffi::OsStr;
use std::path::Path;
use tracing::debug;

/// Decrypts files with `sops --decrypt`.
pub struct SopsCli {
    sops: Tool,
}

impl SopsCli {
    /// Create a resolver using the `sops` binary at `binary`.
    pub fn new(binary: impl AsRef<Path>) -> Self {
        Self {
            sops: Tool::new("sops", binary),
        }
    }
}

/// Store format sops should use for a file, chosen by extension.
pub fn file_format(path: &Path) -> &'static str {
    if is_yaml_file(path) {
        "yaml"
    } else if is_json_file(path) {
        "json"
    } else {
        "binary"
    }
}

impl SecretResolver for SopsCli {
    fn decrypt(&self, path: &Path, text_mode: bool) -> Result<Vec<u8>> {
        let format = file_format(path);
        debug!("Decrypting {} as {} (text mode: {})", path.display(), format, text_mode);

        self.sops
            .run([
                OsStr::new("--decrypt"),
                OsStr::new("--input-type"),
                OsStr::new(format),
                OsStr::new("--output-type"),
                OsStr::new(format),
                path.as_os_str(),
            ])
            .map_err(|e| {
                ManifoldError::Secret(format!("failed to decrypt sops file {}: {}", path.display(), e))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_format() {
        assert_eq!(file_format(Path::new("secrets.enc.yaml")), "yaml");
        assert_eq!(file_format(Path::new("secrets.yml")), "yaml");
        assert_eq!(file_format(Path::new("creds.json")), "json");
        assert_eq!(file_format(Path::new("creds.txt")), "binary");
        assert_eq!(file_format(Path::new("key")), "binary");
    }

    #[test]
    fn test_missing_binary_is_a_secret_error() {
        let sops = SopsCli::new("/no/such/sops");
        let err = sops.decrypt(Path::new("x.yaml"), false).unwrap_err();
        assert!(matches!(err, ManifoldError::Secret(_)));
        assert!(err.to_string().contains("x.yaml"));
    }
}
