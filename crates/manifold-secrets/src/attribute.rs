//! The `sops` field attribute.

use manifold_types::Attribute;
use std::path::{Component, Path, PathBuf};

/// Name of the attribute marking a field for decryption.
pub const SOPS_ATTRIBUTE: &str = "sops";

/// Prefix resolving a filename against the module root.
pub const MODULE_PREFIX: &str = "module://";

/// Parsed `sops` attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SopsConfig {
    /// File to decrypt, possibly `module://`-prefixed
    pub filename: String,
    /// Keep the plaintext as a string instead of parsing it
    pub text_mode: bool,
}

impl SopsConfig {
    /// Find and parse the first `sops` attribute among `attributes`.
    ///
    /// The first positional argument is the filename. If the argument list
    /// cannot be parsed, the raw attribute contents are used as the filename.
    pub fn from_attributes(attributes: &[Attribute]) -> Option<Self> {
        let attribute = attributes.iter().find(|a| a.name() == SOPS_ATTRIBUTE)?;

        match attribute.string(0) {
            Ok(filename) => {
                let text_mode = matches!(
                    attribute.lookup(1, "type"),
                    Ok(Some(ref kind)) if kind == "text"
                );
                Some(Self {
                    filename,
                    text_mode,
                })
            }
            Err(_) => Some(Self {
                filename: attribute.contents().to_string(),
                text_mode: false,
            }),
        }
    }

    /// Path of the file to decrypt.
    ///
    /// `module://` names resolve against `module_root`, everything else
    /// against `instance_dir`. Absolute names are joined too.
    pub fn resolve_path(&self, instance_dir: &Path, module_root: &Path) -> PathBuf {
        match self.filename.strip_prefix(MODULE_PREFIX) {
            Some(relative) => join_under(module_root, relative),
            None => join_under(instance_dir, &self.filename),
        }
    }
}

fn join_under(base: &Path, name: &str) -> PathBuf {
    let mut path = base.to_path_buf();
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => path.push(part),
            Component::ParentDir => {
                path.pop();
            }
            Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
        }
    }
    path
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(contents: &str) -> Option<SopsConfig> {
        SopsConfig::from_attributes(&[Attribute::new(SOPS_ATTRIBUTE, contents)])
    }

    #[test]
    fn test_parse_filename_and_type() {
        assert_eq!(
            config("creds.txt,type=text"),
            Some(SopsConfig {
                filename: "creds.txt".to_string(),
                text_mode: true
            })
        );
        assert_eq!(config("db.yaml").map(|c| c.text_mode), Some(false));
        assert_eq!(config("db.yaml,type=yaml").map(|c| c.text_mode), Some(false));
        assert_eq!(
            config("\"with,comma.txt\"").map(|c| c.filename),
            Some("with,comma.txt".to_string())
        );
    }

    #[test]
    fn test_unparseable_contents_fall_back_to_raw() {
        assert_eq!(
            config("\"unterminated").map(|c| c.filename),
            Some("\"unterminated".to_string())
        );
    }

    #[test]
    fn test_other_attributes_are_ignored() {
        let attributes = [Attribute::new("doc", "x"), Attribute::new("sops", "a.json")];
        assert_eq!(
            SopsConfig::from_attributes(&attributes).map(|c| c.filename),
            Some("a.json".to_string())
        );
        assert_eq!(SopsConfig::from_attributes(&[Attribute::new("doc", "x")]), None);
    }

    #[test]
    fn test_resolve_path() {
        let instance = Path::new("/repo/envs/prod");
        let module = Path::new("/repo");

        let resolve = |name: &str| {
            SopsConfig {
                filename: name.to_string(),
                text_mode: false,
            }
            .resolve_path(instance, module)
        };

        assert_eq!(resolve("module://creds.txt"), PathBuf::from("/repo/creds.txt"));
        assert_eq!(resolve("secrets/db.yaml"), PathBuf::from("/repo/envs/prod/secrets/db.yaml"));
        assert_eq!(resolve("/etc/key.json"), PathBuf::from("/repo/envs/prod/etc/key.json"));
        assert_eq!(resolve("../shared.yaml"), PathBuf::from("/repo/envs/shared.yaml"));
    }
}
