//! Type identifiers for generators and identity keys for objects.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A group/version/kind triplet identifying a generator type.
///
/// The core group is represented by an empty `group`.
///
/// # Example
///
/// ```
/// use manifold_types::GroupVersionKind;
///
/// let core = GroupVersionKind::from_type_meta("v1", "ConfigMap");
/// assert_eq!(core.group, "");
/// assert_eq!(core.api_version(), "v1");
///
/// let gvk = GroupVersionKind::new("manifold.dev", "v1alpha1", "Bundle");
/// assert_eq!(gvk.to_string(), "manifold.dev/v1alpha1, Kind=Bundle");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupVersionKind {
    /// API group (empty for the core group)
    pub group: String,
    /// API version within the group
    pub version: String,
    /// Kind name
    pub kind: String,
}

impl GroupVersionKind {
    /// Create a new identifier from its parts.
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }

    /// Build an identifier from an `apiVersion` string and a kind.
    ///
    /// `apps/v1` splits into group `apps` and version `v1`; a bare `v1`
    /// belongs to the core group.
    pub fn from_type_meta(api_version: &str, kind: &str) -> Self {
        match api_version.split_once('/') {
            Some((group, version)) => Self::new(group, version, kind),
            None => Self::new("", api_version, kind),
        }
    }

    /// The `apiVersion` form of the group and version.
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

impl fmt::Display for GroupVersionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, Kind={}", self.api_version(), self.kind)
    }
}

/// Identity key of an object: `apiVersion|kind|namespace|name`.
///
/// Cluster-scoped objects have an empty namespace segment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Separator between key segments.
    pub const SEPARATOR: char = '|';

    /// Join the four identifying facets into a key.
    pub fn new(api_version: &str, kind: &str, namespace: &str, name: &str) -> Self {
        Self(format!(
            "{api_version}{sep}{kind}{sep}{namespace}{sep}{name}",
            sep = Self::SEPARATOR
        ))
    }

    /// Get the key as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for ObjectKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gvk_from_type_meta() {
        let gvk = GroupVersionKind::from_type_meta("manifold.dev/v1alpha1", "Objects");
        assert_eq!(gvk.group, "manifold.dev");
        assert_eq!(gvk.version, "v1alpha1");
        assert_eq!(gvk.kind, "Objects");
        assert_eq!(gvk.api_version(), "manifold.dev/v1alpha1");

        let core = GroupVersionKind::from_type_meta("v1", "Namespace");
        assert_eq!(core.group, "");
        assert_eq!(core.api_version(), "v1");
    }

    #[test]
    fn test_gvk_display() {
        let gvk = GroupVersionKind::new("apps", "v1", "Deployment");
        assert_eq!(gvk.to_string(), "apps/v1, Kind=Deployment");
    }

    #[test]
    fn test_object_key_display() {
        assert_eq!(
            ObjectKey::new("v1", "ConfigMap", "default", "test-cm").to_string(),
            "v1|ConfigMap|default|test-cm"
        );
        assert_eq!(
            ObjectKey::new("v1", "Namespace", "", "test-ns").as_str(),
            "v1|Namespace||test-ns"
        );
        assert_eq!(
            ObjectKey::new("custom.io/v1alpha1", "CustomResource", "prod", "my-resource").as_str(),
            "custom.io/v1alpha1|CustomResource|prod|my-resource"
        );
    }

    #[test]
    fn test_object_key_ordering() {
        let a = ObjectKey::new("v1", "ConfigMap", "", "a");
        let b = ObjectKey::new("v1", "ConfigMap", "", "b");
        assert!(a < b);
    }
}
