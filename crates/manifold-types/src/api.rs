//! Generator API types (`manifold.dev/v1alpha1`).

use crate::identifiers::GroupVersionKind;
use crate::traits::{ChartRef, Release};
use serde::{Deserialize, Deserializer, Serialize};

/// API group of the built-in generators.
pub const GROUP: &str = "manifold.dev";

/// API version of the built-in generators.
pub const VERSION: &str = "v1alpha1";

/// Kind of the aggregating generator.
pub const BUNDLE_KIND: &str = "Bundle";

/// Kind of the literal-objects generator.
pub const OBJECTS_KIND: &str = "Objects";

/// Type identifier of the `Bundle` generator.
pub fn bundle_gvk() -> GroupVersionKind {
    GroupVersionKind::new(GROUP, VERSION, BUNDLE_KIND)
}

/// Type identifier of the `Objects` generator.
pub fn objects_gvk() -> GroupVersionKind {
    GroupVersionKind::new(GROUP, VERSION, OBJECTS_KIND)
}

/// Decode an explicit null as the type's default, like a missing key.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Spec of the `Bundle` generator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct BundleSpec {
    /// Raw manifests: files, directories, or `http(s)://` URLs
    #[serde(default, deserialize_with = "null_as_default")]
    pub resource: Vec<String>,

    /// Helm charts to render
    #[serde(default, deserialize_with = "null_as_default")]
    pub helm: Vec<HelmChart>,

    /// Options shared by all charts
    #[serde(default, deserialize_with = "null_as_default")]
    pub helm_options: HelmOptions,

    /// Kustomization applied to everything collected above
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kustomize: Option<serde_json::Value>,
}

impl BundleSpec {
    /// The kustomization, if one with any content was given.
    pub fn kustomization(&self) -> Option<&serde_json::Value> {
        self.kustomize.as_ref().filter(|k| match k {
            serde_json::Value::Null => false,
            serde_json::Value::Object(map) => !map.is_empty(),
            _ => true,
        })
    }
}

/// A Helm chart to render.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HelmChart {
    /// Helm release name
    #[serde(default, deserialize_with = "null_as_default")]
    pub release_name: String,

    /// Repository: `oci://…`, `http(s)://…`, or a path relative to the instance
    pub repository: String,

    /// Chart name within the repository
    #[serde(default, deserialize_with = "null_as_default")]
    pub chart_name: String,

    /// Chart version
    #[serde(default, deserialize_with = "null_as_default")]
    pub version: String,

    /// Release namespace
    #[serde(default, deserialize_with = "null_as_default")]
    pub namespace: String,

    /// Emit a `Namespace` object for `namespace`
    #[serde(default, deserialize_with = "null_as_default")]
    pub create_namespace: bool,

    /// Chart values
    #[serde(default, deserialize_with = "null_as_default")]
    pub values: serde_json::Map<String, serde_json::Value>,

    /// Equivalent of `helm template --include-crds`
    #[serde(default, rename = "includeCRDs", deserialize_with = "null_as_default")]
    pub include_crds: bool,
}

impl HelmChart {
    /// Reference used to locate the chart.
    pub fn chart_ref(&self) -> ChartRef {
        ChartRef {
            repository: self.repository.clone(),
            chart_name: self.chart_name.clone(),
            version: self.version.clone(),
        }
    }

    /// Release parameters for rendering this chart.
    pub fn release(&self, options: &HelmOptions) -> Release {
        Release {
            name: self.release_name.clone(),
            namespace: self.namespace.clone(),
            include_crds: self.include_crds,
            values: self.values.clone(),
            kube_version: options.kube_version.clone().filter(|v| !v.is_empty()),
            api_versions: options.api_versions.clone(),
        }
    }
}

/// Capability overrides applied to every chart of a bundle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct HelmOptions {
    /// Kubernetes version reported to templates
    #[serde(default, deserialize_with = "null_as_default")]
    pub kube_version: Option<String>,

    /// API versions reported to templates
    #[serde(default, deserialize_with = "null_as_default")]
    pub api_versions: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bundle_spec_decoding() {
        let spec: BundleSpec = serde_json::from_value(json!({
            "resource": ["crds/", "https://example.com/app.yaml"],
            "helm": [{
                "releaseName": "web",
                "repository": "oci://ghcr.io/org/charts/web",
                "version": "1.2.3",
                "namespace": "web",
                "createNamespace": true,
                "includeCRDs": true,
                "values": {"replicas": 2}
            }],
            "helmOptions": {"kubeVersion": "1.29.0", "apiVersions": ["monitoring.coreos.com/v1"]},
            "kustomize": {"namePrefix": "prod-"}
        }))
        .unwrap();

        assert_eq!(spec.resource.len(), 2);
        assert!(spec.helm[0].include_crds);
        assert!(spec.helm[0].create_namespace);
        assert_eq!(spec.helm_options.kube_version.as_deref(), Some("1.29.0"));
        assert!(spec.kustomization().is_some());

        let release = spec.helm[0].release(&spec.helm_options);
        assert_eq!(release.name, "web");
        assert_eq!(release.values.get("replicas"), Some(&json!(2)));
        assert_eq!(release.api_versions, vec!["monitoring.coreos.com/v1"]);
    }

    #[test]
    fn test_null_fields_decode_as_empty() {
        let spec: BundleSpec = serde_json::from_value(json!({
            "resource": null,
            "helm": [{"repository": "./c", "values": null, "namespace": null}],
            "helmOptions": null
        }))
        .unwrap();

        assert!(spec.resource.is_empty());
        assert_eq!(spec.helm.len(), 1);
        assert!(spec.helm[0].values.is_empty());
        assert_eq!(spec.helm[0].namespace, "");
        assert_eq!(spec.helm_options, HelmOptions::default());

        let empty: BundleSpec = serde_json::from_value(json!({"helm": null})).unwrap();
        assert_eq!(empty, BundleSpec::default());
    }

    #[test]
    fn test_bundle_spec_rejects_unknown_fields() {
        let result: std::result::Result<BundleSpec, _> =
            serde_json::from_value(json!({"resources": ["a.yaml"]}));
        assert!(result.is_err());
    }

    #[test]
    fn test_empty_kustomization_is_skipped() {
        let spec = BundleSpec {
            kustomize: Some(json!({})),
            ..Default::default()
        };
        assert!(spec.kustomization().is_none());
        assert!(BundleSpec::default().kustomization().is_none());
    }

    #[test]
    fn test_gvks() {
        assert_eq!(bundle_gvk().api_version(), "manifold.dev/v1alpha1");
        assert_eq!(objects_gvk().kind, "Objects");
        assert_ne!(bundle_gvk(), objects_gvk());
    }
}
