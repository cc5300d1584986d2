//! From evaluated instances to generator manifests.

use crate::generator::{manifests_from_value, GeneratorManifest};
use manifold_secrets::{inject, SecretContext};
use manifold_types::{Instance, Path, Result, SecretResolver};
use tracing::debug;

/// Where an instance keeps its generators and secrets.
#[derive(Debug, Clone)]
pub struct InstanceFields {
    /// Path of the generators field
    pub generators: Path,
    /// Path of the secrets root
    pub secrets: Path,
}

impl Default for InstanceFields {
    fn default() -> Self {
        Self {
            generators: Path::parse("generators"),
            secrets: Path::parse("secrets"),
        }
    }
}

/// Inject secrets into `instance`, then extract its generator manifests.
pub fn manifests_for_instance(
    instance: &Instance,
    fields: &InstanceFields,
    resolver: &dyn SecretResolver,
) -> Result<Vec<GeneratorManifest>> {
    let ctx = SecretContext {
        instance_dir: &instance.dir,
        module_root: &instance.module_root,
        resolver,
    };

    let root = inject(&instance.root, &fields.secrets, &ctx)?;
    let manifests = manifests_from_value(&root, &fields.generators, &instance.dir)?;
    debug!(
        "Instance {} declares {} generator(s)",
        instance.dir.display(),
        manifests.len()
    );
    Ok(manifests)
}

/// Manifests of every instance, in order.
pub fn manifests_for_instances(
    instances: &[Instance],
    fields: &InstanceFields,
    resolver: &dyn SecretResolver,
) -> Result<Vec<GeneratorManifest>> {
    let mut manifests = Vec::new();
    for instance in instances {
        manifests.extend(manifests_for_instance(instance, fields, resolver)?);
    }
    Ok(manifests)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::{run, BuildOptions};
    use crate::objects::tests::unused_context;
    use crate::registry::GeneratorRegistry;
    use manifold_types::{Attribute, Field, ManifoldError, Value};
    use mockall::mock;
    use serde_json::json;
    use std::path::{Path as FsPath, PathBuf};

    mock! {
        pub Resolver {}
        impl SecretResolver for Resolver {
            fn decrypt(&self, path: &FsPath, text_mode: bool) -> Result<Vec<u8>>;
        }
    }

    fn instance(root: Value) -> Instance {
        Instance {
            root,
            dir: PathBuf::from("/repo/envs/prod"),
            module_root: PathBuf::from("/repo"),
        }
    }

    /// Root with one sops-marked secret and one Objects generator.
    fn root_with_secret(token: Value) -> Value {
        let secrets = Value::from_fields([(
            "token".to_string(),
            Field::new(token).with_attribute(Attribute::new("sops", "module://creds.txt,type=text")),
        )]);
        let generators = Value::from(json!([{
            "apiVersion": "manifold.dev/v1alpha1",
            "kind": "Objects",
            "spec": {"objects": [{"apiVersion": "v1", "kind": "ConfigMap", "metadata": {"name": "a"}}]}
        }]));
        Value::from_fields([
            ("secrets".to_string(), Field::new(secrets)),
            ("generators".to_string(), Field::new(generators)),
        ])
    }

    #[test]
    fn test_secrets_are_injected_before_extraction() {
        let mut resolver = MockResolver::new();
        resolver
            .expect_decrypt()
            .withf(|path, text_mode| path == FsPath::new("/repo/creds.txt") && *text_mode)
            .times(1)
            .returning(|_, _| Ok(b"s3cret".to_vec()));

        let inst = instance(root_with_secret(Value::Null));
        let manifests =
            manifests_for_instance(&inst, &InstanceFields::default(), &resolver).unwrap();
        assert_eq!(manifests.len(), 1);
        assert_eq!(manifests[0].instance_dir, PathBuf::from("/repo/envs/prod"));

        let registry = GeneratorRegistry::standard();
        let ctx = unused_context();
        let mut out = Vec::new();
        run(&mut out, &manifests, &registry, &ctx, &BuildOptions::default()).unwrap();
        assert!(String::from_utf8(out).unwrap().contains("name: a"));
    }

    #[test]
    fn test_secret_failure_stops_extraction() {
        let mut resolver = MockResolver::new();
        resolver
            .expect_decrypt()
            .returning(|_, _| Err(ManifoldError::Secret("no key".to_string())));

        let inst = instance(root_with_secret(Value::Null));
        let err = manifests_for_instance(&inst, &InstanceFields::default(), &resolver).unwrap_err();
        assert!(err.to_string().contains("in field token"));
    }

    #[test]
    fn test_custom_fields_and_many_instances() {
        let mut resolver = MockResolver::new();
        resolver.expect_decrypt().times(0);

        let root = Value::from(json!({"app": {"gens": [
            {"apiVersion": "manifold.dev/v1alpha1", "kind": "Objects", "spec": {"objects": []}}
        ]}}));
        let fields = InstanceFields {
            generators: Path::parse("app.gens"),
            secrets: Path::parse("app.secrets"),
        };

        let instances = [instance(root.clone()), instance(root)];
        let manifests = manifests_for_instances(&instances, &fields, &resolver).unwrap();
        assert_eq!(manifests.len(), 2);
    }
}
