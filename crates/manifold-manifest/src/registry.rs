//! Mapping from generator type to constructor.

use crate::generator::{Generator, GeneratorManifest};
use manifold_types::{GroupVersionKind, ManifoldError, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Builds a generator from its manifest.
pub type Constructor =
    Arc<dyn Fn(&GeneratorManifest) -> Result<Box<dyn Generator>> + Send + Sync>;

/// Generator constructors keyed by type.
///
/// Built once by the composition root and passed by reference to the build.
pub struct GeneratorRegistry {
    constructors: RwLock<HashMap<GroupVersionKind, Constructor>>,
}

impl GeneratorRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            constructors: RwLock::new(HashMap::new()),
        }
    }

    /// A registry with the built-in `Bundle` and `Objects` generators.
    pub fn standard() -> Self {
        let registry = Self::new();
        crate::bundle::register(&registry);
        crate::objects::register(&registry);
        registry
    }

    /// Bind `constructor` to `gvk`.
    ///
    /// # Panics
    ///
    /// Panics if a constructor is already registered for `gvk`.
    pub fn register<F>(&self, gvk: GroupVersionKind, constructor: F)
    where
        F: Fn(&GeneratorManifest) -> Result<Box<dyn Generator>> + Send + Sync + 'static,
    {
        let mut constructors = self.constructors.write();
        if constructors.contains_key(&gvk) {
            panic!("generator already registered for {}", gvk);
        }
        debug!("Registered generator {}", gvk);
        constructors.insert(gvk, Arc::new(constructor));
    }

    /// Whether a constructor is registered for `gvk`.
    pub fn contains(&self, gvk: &GroupVersionKind) -> bool {
        self.constructors.read().contains_key(gvk)
    }

    /// Registered types, sorted.
    pub fn kinds(&self) -> Vec<GroupVersionKind> {
        let mut kinds: Vec<_> = self.constructors.read().keys().cloned().collect();
        kinds.sort();
        kinds
    }

    /// Construct the generator for `manifest`.
    pub fn resolve(&self, manifest: &GeneratorManifest) -> Result<Box<dyn Generator>> {
        let constructor = self
            .constructors
            .read()
            .get(&manifest.gvk)
            .cloned()
            .ok_or_else(|| ManifoldError::UnknownGeneratorType(manifest.gvk.to_string()))?;

        constructor(manifest).map_err(|e| match e {
            ManifoldError::InvalidSpec(_) => e,
            other => ManifoldError::InvalidSpec(other.to_string()),
        })
    }
}

impl Default for GeneratorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{GenerateContext, ObjectIter};
    use manifold_types::{api, Value};
    use std::path::PathBuf;

    struct Empty;

    impl Generator for Empty {
        fn generate<'a>(&'a self, _ctx: &'a GenerateContext<'a>) -> Result<ObjectIter<'a>> {
            Ok(Box::new(std::iter::empty()))
        }
    }

    fn manifest(gvk: GroupVersionKind) -> GeneratorManifest {
        GeneratorManifest {
            gvk,
            spec: Value::Null,
            instance_dir: PathBuf::from("."),
        }
    }

    #[test]
    fn test_standard_registry() {
        let registry = GeneratorRegistry::standard();
        assert_eq!(registry.kinds(), vec![api::bundle_gvk(), api::objects_gvk()]);
    }

    #[test]
    fn test_unknown_generator() {
        let registry = GeneratorRegistry::new();
        let gvk = GroupVersionKind::new("example.com", "v1", "Nope");
        let err = registry.resolve(&manifest(gvk)).err().unwrap();
        assert!(matches!(err, ManifoldError::UnknownGeneratorType(_)));
        assert_eq!(err.to_string(), "generator for example.com/v1, Kind=Nope not found");
    }

    #[test]
    fn test_constructor_failure_is_invalid_spec() {
        let registry = GeneratorRegistry::new();
        let gvk = GroupVersionKind::new("example.com", "v1", "Broken");
        registry.register(gvk.clone(), |_| Err(ManifoldError::Decode("bad field".to_string())));

        let err = registry.resolve(&manifest(gvk)).err().unwrap();
        assert!(matches!(err, ManifoldError::InvalidSpec(_)));
        assert!(err.to_string().contains("bad field"));
    }

    #[test]
    fn test_resolve_registered() {
        let registry = GeneratorRegistry::new();
        let gvk = GroupVersionKind::new("example.com", "v1", "Empty");
        registry.register(gvk.clone(), |_| Ok(Box::new(Empty)));
        assert!(registry.contains(&gvk));
        assert!(registry.resolve(&manifest(gvk)).is_ok());
    }

    #[test]
    #[should_panic(expected = "already registered")]
    fn test_duplicate_registration_panics() {
        let registry = GeneratorRegistry::new();
        let gvk = GroupVersionKind::new("example.com", "v1", "Empty");
        registry.register(gvk.clone(), |_| Ok(Box::new(Empty)));
        registry.register(gvk, |_| Ok(Box::new(Empty)));
    }
}
