//! The `Objects` generator: literal documents embedded in configuration.

use crate::generator::{GenerateContext, Generator, GeneratorManifest, ObjectIter};
use crate::object::Object;
use crate::registry::GeneratorRegistry;
use manifold_types::{api, ManifoldError, Result, ResultExt, Value};
use std::sync::Arc;

/// Field of the `spec` mapping holding the documents.
pub const OBJECTS_FIELD: &str = "objects";

/// Emits each entry of `spec.objects` as a document.
#[derive(Debug, Clone)]
pub struct ObjectsGenerator {
    objects: Vec<Arc<Value>>,
}

impl ObjectsGenerator {
    /// Build from a manifest. `spec.objects` must be a list.
    pub fn from_manifest(manifest: &GeneratorManifest) -> Result<Self> {
        match manifest.spec.get(OBJECTS_FIELD) {
            Some(Value::List(items)) => Ok(Self {
                objects: items.clone(),
            }),
            Some(_) => Err(ManifoldError::InvalidSpec(format!(
                "'{}' must be a list",
                OBJECTS_FIELD
            ))),
            None => Err(ManifoldError::InvalidSpec(format!(
                "failed to lookup {}",
                OBJECTS_FIELD
            ))),
        }
    }
}

impl Generator for ObjectsGenerator {
    fn generate<'a>(&'a self, _ctx: &'a GenerateContext<'a>) -> Result<ObjectIter<'a>> {
        // The sequence ends with its first error.
        let mut failed = false;
        Ok(Box::new(self.objects.iter().enumerate().map_while(
            move |(index, value)| {
                if failed {
                    return None;
                }
                let object = Object::from_json(value.to_json())
                    .with_context(|| format!("object #{}", index));
                failed = object.is_err();
                Some(object)
            },
        )))
    }
}

/// Register the `Objects` generator.
pub fn register(registry: &GeneratorRegistry) {
    registry.register(api::objects_gvk(), |manifest| {
        Ok(Box::new(ObjectsGenerator::from_manifest(manifest)?))
    });
}
