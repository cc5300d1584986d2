//! YAML configuration instances.
//!
//! [`YamlEvaluator`] turns YAML documents into [`Instance`] values. Field
//! attributes are written as YAML tags on the field's value:
//!
//! ```yaml
//! secrets:
//!   database: !sops db.enc.yaml
//!   token: !sops module://creds.txt,type=text
//! env: !tag env|dev
//! blob: !binary aGVsbG8=
//! ```
//!
//! Any tag other than the reserved `!tag` and `!binary` becomes an attribute
//! named after the tag, with the scalar after it as the comma separated
//! attribute contents.
//! `!tag name|default` is replaced by the value injected for `name`.

use crate::util::fs::{absolutize, find_module_root, list_yaml_files};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use manifold_types::{
    Attribute, Evaluator, Field, Instance, LoadOptions, ManifoldError, Result, Value,
};
use serde::Deserialize;
use serde_yaml::Value as Yaml;
use std::collections::HashMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// File marking the root of a module.
pub const MODULE_MARKER: &str = "manifold.mod";

/// Load path that reads a single source from standard input.
pub const STDIN_PATH: &str = "-";

/// Top-level field naming the package of an instance.
pub const PACKAGE_FIELD: &str = "package";

const TAG_INJECTION: &str = "tag";
const TAG_BINARY: &str = "binary";

/// Evaluator for plain YAML sources.
#[derive(Debug, Clone, Copy, Default)]
pub struct YamlEvaluator;

impl YamlEvaluator {
    /// Create a new evaluator.
    pub fn new() -> Self {
        Self
    }

    /// Evaluate YAML source text into instance roots, one per document.
    pub fn evaluate(
        &self,
        source: &str,
        origin: &str,
        tags: &HashMap<String, String>,
    ) -> Result<Vec<Value>> {
        let converter = Converter { tags, origin };
        let mut roots = Vec::new();

        for document in serde_yaml::Deserializer::from_str(source) {
            let yaml = Yaml::deserialize(document).map_err(|e| {
                ManifoldError::Evaluation(format!("{}: {}", origin, e))
            })?;
            if yaml.is_null() {
                continue;
            }

            let root = converter.value(yaml)?;
            if !root.is_struct() {
                return Err(ManifoldError::Evaluation(format!(
                    "{}: instance root must be a mapping",
                    origin
                )));
            }
            roots.push(root);
        }

        Ok(roots)
    }

    fn load_source(
        &self,
        source: &str,
        origin: &str,
        dir: PathBuf,
        tags: &HashMap<String, String>,
        package: Option<&str>,
    ) -> Result<Vec<Instance>> {
        let module_root = find_module_root(&dir, MODULE_MARKER).unwrap_or_else(|| dir.clone());

        let instances = self
            .evaluate(source, origin, tags)?
            .into_iter()
            .filter(|root| matches_package(root, package))
            .map(|root| Instance {
                root,
                dir: dir.clone(),
                module_root: module_root.clone(),
            })
            .collect::<Vec<_>>();

        trace!("{} yielded {} instance(s)", origin, instances.len());
        Ok(instances)
    }
}

impl Evaluator for YamlEvaluator {
    fn load(&self, path: &Path, options: &LoadOptions) -> Result<Vec<Instance>> {
        let tags = parse_tags(&options.tags)?;
        let package = options.package.as_deref();

        if path == Path::new(STDIN_PATH) {
            debug!("Loading instances from standard input");
            let mut source = String::new();
            std::io::stdin().read_to_string(&mut source)?;
            let dir = std::env::current_dir()?;
            return self.load_source(&source, "<stdin>", dir, &tags, package);
        }

        let path = absolutize(path)?;
        let files = if path.is_dir() {
            let files = list_yaml_files(&path)?;
            if files.is_empty() {
                return Err(ManifoldError::Evaluation(format!(
                    "no YAML files found in {}",
                    path.display()
                )));
            }
            files
        } else if path.is_file() {
            vec![path.clone()]
        } else {
            return Err(ManifoldError::Evaluation(format!(
                "{} does not exist",
                path.display()
            )));
        };

        let mut instances = Vec::new();
        for file in files {
            debug!("Loading instances from {}", file.display());
            let source = std::fs::read_to_string(&file)?;
            let dir = file
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| path.clone());
            let origin = file.display().to_string();
            instances.extend(self.load_source(&source, &origin, dir, &tags, package)?);
        }

        Ok(instances)
    }
}

fn parse_tags(tags: &[String]) -> Result<HashMap<String, String>> {
    tags.iter()
        .map(|tag| match tag.split_once('=') {
            Some((name, value)) if !name.is_empty() => Ok((name.to_string(), value.to_string())),
            _ => Err(ManifoldError::Evaluation(format!(
                "invalid tag '{}', expected name=value",
                tag
            ))),
        })
        .collect()
}

fn matches_package(root: &Value, package: Option<&str>) -> bool {
    match package {
        None => true,
        Some(package) => root.get(PACKAGE_FIELD).and_then(Value::as_str) == Some(package),
    }
}

struct Converter<'a> {
    tags: &'a HashMap<String, String>,
    origin: &'a str,
}

impl Converter<'_> {
    fn field(&self, yaml: Yaml) -> Result<Field> {
        let tagged = match yaml {
            Yaml::Tagged(tagged) => *tagged,
            other => return Ok(Field::new(self.value(other)?)),
        };

        let tag = tagged.tag.to_string();
        let name = tag.trim_start_matches('!');

        match name {
            TAG_INJECTION => {
                let reference = self.scalar(tagged.value, &tag)?;
                Ok(Field::new(Value::String(self.inject(&reference)?)))
            }
            TAG_BINARY => {
                let encoded = self.scalar(tagged.value, &tag)?;
                let compact: String = encoded.split_whitespace().collect();
                let bytes = STANDARD.decode(compact).map_err(|e| {
                    ManifoldError::Evaluation(format!("{}: invalid {} value: {}", self.origin, tag, e))
                })?;
                Ok(Field::new(Value::Bytes(bytes)))
            }
            _ => match tagged.value {
                value @ (Yaml::Mapping(_) | Yaml::Sequence(_)) => {
                    Ok(Field::new(self.value(value)?).with_attribute(Attribute::new(name, "")))
                }
                scalar => {
                    let contents = self.scalar(scalar, &tag)?;
                    Ok(Field::new(Value::Null).with_attribute(Attribute::new(name, contents)))
                }
            },
        }
    }

    fn value(&self, yaml: Yaml) -> Result<Value> {
        match yaml {
            Yaml::Null => Ok(Value::Null),
            Yaml::Bool(b) => Ok(Value::Bool(b)),
            Yaml::Number(n) => self.number(n).map(Value::Number),
            Yaml::String(s) => Ok(Value::String(s)),
            Yaml::Sequence(items) => {
                let items = items
                    .into_iter()
                    .map(|item| self.value(item))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Value::from_items(items))
            }
            Yaml::Mapping(mapping) => {
                let mut fields = Vec::with_capacity(mapping.len());
                for (key, value) in mapping {
                    fields.push((self.key(key)?, self.field(value)?));
                }
                Ok(Value::from_fields(fields))
            }
            tagged @ Yaml::Tagged(_) => Ok(self.field(tagged)?.value().clone()),
        }
    }

    fn number(&self, n: serde_yaml::Number) -> Result<serde_json::Number> {
        if let Some(i) = n.as_i64() {
            return Ok(i.into());
        }
        if let Some(u) = n.as_u64() {
            return Ok(u.into());
        }
        n.as_f64()
            .and_then(serde_json::Number::from_f64)
            .ok_or_else(|| {
                ManifoldError::Evaluation(format!("{}: unsupported number {}", self.origin, n))
            })
    }

    fn key(&self, key: Yaml) -> Result<String> {
        match key {
            Yaml::String(s) => Ok(s),
            Yaml::Number(n) => Ok(n.to_string()),
            Yaml::Bool(b) => Ok(b.to_string()),
            other => Err(ManifoldError::Evaluation(format!(
                "{}: unsupported mapping key {:?}",
                self.origin, other
            ))),
        }
    }

    fn scalar(&self, yaml: Yaml, tag: &str) -> Result<String> {
        match yaml {
            Yaml::Null => Ok(String::new()),
            Yaml::Bool(b) => Ok(b.to_string()),
            Yaml::Number(n) => Ok(n.to_string()),
            Yaml::String(s) => Ok(s),
            _ => Err(ManifoldError::Evaluation(format!(
                "{}: {} expects a scalar",
                self.origin, tag
            ))),
        }
    }

    fn inject(&self, reference: &str) -> Result<String> {
        let (name, default) = match reference.split_once('|') {
            Some((name, default)) => (name.trim(), Some(default.trim())),
            None => (reference.trim(), None),
        };

        match (self.tags.get(name), default) {
            (Some(value), _) => Ok(value.clone()),
            (None, Some(default)) => Ok(default.to_string()),
            (None, None) => Err(ManifoldError::Evaluation(format!(
                "{}: tag '{}' is not set",
                self.origin, name
            ))),
        }
    }
}
