//! Secret injection into value trees.

use crate::attribute::SopsConfig;
use manifold_core::util::fs::{is_json_file, is_yaml_file};
use manifold_types::{Attribute, ManifoldError, Path, Result, SecretResolver, Value};
use std::path::Path as FsPath;
use tracing::debug;

/// Where secret files are resolved from and how they are decrypted.
#[derive(Clone, Copy)]
pub struct SecretContext<'a> {
    /// Directory of the instance being processed
    pub instance_dir: &'a FsPath,
    /// Root of the enclosing module
    pub module_root: &'a FsPath,
    /// Decryption backend
    pub resolver: &'a dyn SecretResolver,
}

/// Fill every `sops`-marked field under `secrets_path` of `root`.
///
/// Returns `root` unchanged when nothing is found at `secrets_path` or
/// nothing below it is marked.
pub fn inject(root: &Value, secrets_path: &Path, ctx: &SecretContext<'_>) -> Result<Value> {
    let Some(secrets) = root.lookup(secrets_path) else {
        debug!("No secrets at '{}'", secrets_path);
        return Ok(root.clone());
    };

    let (filled, changed) = fill(secrets, root.attributes_at(secrets_path), ctx)
        .map_err(|e| e.context("failed to process sops attributes"))?;

    if !changed {
        return Ok(root.clone());
    }

    root.replace(secrets_path, filled).map_err(|e| {
        ManifoldError::Secret(format!("failed to inject decrypted secrets: {}", e))
    })
}

/// Recursively replace `sops`-marked fields of `value`.
///
/// Fields are visited in declaration order. Returns the new value and
/// whether anything was replaced.
pub fn fill_secrets(value: &Value, ctx: &SecretContext<'_>) -> Result<(Value, bool)> {
    fill(value, &[], ctx)
}

fn fill(value: &Value, attributes: &[Attribute], ctx: &SecretContext<'_>) -> Result<(Value, bool)> {
    if let Some(config) = SopsConfig::from_attributes(attributes) {
        return Ok((decrypt(&config, ctx)?, true));
    }

    let Some(fields) = value.as_struct() else {
        return Ok((value.clone(), false));
    };

    let mut changed = false;
    let mut filled = fields.clone();
    for (label, field) in fields {
        let (new_value, field_changed) = fill(field.value(), field.attributes(), ctx)
            .map_err(|e| e.context(format!("in field {}", label)))?;

        if field_changed {
            filled.insert(label.clone(), field.with_value(new_value));
            changed = true;
        }
    }

    if changed {
        Ok((Value::Struct(filled), true))
    } else {
        Ok((value.clone(), false))
    }
}

fn decrypt(config: &SopsConfig, ctx: &SecretContext<'_>) -> Result<Value> {
    let path = config.resolve_path(ctx.instance_dir, ctx.module_root);
    debug!("Injecting secret from {}", path.display());

    let plaintext = ctx.resolver.decrypt(&path, config.text_mode)?;
    decode_secret(&path, plaintext, config.text_mode)
}

/// Turn decrypted file contents into a value.
///
/// Text mode and files that are neither YAML nor JSON give a string
/// (bytes, if the contents are not UTF-8). YAML and JSON files are parsed.
pub fn decode_secret(path: &FsPath, plaintext: Vec<u8>, text_mode: bool) -> Result<Value> {
    let yaml = is_yaml_file(path);
    let json = is_json_file(path);

    if text_mode || (!yaml && !json) {
        return Ok(match String::from_utf8(plaintext) {
            Ok(text) => Value::String(text),
            Err(e) => Value::Bytes(e.into_bytes()),
        });
    }

    let parsed: serde_json::Value = if yaml {
        serde_yaml::from_slice(&plaintext).map_err(|e| {
            ManifoldError::Secret(format!(
                "failed to parse decrypted yaml from {}: {}",
                path.display(),
                e
            ))
        })?
    } else {
        serde_json::from_slice(&plaintext).map_err(|e| {
            ManifoldError::Secret(format!(
                "failed to parse decrypted json from {}: {}",
                path.display(),
                e
            ))
        })?
    };

    Ok(Value::from(parsed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use manifold_types::Field;
    use mockall::mock;
    use std::sync::Arc;

    mock! {
        pub Resolver {}

        impl SecretResolver for Resolver {
            fn decrypt(&self, path: &FsPath, text_mode: bool) -> Result<Vec<u8>>;
        }
    }

    fn sops(contents: &str) -> Field {
        Field::new(Value::Null).with_attribute(Attribute::new("sops", contents))
    }

    fn plain(value: impl Into<Value>) -> Field {
        Field::new(value.into())
    }

    fn strukt(fields: Vec<(&str, Field)>) -> Value {
        Value::from_fields(fields.into_iter().map(|(k, f)| (k.to_string(), f)))
    }

    fn ctx(resolver: &MockResolver) -> SecretContext<'_> {
        SecretContext {
            instance_dir: FsPath::new("/repo/envs/prod"),
            module_root: FsPath::new("/repo"),
            resolver,
        }
    }

    #[test]
    fn test_module_text_secret() {
        let mut resolver = MockResolver::new();
        resolver
            .expect_decrypt()
            .withf(|path, text_mode| path == FsPath::new("/repo/creds.txt") && *text_mode)
            .times(1)
            .returning(|_, _| Ok(b"s3cret\n".to_vec()));

        let root = strukt(vec![
            ("name", plain("web")),
            (
                "secrets",
                Field::new(strukt(vec![("token", sops("module://creds.txt,type=text"))])),
            ),
        ]);

        let injected = inject(&root, &Path::parse("secrets"), &ctx(&resolver)).unwrap();
        assert_eq!(
            injected.lookup(&Path::parse("secrets.token")),
            Some(&Value::String("s3cret\n".to_string()))
        );
        assert_eq!(injected.get("name"), root.get("name"));
        // Attributes stay on the declaration.
        assert_eq!(
            injected.attributes_at(&Path::parse("secrets.token"))[0].name(),
            "sops"
        );
    }

    #[test]
    fn test_structured_secret_is_parsed() {
        let mut resolver = MockResolver::new();
        resolver
            .expect_decrypt()
            .withf(|path, text_mode| path == FsPath::new("/repo/envs/prod/db.enc.yaml") && !*text_mode)
            .times(1)
            .returning(|_, _| Ok(b"user: admin\npassword: hunter2\n".to_vec()));
        resolver
            .expect_decrypt()
            .withf(|path, text_mode| path == FsPath::new("/repo/envs/prod/api.json") && !*text_mode)
            .times(1)
            .returning(|_, _| Ok(br#"{"key": 42}"#.to_vec()));

        let root = strukt(vec![(
            "secrets",
            Field::new(strukt(vec![("db", sops("db.enc.yaml")), ("api", sops("api.json"))])),
        )]);

        let injected = inject(&root, &Path::parse("secrets"), &ctx(&resolver)).unwrap();
        let db = injected.lookup(&Path::parse("secrets.db")).unwrap();
        let labels: Vec<_> = db.fields().map(|(l, _)| l.to_string()).collect();
        assert_eq!(labels, vec!["user", "password"]);
        assert_eq!(
            injected.lookup(&Path::parse("secrets.api.key")),
            Some(&Value::from(serde_json::json!(42)))
        );
    }

    #[test]
    fn test_no_attributes_is_identity() {
        let mut resolver = MockResolver::new();
        resolver.expect_decrypt().times(0);

        let root = strukt(vec![(
            "secrets",
            Field::new(strukt(vec![("a", plain("x")), ("b", Field::new(strukt(vec![("c", plain("y"))])))])),
        )]);

        let injected = inject(&root, &Path::parse("secrets"), &ctx(&resolver)).unwrap();
        assert_eq!(injected, root);

        let (filled, changed) = fill_secrets(&root, &ctx(&resolver)).unwrap();
        assert!(!changed);
        assert_eq!(filled, root);
    }

    #[test]
    fn test_missing_secrets_path_is_noop() {
        let mut resolver = MockResolver::new();
        resolver.expect_decrypt().times(0);

        let root = strukt(vec![("other", sops("never.yaml"))]);
        let injected = inject(&root, &Path::parse("secrets"), &ctx(&resolver)).unwrap();
        assert_eq!(injected, root);
    }

    #[test]
    fn test_errors_name_the_field_path() {
        let mut resolver = MockResolver::new();
        resolver
            .expect_decrypt()
            .returning(|_, _| Err(ManifoldError::Secret("no key available".to_string())));

        let root = strukt(vec![(
            "secrets",
            Field::new(strukt(vec![("outer", Field::new(strukt(vec![("inner", sops("x.yaml"))])))])),
        )]);

        let err = inject(&root, &Path::parse("secrets"), &ctx(&resolver)).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("in field outer"));
        assert!(message.contains("in field inner"));
        assert!(message.contains("no key available"));
        assert!(matches!(err.root(), ManifoldError::Secret(_)));
    }

    #[test]
    fn test_attribute_on_secrets_field_itself() {
        let mut resolver = MockResolver::new();
        resolver
            .expect_decrypt()
            .times(1)
            .returning(|_, _| Ok(b"a: 1\n".to_vec()));

        let root = strukt(vec![("secrets", sops("all.yaml"))]);
        let injected = inject(&root, &Path::parse("secrets"), &ctx(&resolver)).unwrap();
        assert_eq!(
            injected.lookup(&Path::parse("secrets.a")),
            Some(&Value::from(serde_json::json!(1)))
        );
    }

    #[test]
    fn test_untouched_siblings_are_shared() {
        let mut resolver = MockResolver::new();
        resolver
            .expect_decrypt()
            .returning(|_, _| Ok(b"pw".to_vec()));

        let root = strukt(vec![
            ("config", Field::new(strukt(vec![("replicas", plain(Value::from(serde_json::json!(3))))]))),
            ("secrets", Field::new(strukt(vec![("pw", sops("pw.txt"))]))),
        ]);

        let injected = inject(&root, &Path::parse("secrets"), &ctx(&resolver)).unwrap();
        assert!(Arc::ptr_eq(
            root.field("config").unwrap().shared_value(),
            injected.field("config").unwrap().shared_value()
        ));
        assert_eq!(
            injected.lookup(&Path::parse("secrets.pw")),
            Some(&Value::String("pw".to_string()))
        );
    }

    #[test]
    fn test_injection_is_deterministic() {
        let mut resolver = MockResolver::new();
        resolver
            .expect_decrypt()
            .times(4)
            .returning(|path, _| Ok(path.display().to_string().into_bytes()));

        let root = strukt(vec![(
            "secrets",
            Field::new(strukt(vec![("z", sops("z.txt")), ("a", sops("module://a.txt"))])),
        )]);
        let context = ctx(&resolver);
        let first = inject(&root, &Path::parse("secrets"), &context).unwrap();
        let second = inject(&first, &Path::parse("secrets"), &context).unwrap();
        assert_eq!(first, second);

        let labels: Vec<_> = first
            .get("secrets")
            .unwrap()
            .fields()
            .map(|(l, _)| l.to_string())
            .collect();
        assert_eq!(labels, vec!["z", "a"]);
    }

    #[test]
    fn test_decode_secret_modes() {
        let text = decode_secret(FsPath::new("a.yaml"), b"k: v\n".to_vec(), true).unwrap();
        assert_eq!(text, Value::String("k: v\n".to_string()));

        let binary = decode_secret(FsPath::new("key.bin"), vec![0xff, 0x00], false).unwrap();
        assert_eq!(binary, Value::Bytes(vec![0xff, 0x00]));

        let bad = decode_secret(FsPath::new("a.json"), b"{not json".to_vec(), false);
        assert!(matches!(bad, Err(ManifoldError::Secret(_))));
    }
}
