//! The configuration value tree.
//!
//! A [`Value`] is an immutable tree produced by the configuration evaluator.
//! Structs keep their fields in declaration order and every field may carry
//! attributes attached at its declaration site. Attributes belong to the
//! field, not to the value, so they are never inherited by descendants.
//!
//! Values are persistent: [`Value::replace`] returns a new tree in which only
//! the nodes along the replaced path are rebuilt. Every other subtree is
//! shared with the original through `Arc`.

use crate::errors::{ManifoldError, Result};
use base64::Engine as _;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use std::fmt;
use std::sync::Arc;

/// An attribute attached to a field declaration, e.g. `sops(creds.txt,type=text)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    name: String,
    contents: String,
}

/// One parsed argument of an attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeArg {
    /// Key for `key=value` arguments
    pub key: Option<String>,
    /// Argument value, unquoted
    pub value: String,
}

impl Attribute {
    /// Create an attribute from its name and raw argument string.
    pub fn new(name: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            contents: contents.into(),
        }
    }

    /// Attribute name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw, unparsed argument string.
    pub fn contents(&self) -> &str {
        &self.contents
    }

    /// Parse the comma separated argument list.
    ///
    /// Arguments are either positional or `key=value`; values may be double
    /// quoted, in which case commas and `=` inside the quotes are literal.
    pub fn args(&self) -> Result<Vec<AttributeArg>> {
        let mut args = Vec::new();
        for piece in split_top_level(&self.contents)? {
            let piece = piece.trim();
            if piece.is_empty() {
                continue;
            }
            args.push(parse_arg(piece)?);
        }
        Ok(args)
    }

    /// The positional argument at `pos`.
    pub fn string(&self, pos: usize) -> Result<String> {
        let args = self.args()?;
        match args.get(pos) {
            Some(AttributeArg { key: None, value }) => Ok(value.clone()),
            Some(AttributeArg {
                key: Some(key),
                value,
            }) => Ok(format!("{}={}", key, value)),
            None => Err(ManifoldError::Decode(format!(
                "attribute @{}({}) has no argument at position {}",
                self.name, self.contents, pos
            ))),
        }
    }

    /// Find a `key=value` argument at or after position `from`.
    pub fn lookup(&self, from: usize, key: &str) -> Result<Option<String>> {
        let args = self.args()?;
        Ok(args
            .into_iter()
            .skip(from)
            .find(|arg| arg.key.as_deref() == Some(key))
            .map(|arg| arg.value))
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}({})", self.name, self.contents)
    }
}

fn split_top_level(contents: &str) -> Result<Vec<String>> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut escaped = false;

    for c in contents.chars() {
        if escaped {
            current.push(c);
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => {
                current.push(c);
                escaped = true;
            }
            '"' => {
                current.push(c);
                in_quotes = !in_quotes;
            }
            ',' if !in_quotes => pieces.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }

    if in_quotes {
        return Err(ManifoldError::Decode(format!(
            "unterminated string in attribute arguments: {}",
            contents
        )));
    }
    pieces.push(current);
    Ok(pieces)
}

fn parse_arg(piece: &str) -> Result<AttributeArg> {
    if !piece.starts_with('"') {
        if let Some((key, value)) = piece.split_once('=') {
            let key = key.trim();
            if is_identifier(key) {
                return Ok(AttributeArg {
                    key: Some(key.to_string()),
                    value: unquote(value.trim())?,
                });
            }
        }
    }
    Ok(AttributeArg {
        key: None,
        value: unquote(piece)?,
    })
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn unquote(s: &str) -> Result<String> {
    let Some(inner) = s.strip_prefix('"') else {
        return Ok(s.to_string());
    };
    let inner = inner.strip_suffix('"').ok_or_else(|| {
        ManifoldError::Decode(format!("malformed quoted attribute argument: {}", s))
    })?;

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => out.push('\\'),
            }
        } else {
            out.push(c);
        }
    }
    Ok(out)
}

/// A struct field: a value plus the attributes of its declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    value: Arc<Value>,
    attributes: Vec<Attribute>,
}

impl Field {
    /// Create a field without attributes.
    pub fn new(value: Value) -> Self {
        Self {
            value: Arc::new(value),
            attributes: Vec::new(),
        }
    }

    /// Attach an attribute to this field.
    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// The field's value.
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Shared handle to the field's value.
    pub fn shared_value(&self) -> &Arc<Value> {
        &self.value
    }

    /// All attributes declared on this field.
    pub fn attributes(&self) -> &[Attribute] {
        &self.attributes
    }

    /// The first attribute with the given name.
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name() == name)
    }

    /// A copy of this field holding a different value, keeping its attributes.
    pub fn with_value(&self, value: Value) -> Self {
        Self {
            value: Arc::new(value),
            attributes: self.attributes.clone(),
        }
    }
}

impl From<Value> for Field {
    fn from(value: Value) -> Self {
        Field::new(value)
    }
}

/// A dotted path addressing a node in a [`Value`].
///
/// Segments select struct fields by label; on lists a segment is parsed as
/// an index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Path(Vec<String>);

impl Path {
    /// The empty path, addressing the root.
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Parse a dotted path such as `spec.objects`.
    pub fn parse(path: &str) -> Self {
        Self(
            path.split('.')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    /// A new path with one more segment.
    pub fn child(&self, label: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(label.into());
        Self(segments)
    }

    /// Path segments.
    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// Whether this is the root path.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Path {
    fn from(path: &str) -> Self {
        Path::parse(path)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join("."))
    }
}

/// An immutable configuration value.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    /// Null / absent value
    #[default]
    Null,
    /// Boolean scalar
    Bool(bool),
    /// Numeric scalar
    Number(serde_json::Number),
    /// String scalar
    String(String),
    /// Opaque binary blob
    Bytes(Vec<u8>),
    /// Ordered list
    List(Vec<Arc<Value>>),
    /// Fields in declaration order
    Struct(IndexMap<String, Field>),
}

impl Value {
    /// An empty struct.
    pub fn empty_struct() -> Self {
        Value::Struct(IndexMap::new())
    }

    /// Build a struct from `(label, field)` pairs, keeping their order.
    pub fn from_fields<I, F>(fields: I) -> Self
    where
        I: IntoIterator<Item = (String, F)>,
        F: Into<Field>,
    {
        Value::Struct(fields.into_iter().map(|(k, f)| (k, f.into())).collect())
    }

    /// Build a list value.
    pub fn from_items(items: impl IntoIterator<Item = Value>) -> Self {
        Value::List(items.into_iter().map(Arc::new).collect())
    }

    /// Whether this value is a struct.
    pub fn is_struct(&self) -> bool {
        matches!(self, Value::Struct(_))
    }

    /// Borrow the struct fields, if this is a struct.
    pub fn as_struct(&self) -> Option<&IndexMap<String, Field>> {
        match self {
            Value::Struct(fields) => Some(fields),
            _ => None,
        }
    }

    /// Borrow the list items, if this is a list.
    pub fn as_list(&self) -> Option<&[Arc<Value>]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    /// Borrow the string, if this is a string scalar.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Iterate over struct fields in declaration order.
    ///
    /// Non-struct values have no fields.
    pub fn fields(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.as_struct()
            .into_iter()
            .flat_map(|fields| fields.iter().map(|(k, f)| (k.as_str(), f)))
    }

    /// Get a direct child field by label.
    pub fn field(&self, label: &str) -> Option<&Field> {
        self.as_struct().and_then(|fields| fields.get(label))
    }

    /// Get a direct child value by label.
    pub fn get(&self, label: &str) -> Option<&Value> {
        self.field(label).map(Field::value)
    }

    /// Look up the value at `path`.
    pub fn lookup(&self, path: &Path) -> Option<&Value> {
        let mut current = self;
        for segment in path.segments() {
            current = current.child(segment)?;
        }
        Some(current)
    }

    /// Whether a value exists at `path`.
    pub fn exists(&self, path: &Path) -> bool {
        self.lookup(path).is_some()
    }

    /// Attributes declared on the field at `path`.
    ///
    /// The root and list items have no declaration site, so they have none.
    pub fn attributes_at(&self, path: &Path) -> &[Attribute] {
        let Some((last, parent)) = path.segments().split_last() else {
            return &[];
        };
        let parent = Path(parent.to_vec());
        self.lookup(&parent)
            .and_then(|v| v.field(last))
            .map(Field::attributes)
            .unwrap_or(&[])
    }

    fn child(&self, segment: &str) -> Option<&Value> {
        match self {
            Value::Struct(fields) => fields.get(segment).map(Field::value),
            Value::List(items) => segment
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i))
                .map(|v| v.as_ref()),
            _ => None,
        }
    }

    /// Return a new value with the subtree at `path` replaced.
    ///
    /// Only the nodes on the path are rebuilt; siblings are shared with
    /// `self`. Field attributes along the path are preserved.
    pub fn replace(&self, path: &Path, value: Value) -> Result<Value> {
        self.replace_at(path.segments(), value).map_err(|_| {
            ManifoldError::Evaluation(format!("path '{}' does not exist", path))
        })
    }

    fn replace_at(&self, segments: &[String], value: Value) -> std::result::Result<Value, ()> {
        let Some((head, rest)) = segments.split_first() else {
            return Ok(value);
        };

        match self {
            Value::Struct(fields) => {
                let field = fields.get(head).ok_or(())?;
                let replaced = field.value().replace_at(rest, value)?;
                let mut fields = fields.clone();
                fields.insert(head.clone(), field.with_value(replaced));
                Ok(Value::Struct(fields))
            }
            Value::List(items) => {
                let index = head.parse::<usize>().map_err(|_| ())?;
                let item = items.get(index).ok_or(())?;
                let replaced = item.replace_at(rest, value)?;
                let mut items = items.clone();
                items[index] = Arc::new(replaced);
                Ok(Value::List(items))
            }
            _ => Err(()),
        }
    }

    /// Decode this value into a typed structure.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(self.to_json()).map_err(|e| ManifoldError::Decode(e.to_string()))
    }

    /// Convert to a JSON value. Binary blobs become base64 strings.
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as Json;

        match self {
            Value::Null => Json::Null,
            Value::Bool(b) => Json::Bool(*b),
            Value::Number(n) => Json::Number(n.clone()),
            Value::String(s) => Json::String(s.clone()),
            Value::Bytes(bytes) => {
                Json::String(base64::engine::general_purpose::STANDARD.encode(bytes))
            }
            Value::List(items) => Json::Array(items.iter().map(|v| v.to_json()).collect()),
            Value::Struct(fields) => Json::Object(
                fields
                    .iter()
                    .map(|(k, f)| (k.clone(), f.value().to_json()))
                    .collect(),
            ),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        use serde_json::Value as Json;

        match json {
            Json::Null => Value::Null,
            Json::Bool(b) => Value::Bool(b),
            Json::Number(n) => Value::Number(n),
            Json::String(s) => Value::String(s),
            Json::Array(items) => Value::from_items(items.into_iter().map(Value::from)),
            Json::Object(map) => Value::Struct(
                map.into_iter()
                    .map(|(k, v)| (k, Field::new(Value::from(v))))
                    .collect(),
            ),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde::Deserialize;
    use serde_json::json;

    fn sample() -> Value {
        Value::from_fields(vec![
            (
                "secrets".to_string(),
                Field::new(Value::from_fields(vec![(
                    "db".to_string(),
                    Field::new(Value::Null).with_attribute(Attribute::new("sops", "db.yaml")),
                )])),
            ),
            (
                "generators".to_string(),
                Field::new(Value::from(json!([{"kind": "Objects"}]))),
            ),
        ])
    }

    #[test]
    fn test_attribute_positional_and_lookup() {
        let attr = Attribute::new("sops", "secrets.yaml,type=text");
        assert_eq!(attr.string(0).unwrap(), "secrets.yaml");
        assert_eq!(attr.lookup(1, "type").unwrap().as_deref(), Some("text"));
        assert_eq!(attr.lookup(1, "format").unwrap(), None);
    }

    #[test]
    fn test_attribute_quoted_arguments() {
        let attr = Attribute::new("sops", r#""module://creds.txt", type="text""#);
        assert_eq!(attr.string(0).unwrap(), "module://creds.txt");
        assert_eq!(attr.lookup(1, "type").unwrap().as_deref(), Some("text"));

        let comma = Attribute::new("sops", r#""a,b.yaml""#);
        assert_eq!(comma.string(0).unwrap(), "a,b.yaml");
    }

    #[test]
    fn test_attribute_unterminated_quote() {
        let attr = Attribute::new("sops", r#""broken.yaml"#);
        assert!(attr.args().is_err());
        assert!(attr.string(0).is_err());
    }

    #[test]
    fn test_fields_keep_declaration_order() {
        let value = sample();
        let labels: Vec<&str> = value.fields().map(|(k, _)| k).collect();
        assert_eq!(labels, vec!["secrets", "generators"]);
        assert_eq!(Value::Null.fields().count(), 0);
    }

    #[test]
    fn test_lookup_struct_and_list() {
        let value = sample();
        assert!(value.exists(&Path::parse("secrets.db")));
        assert_eq!(
            value.lookup(&Path::parse("generators.0.kind")).and_then(Value::as_str),
            Some("Objects")
        );
        assert!(value.lookup(&Path::parse("generators.1")).is_none());
        assert!(value.lookup(&Path::parse("missing")).is_none());
        assert_eq!(value.lookup(&Path::root()), Some(&value));
    }

    #[test]
    fn test_attributes_are_not_inherited() {
        let value = sample();
        assert_eq!(value.attributes_at(&Path::parse("secrets.db")).len(), 1);
        assert!(value.attributes_at(&Path::parse("secrets")).is_empty());
        assert!(value.attributes_at(&Path::root()).is_empty());
    }

    #[test]
    fn test_replace_shares_siblings() {
        let value = sample();
        let replaced = value
            .replace(&Path::parse("secrets.db"), Value::from("decrypted"))
            .unwrap();

        assert_eq!(
            replaced.lookup(&Path::parse("secrets.db")),
            Some(&Value::from("decrypted"))
        );
        // Attributes on the declaring field survive the replacement.
        assert_eq!(replaced.attributes_at(&Path::parse("secrets.db")).len(), 1);
        // The original is untouched.
        assert_eq!(value.lookup(&Path::parse("secrets.db")), Some(&Value::Null));

        let before = value.field("generators").unwrap().shared_value();
        let after = replaced.field("generators").unwrap().shared_value();
        assert!(Arc::ptr_eq(before, after));
    }

    #[test]
    fn test_replace_missing_path() {
        let err = sample()
            .replace(&Path::parse("secrets.nope.deeper"), Value::Null)
            .unwrap_err();
        assert!(err.to_string().contains("secrets.nope.deeper"));
    }

    #[test]
    fn test_decode_typed() {
        #[derive(Deserialize)]
        struct Spec {
            kind: String,
        }

        let value = Value::from(json!({"kind": "Objects", "extra": 1}));
        let spec: Spec = value.decode().unwrap();
        assert_eq!(spec.kind, "Objects");

        let bad: Result<Spec> = Value::from(json!({"kind": 3})).decode();
        assert!(matches!(bad, Err(ManifoldError::Decode(_))));
    }

    #[test]
    fn test_json_conversion() {
        let json = json!({"b": [1, true, null], "a": "x"});
        let value = Value::from(json.clone());
        assert_eq!(value.to_json(), json);

        let bytes = Value::Bytes(b"hi".to_vec());
        assert_eq!(bytes.to_json(), json!("aGk="));
    }
    fn nested() -> impl Strategy<Value = serde_json::Value> {
        proptest::collection::btree_map(
            "[a-e]",
            proptest::collection::btree_map("[a-e]", any::<i64>(), 1..4),
            1..4,
        )
        .prop_map(|outer| json!(outer))
    }

    proptest! {
        #[test]
        fn test_replace_then_lookup(doc in nested(), pick in any::<prop::sample::Index>()) {
            let value = Value::from(doc.clone());
            let paths: Vec<Path> = value
                .fields()
                .flat_map(|(outer, field)| {
                    field
                        .value()
                        .fields()
                        .map(|(inner, _)| Path::parse(&format!("{}.{}", outer, inner)))
                        .collect::<Vec<_>>()
                })
                .collect();
            let target = &paths[pick.index(paths.len())];

            let replaced = value.replace(target, Value::from("new")).unwrap();
            prop_assert_eq!(replaced.lookup(target), Some(&Value::from("new")));
            for other in paths.iter().filter(|p| *p != target) {
                prop_assert_eq!(replaced.lookup(other), value.lookup(other));
            }
            prop_assert_eq!(value.to_json(), doc);
        }
    }
}
