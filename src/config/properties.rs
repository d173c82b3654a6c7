//! Property schemas and typed access to trait configuration
//!
//! Every trait declares its properties up front (name, kind, default). The
//! resolver uses the schema to coerce loosely typed input, such as annotation
//! strings, and each trait decodes its own typed configuration from the merged
//! map through [`Properties`].

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

/// Generic property bag of a single trait
pub type PropertyMap = Map<String, Value>;

/// Errors raised while coercing or decoding a trait property
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DecodeError {
    #[error("trait '{trait_id}': unknown property '{property}'")]
    UnknownProperty { trait_id: String, property: String },

    #[error("trait '{trait_id}': property '{property}' expects {expected}, got {found}")]
    InvalidValue {
        trait_id: String,
        property: String,
        expected: &'static str,
        found: String,
    },

    #[error("trait '{trait_id}': could not decode JSON array for property '{property}': {reason}")]
    InvalidJsonArray {
        trait_id: String,
        property: String,
        reason: String,
    },

    #[error("trait '{trait_id}': invalid property path '{path}': {reason}")]
    InvalidPath {
        trait_id: String,
        path: String,
        reason: String,
    },

    #[error("trait '{trait_id}': configuration must be a map of properties")]
    NotAMap { trait_id: String },
}

/// Shape of a property value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    Bool,
    Int,
    String,
    StringList,
    /// Flat map of string values
    StringMap,
    /// Arbitrary nested map, string leaves
    Object,
    /// Array of maps, string leaves
    ObjectList,
}

impl PropertyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyKind::Bool => "a boolean",
            PropertyKind::Int => "an integer",
            PropertyKind::String => "a string",
            PropertyKind::StringList => "a list of strings",
            PropertyKind::StringMap => "a map of strings",
            PropertyKind::Object => "a map",
            PropertyKind::ObjectList => "a list of maps",
        }
    }

    /// Kinds that accept nested property paths
    pub fn is_structured(&self) -> bool {
        matches!(
            self,
            PropertyKind::StringMap | PropertyKind::Object | PropertyKind::ObjectList
        )
    }
}

/// Declaration of a configurable trait property
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertySpec {
    pub name: &'static str,
    pub kind: PropertyKind,
    pub default: Option<&'static str>,
    pub description: &'static str,
}

impl PropertySpec {
    pub const fn new(name: &'static str, kind: PropertyKind, description: &'static str) -> Self {
        Self {
            name,
            kind,
            default: None,
            description,
        }
    }

    pub const fn with_default(mut self, default: &'static str) -> Self {
        self.default = Some(default);
        self
    }
}

/// Shared by every trait
pub const ENABLED: PropertySpec = PropertySpec::new(
    "enabled",
    PropertyKind::Bool,
    "Can be used to enable or disable a trait",
);

/// Look up a property in a schema
pub fn find_spec<'a>(schema: &'a [PropertySpec], name: &str) -> Option<&'a PropertySpec> {
    schema.iter().find(|p| p.name == name)
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => format!("boolean {}", b),
        Value::Number(n) => format!("number {}", n),
        Value::String(s) => format!("string {:?}", s),
        Value::Array(_) => "a list".to_string(),
        Value::Object(_) => "a map".to_string(),
    }
}

/// Parse a boolean the way Go's `strconv.ParseBool` does
pub fn parse_bool(s: &str) -> Option<bool> {
    match s {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

/// Whether a string is meant as a JSON array (`["a", "b"]`)
pub fn is_json_array(s: &str) -> bool {
    let s = s.trim();
    s.starts_with('[') && s.ends_with(']')
}

/// Stringify scalar leaves recursively; maps and arrays are kept.
pub fn stringify_leaves(value: Value) -> Value {
    match value {
        Value::Bool(b) => Value::String(b.to_string()),
        Value::Number(n) => Value::String(n.to_string()),
        Value::Array(items) => Value::Array(items.into_iter().map(stringify_leaves).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, stringify_leaves(v)))
                .collect(),
        ),
        other => other,
    }
}

/// Coerce a top-level property value to the shape its schema declares.
///
/// Strings are accepted wherever a scalar is expected (`"true"`, `"10"`);
/// list and structured kinds also accept a JSON encoded string.
pub fn coerce(trait_id: &str, spec: &PropertySpec, value: Value) -> Result<Value, DecodeError> {
    let invalid = |found: &Value| DecodeError::InvalidValue {
        trait_id: trait_id.to_string(),
        property: spec.name.to_string(),
        expected: spec.kind.as_str(),
        found: describe(found),
    };

    match spec.kind {
        PropertyKind::Bool => match value {
            Value::Bool(b) => Ok(Value::Bool(b)),
            Value::String(s) => match parse_bool(&s) {
                Some(b) => Ok(Value::Bool(b)),
                None => Err(invalid(&Value::String(s))),
            },
            other => Err(invalid(&other)),
        },
        PropertyKind::Int => match value {
            Value::Number(n) if n.is_i64() => Ok(Value::Number(n)),
            Value::String(s) => match s.trim().parse::<i64>() {
                Ok(i) => Ok(Value::from(i)),
                Err(_) => Err(invalid(&Value::String(s))),
            },
            other => Err(invalid(&other)),
        },
        PropertyKind::String => match value {
            Value::String(s) => Ok(Value::String(s)),
            scalar @ (Value::Bool(_) | Value::Number(_)) => Ok(stringify_leaves(scalar)),
            other => Err(invalid(&other)),
        },
        PropertyKind::StringList => match value {
            Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    match item {
                        Value::String(_) | Value::Bool(_) | Value::Number(_) => {
                            out.push(stringify_leaves(item))
                        }
                        other => return Err(invalid(&other)),
                    }
                }
                Ok(Value::Array(out))
            }
            Value::String(s) if is_json_array(&s) => {
                let parsed = parse_json(trait_id, spec, &s)?;
                coerce(trait_id, spec, parsed)
            }
            Value::String(s) => Ok(Value::Array(vec![Value::String(s)])),
            other => Err(invalid(&other)),
        },
        PropertyKind::StringMap => match value {
            Value::Object(map) => {
                for v in map.values() {
                    if v.is_array() || v.is_object() {
                        return Err(invalid(v));
                    }
                }
                Ok(stringify_leaves(Value::Object(map)))
            }
            other => Err(invalid(&other)),
        },
        PropertyKind::Object => match value {
            map @ Value::Object(_) => Ok(stringify_leaves(map)),
            other => Err(invalid(&other)),
        },
        PropertyKind::ObjectList => match value {
            Value::Array(items) => {
                if let Some(bad) = items.iter().find(|i| !i.is_object()) {
                    return Err(invalid(bad));
                }
                Ok(stringify_leaves(Value::Array(items)))
            }
            Value::String(s) if is_json_array(&s) => {
                let parsed = parse_json(trait_id, spec, &s)?;
                coerce(trait_id, spec, parsed)
            }
            other => Err(invalid(&other)),
        },
    }
}

fn parse_json(trait_id: &str, spec: &PropertySpec, s: &str) -> Result<Value, DecodeError> {
    serde_json::from_str(s).map_err(|e| DecodeError::InvalidJsonArray {
        trait_id: trait_id.to_string(),
        property: spec.name.to_string(),
        reason: e.to_string(),
    })
}

/// Read-only typed view over the resolved properties of one trait
#[derive(Debug, Clone, Copy)]
pub struct Properties<'a> {
    trait_id: &'a str,
    map: Option<&'a PropertyMap>,
}

impl<'a> Properties<'a> {
    pub fn new(trait_id: &'a str, map: Option<&'a PropertyMap>) -> Self {
        Self { trait_id, map }
    }

    pub fn trait_id(&self) -> &str {
        self.trait_id
    }

    fn get(&self, name: &str) -> Option<&'a Value> {
        self.map.and_then(|m| m.get(name)).filter(|v| !v.is_null())
    }

    fn invalid(&self, name: &str, expected: &'static str, found: &Value) -> DecodeError {
        DecodeError::InvalidValue {
            trait_id: self.trait_id.to_string(),
            property: name.to_string(),
            expected,
            found: describe(found),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn bool(&self, name: &str) -> Result<Option<bool>, DecodeError> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(Value::String(s)) => parse_bool(s)
                .map(Some)
                .ok_or_else(|| self.invalid(name, "a boolean", &Value::String(s.clone()))),
            Some(other) => Err(self.invalid(name, "a boolean", other)),
        }
    }

    /// Value of the common `enabled` property
    pub fn enabled(&self) -> Result<Option<bool>, DecodeError> {
        self.bool(ENABLED.name)
    }

    pub fn int(&self, name: &str) -> Result<Option<i64>, DecodeError> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::Number(n)) => n
                .as_i64()
                .map(Some)
                .ok_or_else(|| self.invalid(name, "an integer", &Value::Number(n.clone()))),
            Some(Value::String(s)) => s
                .trim()
                .parse()
                .map(Some)
                .map_err(|_| self.invalid(name, "an integer", &Value::String(s.clone()))),
            Some(other) => Err(self.invalid(name, "an integer", other)),
        }
    }

    pub fn i32(&self, name: &str) -> Result<Option<i32>, DecodeError> {
        match self.int(name)? {
            None => Ok(None),
            Some(v) => i32::try_from(v)
                .map(Some)
                .map_err(|_| self.invalid(name, "a 32 bit integer", &Value::from(v))),
        }
    }

    pub fn string(&self, name: &str) -> Result<Option<String>, DecodeError> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(v @ (Value::Bool(_) | Value::Number(_))) => Ok(Some(v.to_string())),
            Some(other) => Err(self.invalid(name, "a string", other)),
        }
    }

    pub fn string_list(&self, name: &str) -> Result<Vec<String>, DecodeError> {
        match self.get(name) {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    Value::Bool(_) | Value::Number(_) => Ok(item.to_string()),
                    other => Err(self.invalid(name, "a list of strings", other)),
                })
                .collect(),
            Some(Value::String(s)) => Ok(vec![s.clone()]),
            Some(other) => Err(self.invalid(name, "a list of strings", other)),
        }
    }

    pub fn string_map(&self, name: &str) -> Result<BTreeMap<String, String>, DecodeError> {
        Ok(self.deserialize(name)?.unwrap_or_default())
    }

    /// Decode every property of `schema` with the accessor matching its kind
    pub fn check(&self, schema: &[PropertySpec]) -> Result<(), DecodeError> {
        for spec in schema {
            let name = spec.name;
            match spec.kind {
                PropertyKind::Bool => self.bool(name).map(drop)?,
                PropertyKind::Int => self.int(name).map(drop)?,
                PropertyKind::String => self.string(name).map(drop)?,
                PropertyKind::StringList => self.string_list(name).map(drop)?,
                PropertyKind::StringMap => self.string_map(name).map(drop)?,
                PropertyKind::Object => self.deserialize::<PropertyMap>(name).map(drop)?,
                PropertyKind::ObjectList => {
                    self.deserialize::<Vec<PropertyMap>>(name).map(drop)?
                }
            }
        }
        Ok(())
    }

    /// Decode a structured property into a serde type
    pub fn deserialize<T: DeserializeOwned>(&self, name: &str) -> Result<Option<T>, DecodeError> {
        match self.get(name) {
            None => Ok(None),
            Some(value) => serde_json::from_value(value.clone()).map(Some).map_err(|e| {
                DecodeError::InvalidValue {
                    trait_id: self.trait_id.to_string(),
                    property: name.to_string(),
                    expected: "a structured value",
                    found: e.to_string(),
                }
            }),
        }
    }
}
