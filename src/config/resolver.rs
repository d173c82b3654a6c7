//! Layered merge of trait configuration
//!
//! Layers are applied lowest precedence first. Each entry overwrites a single
//! leaf of its trait's property map, so a higher layer only replaces what it
//! actually sets.

use std::collections::BTreeSet;

use serde_json::{Map, Value};
use tracing::debug;

use super::annotations::{path_to_string, PathSegment};
use super::layers::{CapabilityConfig, ConfigLayer, LayerSnapshot, PropertyEntry};
use super::properties::{
    coerce, find_spec, is_json_array, stringify_leaves, DecodeError, Properties, PropertyKind,
    PropertySpec, ENABLED,
};
use super::ConfigError;

/// Where the resolver finds the known trait ids and their property schemas
pub trait SchemaSource {
    fn trait_ids(&self) -> Vec<&'static str>;

    fn schema(&self, trait_id: &str) -> Option<&'static [PropertySpec]>;

    /// Decode the merged properties of a trait into its typed configuration,
    /// failing on anything the trait could not read later on
    fn decode(&self, trait_id: &str, props: Properties<'_>) -> Result<(), DecodeError> {
        match self.schema(trait_id) {
            Some(schema) => props.check(schema),
            None => Ok(()),
        }
    }
}

pub struct ConfigResolver<'a> {
    schemas: &'a dyn SchemaSource,
}

impl<'a> ConfigResolver<'a> {
    pub fn new(schemas: &'a dyn SchemaSource) -> Self {
        Self { schemas }
    }

    /// Merge `layers` into one property map per known trait, then decode
    /// every trait's configuration.
    ///
    /// Layers are stably re-ordered by precedence, so callers may pass them in
    /// any order.
    pub fn resolve(&self, layers: &[LayerSnapshot]) -> Result<CapabilityConfig, ConfigError> {
        let mut config = CapabilityConfig::new();
        for id in self.schemas.trait_ids() {
            config.get_mut(id);
        }

        let mut ordered: Vec<&LayerSnapshot> = layers.iter().collect();
        ordered.sort_by_key(|l| l.layer);

        for snapshot in ordered {
            debug!(
                "Applying {} configuration layer ({} entries)",
                snapshot.layer,
                snapshot.entries.len()
            );
            // list properties already written by this layer
            let mut touched: BTreeSet<(String, String)> = BTreeSet::new();
            for entry in &snapshot.entries {
                self.apply_entry(&mut config, snapshot.layer, entry, &mut touched)?;
            }
        }

        for id in self.schemas.trait_ids() {
            self.schemas.decode(id, config.properties(id))?;
        }
        Ok(config)
    }

    fn apply_entry(
        &self,
        config: &mut CapabilityConfig,
        layer: ConfigLayer,
        entry: &PropertyEntry,
        touched: &mut BTreeSet<(String, String)>,
    ) -> Result<(), ConfigError> {
        let id = entry.trait_id.as_str();
        let Some(schema) = self.schemas.schema(id) else {
            debug!("Ignoring configuration for unknown trait '{}' ({} layer)", id, layer);
            return Ok(());
        };

        let Some((first, rest)) = entry.path.split_first() else {
            return Err(DecodeError::NotAMap {
                trait_id: id.to_string(),
            }
            .into());
        };
        let PathSegment::Key(name) = first else {
            return Err(invalid_path(id, &entry.path, "path must start with a property name").into());
        };
        if entry.value.is_null() {
            return Ok(());
        }

        let Some(spec) = find_spec(schema, name).or_else(|| (name == ENABLED.name).then_some(&ENABLED))
        else {
            if layer == ConfigLayer::Annotations {
                return Err(DecodeError::UnknownProperty {
                    trait_id: id.to_string(),
                    property: name.clone(),
                }
                .into());
            }
            debug!("Ignoring unknown property '{}.{}' ({} layer)", id, name, layer);
            return Ok(());
        };

        let map = config.get_mut(id);
        if rest.is_empty() {
            let scalar = matches!(&entry.value, Value::String(s) if !is_json_array(s))
                || matches!(&entry.value, Value::Bool(_) | Value::Number(_));
            let coerced = coerce(id, spec, entry.value.clone())?;
            let key = (id.to_string(), name.clone());

            if spec.kind == PropertyKind::StringList && scalar && touched.contains(&key) {
                if let (Some(Value::Array(existing)), Value::Array(items)) = (map.get_mut(name), coerced) {
                    existing.extend(items);
                }
            } else {
                map.insert(name.clone(), coerced);
            }
            touched.insert(key);
            return Ok(());
        }

        if !spec.kind.is_structured() {
            return Err(invalid_path(
                id,
                &entry.path,
                &format!("property '{}' is {} and has no nested fields", name, spec.kind.as_str()),
            )
            .into());
        }
        let leaf = nested_leaf(id, spec, &entry.path, rest, &entry.value)?;
        let slot = map.entry(name.clone()).or_insert(Value::Null);
        set_path(slot, rest, leaf).map_err(|reason| invalid_path(id, &entry.path, &reason))?;
        Ok(())
    }
}

fn invalid_path(trait_id: &str, path: &[PathSegment], reason: &str) -> DecodeError {
    DecodeError::InvalidPath {
        trait_id: trait_id.to_string(),
        path: path_to_string(path),
        reason: reason.to_string(),
    }
}

/// Check a nested assignment against the property kind and normalize the value
fn nested_leaf(
    trait_id: &str,
    spec: &PropertySpec,
    full: &[PathSegment],
    rest: &[PathSegment],
    value: &Value,
) -> Result<Value, DecodeError> {
    match spec.kind {
        PropertyKind::StringMap => {
            if rest.len() != 1 || !matches!(rest[0], PathSegment::Key(_)) {
                return Err(invalid_path(trait_id, full, "a map of strings takes a single key"));
            }
            if value.is_array() || value.is_object() {
                return Err(DecodeError::InvalidValue {
                    trait_id: trait_id.to_string(),
                    property: path_to_string(full),
                    expected: "a string",
                    found: "a structured value".to_string(),
                });
            }
        }
        PropertyKind::ObjectList => {
            if !matches!(rest[0], PathSegment::Index(_)) {
                return Err(invalid_path(trait_id, full, "a list of maps must be indexed"));
            }
        }
        _ => {}
    }
    Ok(stringify_leaves(value.clone()))
}

/// Write `value` at `path` below `target`, creating maps and lists on the way.
/// An index may address an existing element or append right after the last.
pub(crate) fn set_path(target: &mut Value, path: &[PathSegment], value: Value) -> Result<(), String> {
    let Some((segment, rest)) = path.split_first() else {
        *target = value;
        return Ok(());
    };
    match segment {
        PathSegment::Key(key) => {
            if target.is_null() {
                *target = Value::Object(Map::new());
            }
            let Value::Object(map) = target else {
                return Err(format!("cannot set '{}' on a non-map value", key));
            };
            let child = map.entry(key.clone()).or_insert(Value::Null);
            set_path(child, rest, value)
        }
        PathSegment::Index(index) => {
            if target.is_null() {
                *target = Value::Array(Vec::new());
            }
            let Value::Array(items) = target else {
                return Err(format!("cannot index [{}] into a non-list value", index));
            };
            if *index > items.len() {
                return Err(format!(
                    "index [{}] skips entries, list has {} element(s)",
                    index,
                    items.len()
                ));
            }
            if *index == items.len() {
                items.push(Value::Null);
            }
            set_path(&mut items[*index], rest, value)
        }
    }
}
