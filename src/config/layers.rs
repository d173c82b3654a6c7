//! Configuration layers and the merged per-trait configuration

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value;

use super::annotations::{parse_annotation_key, parse_trait_option, split_property_path, PathSegment};
use super::document::{IntegrationDocument, TraitSpecs};
use super::properties::{DecodeError, Properties, PropertyMap};
use super::ConfigError;

/// Source of trait configuration, declared lowest to highest precedence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConfigLayer {
    Platform,
    Kit,
    Instance,
    Annotations,
}

impl ConfigLayer {
    pub const ALL: [ConfigLayer; 4] = [
        ConfigLayer::Platform,
        ConfigLayer::Kit,
        ConfigLayer::Instance,
        ConfigLayer::Annotations,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigLayer::Platform => "platform",
            ConfigLayer::Kit => "kit",
            ConfigLayer::Instance => "integration",
            ConfigLayer::Annotations => "annotations",
        }
    }
}

impl fmt::Display for ConfigLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single `(trait, property path, value)` triple.
///
/// An empty path stands for the trait's whole configuration and only appears
/// when a spec layer holds something other than a map for a trait.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyEntry {
    pub trait_id: String,
    pub path: Vec<PathSegment>,
    pub value: Value,
}

impl PropertyEntry {
    pub fn new(trait_id: impl Into<String>, path: Vec<PathSegment>, value: Value) -> Self {
        Self {
            trait_id: trait_id.into(),
            path,
            value,
        }
    }
}

/// Read-only snapshot of one layer, taken once per resolution pass
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSnapshot {
    pub layer: ConfigLayer,
    pub entries: Vec<PropertyEntry>,
}

impl LayerSnapshot {
    pub fn new(layer: ConfigLayer) -> Self {
        Self {
            layer,
            entries: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Flatten `trait id -> property bag` into leaf entries. Nested maps are
    /// walked key by key; lists are kept whole.
    pub fn from_trait_specs(layer: ConfigLayer, specs: &TraitSpecs) -> Self {
        let mut snapshot = Self::new(layer);
        for (id, spec) in specs {
            match spec {
                Value::Null => {}
                Value::Object(map) => {
                    for (key, value) in map {
                        flatten(id, vec![PathSegment::Key(key.clone())], value, &mut snapshot.entries);
                    }
                }
                other => snapshot
                    .entries
                    .push(PropertyEntry::new(id.clone(), Vec::new(), other.clone())),
            }
        }
        snapshot
    }

    /// Append the trait annotations of `annotations`, ignoring other keys
    pub fn push_annotations(
        &mut self,
        annotations: &BTreeMap<String, String>,
    ) -> Result<(), ConfigError> {
        for (key, value) in annotations {
            if let Some((id, prop)) = parse_annotation_key(key)? {
                self.push_raw(id, &prop, value)?;
            }
        }
        Ok(())
    }

    /// Append `<trait>.<property>=<value>` options
    pub fn push_options<S: AsRef<str>>(&mut self, options: &[S]) -> Result<(), ConfigError> {
        for option in options {
            let (id, prop, value) = parse_trait_option(option.as_ref())?;
            self.push_raw(id, &prop, &value)?;
        }
        Ok(())
    }

    fn push_raw(&mut self, id: String, prop: &str, value: &str) -> Result<(), ConfigError> {
        let path = split_property_path(prop).map_err(|reason| DecodeError::InvalidPath {
            trait_id: id.clone(),
            path: prop.to_string(),
            reason,
        })?;
        self.entries
            .push(PropertyEntry::new(id, path, Value::String(value.to_string())));
        Ok(())
    }
}

fn flatten(id: &str, path: Vec<PathSegment>, value: &Value, out: &mut Vec<PropertyEntry>) {
    match value {
        Value::Object(map) if !map.is_empty() => {
            for (key, child) in map {
                let mut child_path = path.clone();
                child_path.push(PathSegment::Key(key.clone()));
                flatten(id, child_path, child, out);
            }
        }
        Value::Object(_) => {}
        other => out.push(PropertyEntry::new(id, path, other.clone())),
    }
}

/// Build the four layers of a document, lowest precedence first.
///
/// The annotations layer holds the platform, kit and integration annotations
/// in that order, followed by `options`.
pub fn document_layers<S: AsRef<str>>(
    document: &IntegrationDocument,
    options: &[S],
) -> Result<Vec<LayerSnapshot>, ConfigError> {
    let empty = TraitSpecs::new();
    let platform = document.platform.as_ref().map_or(&empty, |p| &p.traits);
    let kit = document.kit.as_ref().map_or(&empty, |k| &k.traits);

    let mut annotations = LayerSnapshot::new(ConfigLayer::Annotations);
    if let Some(p) = &document.platform {
        annotations.push_annotations(&p.annotations)?;
    }
    if let Some(k) = &document.kit {
        annotations.push_annotations(&k.annotations)?;
    }
    annotations.push_annotations(&document.integration.annotations)?;
    annotations.push_options(options)?;

    Ok(vec![
        LayerSnapshot::from_trait_specs(ConfigLayer::Platform, platform),
        LayerSnapshot::from_trait_specs(ConfigLayer::Kit, kit),
        LayerSnapshot::from_trait_specs(ConfigLayer::Instance, &document.integration.traits),
        annotations,
    ])
}

/// Merged configuration: exactly one property map per trait id
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CapabilityConfig {
    traits: BTreeMap<String, PropertyMap>,
}

impl CapabilityConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, trait_id: &str) -> Option<&PropertyMap> {
        self.traits.get(trait_id)
    }

    pub fn get_mut(&mut self, trait_id: &str) -> &mut PropertyMap {
        self.traits.entry(trait_id.to_string()).or_default()
    }

    pub fn contains(&self, trait_id: &str) -> bool {
        self.traits.contains_key(trait_id)
    }

    /// Typed view over one trait's properties
    pub fn properties<'a>(&'a self, trait_id: &'a str) -> Properties<'a> {
        Properties::new(trait_id, self.traits.get(trait_id))
    }

    pub fn set_property(&mut self, trait_id: &str, name: &str, value: Value) {
        self.get_mut(trait_id).insert(name.to_string(), value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &PropertyMap)> {
        self.traits.iter()
    }

    pub fn len(&self) -> usize {
        self.traits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traits.is_empty()
    }
}
