use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur while parsing an integration document
#[derive(Error, Debug, PartialEq)]
pub enum DocumentError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Integration name must not be empty")]
    MissingName,

    #[error("Trait configuration for '{0}' must be a map")]
    InvalidTraitSpec(String),
}

/// Trait configuration as written by users: trait id to property bag
pub type TraitSpecs = BTreeMap<String, Value>;

/// Deployment context filtering which traits may run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    Kubernetes,
    #[serde(alias = "openshift")]
    OpenShift,
    Knative,
}

impl Profile {
    pub const DEFAULT: Profile = Profile::Kubernetes;

    pub fn as_str(&self) -> &'static str {
        match self {
            Profile::Kubernetes => "kubernetes",
            Profile::OpenShift => "openshift",
            Profile::Knative => "knative",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Profile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "kubernetes" => Ok(Profile::Kubernetes),
            "openshift" => Ok(Profile::OpenShift),
            "knative" => Ok(Profile::Knative),
            other => Err(format!(
                "unknown profile '{}', expected one of kubernetes, openshift, knative",
                other
            )),
        }
    }
}

/// Lifecycle phase of the integration being processed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntegrationPhase {
    Initialization,
    BuildingKit,
    #[default]
    Deploying,
    Running,
}

impl IntegrationPhase {
    /// Phases in which controllers and other resources are generated
    pub fn is_deploying_or_running(&self) -> bool {
        matches!(self, IntegrationPhase::Deploying | IntegrationPhase::Running)
    }
}

/// Platform-wide defaults
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlatformSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,

    #[serde(rename = "runtimeVersion")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime_version: Option<String>,

    #[serde(default)]
    pub traits: TraitSpecs,

    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

/// Build-kit overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KitSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,

    #[serde(default)]
    pub traits: TraitSpecs,

    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

/// The integration instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationSpec {
    pub name: String,

    #[serde(default = "default_namespace")]
    pub namespace: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<Uuid>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,

    #[serde(default)]
    pub phase: IntegrationPhase,

    #[serde(rename = "serviceAccountName")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,

    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    #[serde(default)]
    pub annotations: BTreeMap<String, String>,

    #[serde(default)]
    pub traits: TraitSpecs,

    /// Endpoint URIs the routes consume from
    #[serde(default)]
    pub sources: Vec<String>,

    #[serde(default)]
    pub dependencies: Vec<String>,
}

fn default_namespace() -> String {
    "default".to_string()
}

impl IntegrationSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: default_namespace(),
            uid: None,
            profile: None,
            phase: IntegrationPhase::default(),
            service_account_name: None,
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
            traits: TraitSpecs::new(),
            sources: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    pub fn with_source(mut self, uri: impl Into<String>) -> Self {
        self.sources.push(uri.into());
        self
    }

    pub fn with_trait(mut self, id: impl Into<String>, config: Value) -> Self {
        self.traits.insert(id.into(), config);
        self
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    pub fn with_phase(mut self, phase: IntegrationPhase) -> Self {
        self.phase = phase;
        self
    }

    /// Add a dependency unless already present
    pub fn add_dependency(&mut self, dependency: impl Into<String>) {
        let dependency = dependency.into();
        if !self.dependencies.contains(&dependency) {
            self.dependencies.push(dependency);
        }
    }
}

/// Knowledge about Camel components the traits rely on
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CamelCatalogSpec {
    /// Consumers that never trigger on their own
    #[serde(rename = "passiveSchemes", default = "default_passive_schemes")]
    pub passive_schemes: BTreeSet<String>,

    /// Consumers that expose an HTTP endpoint
    #[serde(rename = "httpSchemes", default = "default_http_schemes")]
    pub http_schemes: BTreeSet<String>,
}

impl Default for CamelCatalogSpec {
    fn default() -> Self {
        Self {
            passive_schemes: default_passive_schemes(),
            http_schemes: default_http_schemes(),
        }
    }
}

fn default_passive_schemes() -> BTreeSet<String> {
    [
        "bean",
        "class",
        "controlbus",
        "direct",
        "language",
        "log",
        "mock",
        "ref",
        "seda",
        "stub",
        "validator",
        "vm",
        "xslt",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_http_schemes() -> BTreeSet<String> {
    ["jetty", "knative", "netty-http", "platform-http", "rest", "servlet", "undertow"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// The complete input of a resolution pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrationDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<PlatformSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kit: Option<KitSpec>,

    pub integration: IntegrationSpec,

    #[serde(default)]
    pub catalog: CamelCatalogSpec,
}

impl IntegrationDocument {
    pub fn new(integration: IntegrationSpec) -> Self {
        Self {
            platform: None,
            kit: None,
            integration,
            catalog: CamelCatalogSpec::default(),
        }
    }

    pub fn with_platform(mut self, platform: PlatformSpec) -> Self {
        self.platform = Some(platform);
        self
    }

    pub fn with_kit(mut self, kit: KitSpec) -> Self {
        self.kit = Some(kit);
        self
    }
}

/// Parse a YAML or JSON integration document.
/// This is a pure function - no I/O.
pub fn parse_document(content: &str) -> Result<IntegrationDocument, DocumentError> {
    let document: IntegrationDocument =
        serde_yaml::from_str(content).map_err(|e| DocumentError::ParseError(e.to_string()))?;
    validate_document(&document)?;
    Ok(document)
}

/// Check the parts of a document serde cannot.
/// This is a pure function - no I/O.
pub fn validate_document(document: &IntegrationDocument) -> Result<(), DocumentError> {
    if document.integration.name.trim().is_empty() {
        return Err(DocumentError::MissingName);
    }

    let platform = document.platform.iter().map(|p| &p.traits);
    let kit = document.kit.iter().map(|k| &k.traits);
    let all = platform
        .chain(kit)
        .chain(std::iter::once(&document.integration.traits));
    for specs in all {
        for (id, spec) in specs {
            if !(spec.is_object() || spec.is_null()) {
                return Err(DocumentError::InvalidTraitSpec(id.clone()));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_yaml_document() {
        let content = r#"
platform:
  profile: knative
  traits:
    cron:
      auto: false
integration:
  name: hello
  sources:
    - timer:tick?period=1m
  annotations:
    trait.camel.apache.org/cron.schedule: "0/5 * * * ?"
"#;
        let doc = parse_document(content).unwrap();
        assert_eq!(doc.integration.name, "hello");
        assert_eq!(doc.integration.namespace, "default");
        assert_eq!(doc.integration.phase, IntegrationPhase::Deploying);
        assert_eq!(doc.platform.unwrap().profile, Some(Profile::Knative));
        assert!(doc.catalog.passive_schemes.contains("direct"));
    }

    #[test]
    fn test_parse_json_document() {
        let content = r#"{"integration": {"name": "j", "phase": "initialization"}}"#;
        let doc = parse_document(content).unwrap();
        assert_eq!(doc.integration.phase, IntegrationPhase::Initialization);
        assert!(doc.platform.is_none());
    }

    #[test]
    fn test_missing_name() {
        let content = r#"{"integration": {"name": " "}}"#;
        assert_eq!(parse_document(content).unwrap_err(), DocumentError::MissingName);
    }

    #[test]
    fn test_trait_spec_must_be_map() {
        let content = r#"{"integration": {"name": "x", "traits": {"cron": "yes"}}}"#;
        assert_eq!(
            parse_document(content).unwrap_err(),
            DocumentError::InvalidTraitSpec("cron".to_string())
        );
    }

    #[test]
    fn test_profile_from_str() {
        assert_eq!("Knative".parse::<Profile>().unwrap(), Profile::Knative);
        assert_eq!("openshift".parse::<Profile>().unwrap(), Profile::OpenShift);
        assert!("swarm".parse::<Profile>().is_err());
    }

    #[test]
    fn test_add_dependency_is_unique() {
        let mut spec = IntegrationSpec::new("x");
        spec.add_dependency("camel:quartz");
        spec.add_dependency("camel:quartz");
        assert_eq!(spec.dependencies, vec!["camel:quartz"]);
    }
}
