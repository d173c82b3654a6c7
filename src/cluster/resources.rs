//! Resource types emitted by the trait pipeline
//!
//! Only the fields the traits in this crate actually decide on are modelled.
//! Everything is kept in ordered maps so that two passes over the same input
//! serialize to the same bytes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::translate::keda::KedaTrigger;

/// Label carried by every resource generated for an integration
pub const INTEGRATION_LABEL: &str = "camel.apache.org/integration";

/// Annotation holding the digest of the resolved configuration
pub const DIGEST_ANNOTATION: &str = "camel.apache.org/digest";

/// Standard object metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,

    pub namespace: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    #[serde(rename = "ownerReferences")]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owner_references: Vec<OwnerReference>,
}

impl ObjectMeta {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }
}

/// Reference from a generated resource to the integration that owns it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OwnerReference {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub name: String,
    pub uid: Uuid,
    #[serde(rename = "blockOwnerDeletion")]
    pub block_owner_deletion: bool,
    pub controller: bool,
}

/// Reference to another object by kind and name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectReference {
    #[serde(rename = "apiVersion")]
    pub api_version: String,
    pub kind: String,
    pub name: String,
}

/// Environment variable injected into the integration container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub value: String,
}

impl EnvVar {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Set or replace a variable in a list, keeping the list order stable
pub fn set_env_var(vars: &mut Vec<EnvVar>, name: &str, value: impl Into<String>) {
    let value = value.into();
    match vars.iter_mut().find(|v| v.name == name) {
        Some(existing) => existing.value = value,
        None => vars.push(EnvVar::new(name, value)),
    }
}

/// Pod template shared by all controller kinds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PodTemplate {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,

    #[serde(rename = "serviceAccountName")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_name: Option<String>,

    #[serde(rename = "restartPolicy")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart_policy: Option<String>,
}

/// Always-on controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deployment {
    pub metadata: ObjectMeta,
    pub spec: DeploymentSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,

    #[serde(default)]
    pub selector: LabelSelector,

    pub template: PodTemplate,
}

/// Scale-to-zero controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnativeService {
    pub metadata: ObjectMeta,
    pub spec: KnativeServiceSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnativeServiceSpec {
    pub template: PodTemplate,
}

/// Scheduled controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CronJob {
    pub metadata: ObjectMeta,
    pub spec: CronJobSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CronJobSpec {
    pub schedule: String,
    pub template: PodTemplate,
}

/// Network service in front of a deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub metadata: ObjectMeta,
    pub spec: ServiceSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceSpec {
    #[serde(rename = "type")]
    pub service_type: String,

    #[serde(default)]
    pub selector: BTreeMap<String, String>,

    #[serde(default)]
    pub ports: Vec<ServicePort>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServicePort {
    pub name: String,
    pub port: i32,
    #[serde(rename = "targetPort")]
    pub target_port: i32,
    pub protocol: String,
}

/// Autoscaler bound to a controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaledObject {
    pub metadata: ObjectMeta,
    pub spec: ScaledObjectSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScaledObjectSpec {
    #[serde(rename = "scaleTargetRef")]
    pub scale_target_ref: ObjectReference,

    #[serde(rename = "pollingInterval")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub polling_interval: Option<i32>,

    #[serde(rename = "cooldownPeriod")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cooldown_period: Option<i32>,

    #[serde(rename = "idleReplicaCount")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_replica_count: Option<i32>,

    #[serde(rename = "minReplicaCount")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_replica_count: Option<i32>,

    #[serde(rename = "maxReplicaCount")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_replica_count: Option<i32>,

    pub triggers: Vec<KedaTrigger>,
}

/// Kind discriminator for [`Resource`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceKind {
    Deployment,
    KnativeService,
    CronJob,
    Service,
    ScaledObject,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Deployment => "Deployment",
            ResourceKind::KnativeService => "Service.serving.knative.dev",
            ResourceKind::CronJob => "CronJob",
            ResourceKind::Service => "Service",
            ResourceKind::ScaledObject => "ScaledObject",
        }
    }

    pub fn api_version(&self) -> &'static str {
        match self {
            ResourceKind::Deployment => "apps/v1",
            ResourceKind::KnativeService => "serving.knative.dev/v1",
            ResourceKind::CronJob => "batch/v1",
            ResourceKind::Service => "v1",
            ResourceKind::ScaledObject => "keda.sh/v1alpha1",
        }
    }

    /// Kinds that run the integration
    pub fn is_controller(&self) -> bool {
        matches!(
            self,
            ResourceKind::Deployment | ResourceKind::KnativeService | ResourceKind::CronJob
        )
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A generated resource, discriminated by kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Resource {
    Deployment(Deployment),
    #[serde(rename = "Service.serving.knative.dev")]
    KnativeService(KnativeService),
    CronJob(CronJob),
    Service(Service),
    ScaledObject(ScaledObject),
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Deployment(_) => ResourceKind::Deployment,
            Resource::KnativeService(_) => ResourceKind::KnativeService,
            Resource::CronJob(_) => ResourceKind::CronJob,
            Resource::Service(_) => ResourceKind::Service,
            Resource::ScaledObject(_) => ResourceKind::ScaledObject,
        }
    }

    pub fn metadata(&self) -> &ObjectMeta {
        match self {
            Resource::Deployment(r) => &r.metadata,
            Resource::KnativeService(r) => &r.metadata,
            Resource::CronJob(r) => &r.metadata,
            Resource::Service(r) => &r.metadata,
            Resource::ScaledObject(r) => &r.metadata,
        }
    }

    pub fn metadata_mut(&mut self) -> &mut ObjectMeta {
        match self {
            Resource::Deployment(r) => &mut r.metadata,
            Resource::KnativeService(r) => &mut r.metadata,
            Resource::CronJob(r) => &mut r.metadata,
            Resource::Service(r) => &mut r.metadata,
            Resource::ScaledObject(r) => &mut r.metadata,
        }
    }

    pub fn name(&self) -> &str {
        &self.metadata().name
    }

    /// Pod template of controller resources
    pub fn pod_template_mut(&mut self) -> Option<&mut PodTemplate> {
        match self {
            Resource::Deployment(r) => Some(&mut r.spec.template),
            Resource::KnativeService(r) => Some(&mut r.spec.template),
            Resource::CronJob(r) => Some(&mut r.spec.template),
            Resource::Service(_) | Resource::ScaledObject(_) => None,
        }
    }

    /// Reference usable as a scale target or owner pointer
    pub fn reference(&self) -> ObjectReference {
        let kind = self.kind();
        let kind_name = match kind {
            ResourceKind::KnativeService => "Service",
            other => other.as_str(),
        };
        ObjectReference {
            api_version: kind.api_version().to_string(),
            kind: kind_name.to_string(),
            name: self.name().to_string(),
        }
    }
}

/// Label selector for filtering resources
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelSelector {
    /// Match exact labels
    #[serde(rename = "matchLabels")]
    #[serde(default)]
    pub match_labels: BTreeMap<String, String>,
}

impl LabelSelector {
    /// Create a selector that matches a specific label
    pub fn matching(key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut labels = BTreeMap::new();
        labels.insert(key.into(), value.into());
        Self {
            match_labels: labels,
        }
    }

    /// Check if labels match this selector
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.match_labels
            .iter()
            .all(|(k, v)| labels.get(k) == Some(v))
    }
}

/// Envelope used when printing a set of resources
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceList<T> {
    /// API version
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Kind, always "List"
    pub kind: String,

    /// List of items
    pub items: Vec<T>,
}

impl<T> ResourceList<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            api_version: "v1".to_string(),
            kind: "List".to_string(),
            items,
        }
    }
}
