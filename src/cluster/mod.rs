//! Cluster resources produced by the trait pipeline

pub mod collection;
pub mod resources;

pub use collection::Collection;
pub use resources::{
    set_env_var, CronJob, CronJobSpec, Deployment, DeploymentSpec, EnvVar, KnativeService,
    KnativeServiceSpec, LabelSelector, ObjectMeta, ObjectReference, OwnerReference, PodTemplate,
    Resource, ResourceKind, ResourceList, ScaledObject, ScaledObjectSpec, Service, ServicePort,
    ServiceSpec, DIGEST_ANNOTATION, INTEGRATION_LABEL,
};
