//! Capability modules ("traits") and the machinery that runs them
//!
//! A trait decides in `configure` whether it applies to the integration at
//! hand, and mutates the shared [`Environment`] in `apply` when it does. The
//! [`Catalog`] holds the fixed set of traits sorted by execution order and
//! drives the two phases for every pass.

pub mod camel;
pub mod catalog;
pub mod cron;
pub mod deployer;
pub mod deployment;
pub mod environment;
pub mod keda;
pub mod knative_service;
pub mod owner;
pub mod pipeline;
pub mod service;
pub mod strategy;

pub use catalog::Catalog;
pub use environment::{Environment, Processor};
pub use pipeline::ApplyError;
pub use strategy::{ControllerStrategy, ControllerStrategySelector};

use serde::Serialize;
use thiserror::Error;

use crate::config::{DecodeError, Profile, Properties, PropertySpec};
use crate::translate::UriError;

/// Errors raised by a single trait
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TraitError {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Uri(#[from] UriError),

    #[error("trait '{trait_id}': {message}")]
    Invalid { trait_id: String, message: String },

    #[error("no controller found for integration '{0}' to attach the autoscaler to")]
    NoScaleTarget(String),
}

impl TraitError {
    pub fn invalid(trait_id: &str, message: impl Into<String>) -> Self {
        TraitError::Invalid {
            trait_id: trait_id.to_string(),
            message: message.into(),
        }
    }
}

/// Outcome of the configure phase
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Configured {
    pub enabled: bool,
    pub reason: Option<String>,
}

impl Configured {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            reason: None,
        }
    }

    /// Not applicable, without anything worth reporting
    pub fn skipped() -> Self {
        Self {
            enabled: false,
            reason: None,
        }
    }

    pub fn disabled(reason: impl Into<String>) -> Self {
        Self {
            enabled: false,
            reason: Some(reason.into()),
        }
    }

    pub fn when(enabled: bool) -> Self {
        Self {
            enabled,
            reason: None,
        }
    }
}

/// Record of a configure decision, one per eligible trait
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraitCondition {
    #[serde(rename = "trait")]
    pub trait_id: String,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Reason reported when a user turned a trait off
pub const EXPLICITLY_DISABLED: &str = "explicitly disabled";

/// A capability module
pub trait Trait: Send + Sync {
    fn id(&self) -> &'static str;

    /// Execution order; ties are broken by id
    fn order(&self) -> i32;

    /// Configurable properties, `enabled` included
    fn properties(&self) -> &'static [PropertySpec];

    /// Decode the resolved properties, run once per pass before any trait
    /// is configured. Traits with structured properties override this to
    /// check the nested fields too.
    fn decode(&self, props: Properties<'_>) -> Result<(), DecodeError> {
        props.check(self.properties())
    }

    /// Whether the trait is skipped altogether without a platform
    fn requires_platform(&self) -> bool {
        true
    }

    /// Fundamental traits the platform needs to work
    fn is_platform_trait(&self) -> bool {
        false
    }

    fn is_allowed_in_profile(&self, _profile: Profile) -> bool {
        true
    }

    /// Traits able to pick the controller strategy return themselves here.
    /// Checked once, when the catalog is built.
    fn strategy_selector(&self) -> Option<&dyn ControllerStrategySelector> {
        None
    }

    /// Decide whether the trait applies. May record derived configuration
    /// but must not touch the resource collection.
    fn configure(&self, env: &mut Environment) -> Result<Configured, TraitError>;

    fn apply(&self, env: &mut Environment) -> Result<(), TraitError>;
}

/// The built-in traits, in no particular order
pub fn default_traits() -> Vec<Box<dyn Trait>> {
    vec![
        Box::new(camel::CamelTrait),
        Box::new(deployer::DeployerTrait),
        Box::new(cron::CronTrait),
        Box::new(deployment::DeploymentTrait),
        Box::new(knative_service::KnativeServiceTrait),
        Box::new(service::ServiceTrait),
        Box::new(keda::KedaTrait),
        Box::new(owner::OwnerTrait),
    ]
}
