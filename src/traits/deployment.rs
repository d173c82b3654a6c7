use crate::cluster::{Deployment, DeploymentSpec, LabelSelector, ObjectMeta, PodTemplate, Resource};
use crate::cluster::INTEGRATION_LABEL;
use crate::config::properties::{PropertyKind, PropertySpec, ENABLED};

use super::strategy::{ControllerStrategy, ControllerStrategySelector};
use super::{Configured, Environment, Trait, TraitError, EXPLICITLY_DISABLED};

pub const ID: &str = "deployment";

const PROPERTIES: &[PropertySpec] = &[
    ENABLED,
    PropertySpec::new(
        "replicas",
        PropertyKind::Int,
        "Number of desired pods",
    ),
];

/// Runs the integration as an always-on Deployment, the fallback strategy
pub struct DeploymentTrait;

impl ControllerStrategySelector for DeploymentTrait {
    fn select_controller_strategy(&self, env: &Environment) -> Option<ControllerStrategy> {
        match env.properties(ID).enabled() {
            Ok(Some(false)) => None,
            _ => Some(ControllerStrategy::Deployment),
        }
    }

    fn selector_priority(&self) -> i32 {
        10000
    }
}

impl Trait for DeploymentTrait {
    fn id(&self) -> &'static str {
        ID
    }

    fn order(&self) -> i32 {
        1100
    }

    fn properties(&self) -> &'static [PropertySpec] {
        PROPERTIES
    }

    fn strategy_selector(&self) -> Option<&dyn ControllerStrategySelector> {
        Some(self)
    }

    fn configure(&self, env: &mut Environment) -> Result<Configured, TraitError> {
        if env.properties(ID).enabled()? == Some(false) {
            return Ok(Configured::disabled(EXPLICITLY_DISABLED));
        }
        if !env.in_running_phases() {
            return Ok(Configured::skipped());
        }

        let strategy = env.determine_controller_strategy();
        if strategy != ControllerStrategy::Deployment {
            return Ok(Configured::disabled(format!(
                "controller strategy: {}",
                strategy
            )));
        }

        let name = env.integration().name.clone();
        if let Some(existing) = env.resources.controller(&name) {
            return Ok(Configured::disabled(format!(
                "integration already runs as a {}",
                existing.kind()
            )));
        }
        Ok(Configured::enabled())
    }

    fn apply(&self, env: &mut Environment) -> Result<(), TraitError> {
        let replicas = env.properties(ID).i32("replicas")?;
        let integration = env.integration();

        let mut metadata = ObjectMeta::new(&integration.name, &integration.namespace)
            .with_label(INTEGRATION_LABEL, &integration.name);
        metadata.annotations = integration.annotations.clone();

        let selector = LabelSelector::matching(INTEGRATION_LABEL, &integration.name);
        let template = PodTemplate {
            labels: selector.match_labels.clone(),
            service_account_name: integration.service_account_name.clone(),
            ..Default::default()
        };

        let deployment = Deployment {
            metadata,
            spec: DeploymentSpec {
                replicas,
                selector,
                template,
            },
        };
        env.resources.add(Resource::Deployment(deployment));
        Ok(())
    }
}
