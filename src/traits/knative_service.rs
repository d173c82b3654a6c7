use std::collections::BTreeMap;

use serde_json::Value;

use crate::cluster::{KnativeService, KnativeServiceSpec, ObjectMeta, PodTemplate, Resource};
use crate::cluster::INTEGRATION_LABEL;
use crate::config::properties::{PropertyKind, PropertySpec, ENABLED};
use crate::config::Profile;

use super::strategy::{ControllerStrategy, ControllerStrategySelector};
use super::{Configured, Environment, Trait, TraitError, EXPLICITLY_DISABLED};

pub const ID: &str = "knative-service";

pub const CLASS_ANNOTATION: &str = "autoscaling.knative.dev/class";
pub const METRIC_ANNOTATION: &str = "autoscaling.knative.dev/metric";
pub const TARGET_ANNOTATION: &str = "autoscaling.knative.dev/target";
pub const MIN_SCALE_ANNOTATION: &str = "autoscaling.knative.dev/minScale";
pub const MAX_SCALE_ANNOTATION: &str = "autoscaling.knative.dev/maxScale";

const PROPERTIES: &[PropertySpec] = &[
    ENABLED,
    PropertySpec::new(
        "autoscaling-class",
        PropertyKind::String,
        "Knative autoscaler class, e.g. kpa.autoscaling.knative.dev or hpa.autoscaling.knative.dev",
    ),
    PropertySpec::new(
        "autoscaling-metric",
        PropertyKind::String,
        "Autoscaling metric, e.g. concurrency or cpu",
    ),
    PropertySpec::new(
        "autoscaling-target",
        PropertyKind::Int,
        "Autoscaling target level for the chosen metric",
    ),
    PropertySpec::new(
        "min-scale",
        PropertyKind::Int,
        "Minimum number of pods; 0 allows scaling to zero",
    ),
    PropertySpec::new(
        "max-scale",
        PropertyKind::Int,
        "Upper bound on the number of pods",
    ),
    PropertySpec::new(
        "auto",
        PropertyKind::Bool,
        "Keep one pod alive for integrations that cannot be woken up by a request",
    )
    .with_default("true"),
];

/// Runs HTTP-triggered integrations as scale-to-zero Knative services
pub struct KnativeServiceTrait;

impl ControllerStrategySelector for KnativeServiceTrait {
    fn select_controller_strategy(&self, env: &Environment) -> Option<ControllerStrategy> {
        if env.properties(ID).enabled().ok()? == Some(false) {
            return None;
        }
        if env.exposes_http_services() && env.passive_endpoints() {
            return Some(ControllerStrategy::KnativeService);
        }
        None
    }

    fn selector_priority(&self) -> i32 {
        100
    }
}

impl Trait for KnativeServiceTrait {
    fn id(&self) -> &'static str {
        ID
    }

    fn order(&self) -> i32 {
        1400
    }

    fn properties(&self) -> &'static [PropertySpec] {
        PROPERTIES
    }

    fn is_allowed_in_profile(&self, profile: Profile) -> bool {
        profile == Profile::Knative
    }

    fn strategy_selector(&self) -> Option<&dyn ControllerStrategySelector> {
        Some(self)
    }

    fn configure(&self, env: &mut Environment) -> Result<Configured, TraitError> {
        let props = env.properties(ID);
        if props.enabled()? == Some(false) {
            return Ok(Configured::disabled(EXPLICITLY_DISABLED));
        }
        if !env.in_running_phases() {
            return Ok(Configured::skipped());
        }
        let auto = props.bool("auto")?.unwrap_or(true);
        let min_scale = props.i32("min-scale")?;

        if env.resources.deployment(&env.integration().name).is_some() {
            return Ok(Configured::disabled(format!(
                "controller strategy: {}",
                ControllerStrategy::Deployment
            )));
        }

        let strategy = env.determine_controller_strategy();
        if strategy != ControllerStrategy::KnativeService {
            return Ok(Configured::disabled(format!(
                "controller strategy: {}",
                strategy
            )));
        }

        // Only requests can wake a service up, anything else needs a live pod
        if auto && min_scale.is_none() && !(env.exposes_http_services() && env.passive_endpoints()) {
            env.traits_config
                .set_property(ID, "min-scale", Value::from(1));
        }
        Ok(Configured::enabled())
    }

    fn apply(&self, env: &mut Environment) -> Result<(), TraitError> {
        let props = env.properties(ID);
        let mut autoscaling = BTreeMap::new();
        if let Some(class) = props.string("autoscaling-class")? {
            autoscaling.insert(CLASS_ANNOTATION.to_string(), class);
        }
        if let Some(metric) = props.string("autoscaling-metric")? {
            autoscaling.insert(METRIC_ANNOTATION.to_string(), metric);
        }
        if let Some(target) = props.i32("autoscaling-target")? {
            autoscaling.insert(TARGET_ANNOTATION.to_string(), target.to_string());
        }
        if let Some(min) = props.i32("min-scale")?.filter(|v| *v > 0) {
            autoscaling.insert(MIN_SCALE_ANNOTATION.to_string(), min.to_string());
        }
        if let Some(max) = props.i32("max-scale")?.filter(|v| *v > 0) {
            autoscaling.insert(MAX_SCALE_ANNOTATION.to_string(), max.to_string());
        }

        let integration = env.integration();
        let mut metadata = ObjectMeta::new(&integration.name, &integration.namespace)
            .with_label(INTEGRATION_LABEL, &integration.name);
        metadata.annotations = integration.annotations.clone();

        let mut template_annotations = integration.annotations.clone();
        template_annotations.extend(autoscaling);
        let template = PodTemplate {
            labels: metadata.labels.clone(),
            annotations: template_annotations,
            service_account_name: integration.service_account_name.clone(),
            ..Default::default()
        };

        let service = KnativeService {
            metadata,
            spec: KnativeServiceSpec { template },
        };
        env.resources.add(Resource::KnativeService(service));
        Ok(())
    }
}
