//! Event-driven autoscaling through KEDA
//!
//! Triggers come from two places: the `triggers` property and, with `auto`,
//! the consumer endpoints of the integration. Manual triggers go first. The
//! resulting `ScaledObject` targets whatever controller the pipeline produced,
//! so the trait runs after all controller traits.

use std::collections::BTreeMap;

use serde_json::Value;

use crate::cluster::{ObjectMeta, Resource, ScaledObject, ScaledObjectSpec};
use crate::cluster::INTEGRATION_LABEL;
use crate::config::properties::{PropertyKind, PropertySpec, ENABLED};
use crate::config::{DecodeError, Properties};
use crate::translate::keda::{combine_triggers, discover_triggers, KedaTrigger};

use super::{Configured, Environment, Trait, TraitError, EXPLICITLY_DISABLED};

pub const ID: &str = "keda";

const PROPERTIES: &[PropertySpec] = &[
    ENABLED,
    PropertySpec::new(
        "auto",
        PropertyKind::Bool,
        "Discover triggers from the integration endpoints",
    )
    .with_default("true"),
    PropertySpec::new(
        "triggers",
        PropertyKind::ObjectList,
        "Triggers to add on top of the discovered ones, each with type and metadata",
    ),
    PropertySpec::new(
        "polling-interval",
        PropertyKind::Int,
        "Interval in seconds between two checks of each trigger",
    ),
    PropertySpec::new(
        "cooldown-period",
        PropertyKind::Int,
        "Seconds to wait after the last active trigger before scaling back",
    ),
    PropertySpec::new(
        "idle-replica-count",
        PropertyKind::Int,
        "Replicas to keep when no trigger is active",
    ),
    PropertySpec::new(
        "min-replica-count",
        PropertyKind::Int,
        "Lower bound on the number of replicas",
    ),
    PropertySpec::new(
        "max-replica-count",
        PropertyKind::Int,
        "Upper bound on the number of replicas",
    ),
    PropertySpec::new(
        "auto-metadata",
        PropertyKind::Object,
        "Metadata overrides for discovered triggers, keyed by endpoint scheme",
    ),
];

/// Typed configuration of the trait, decoded from the resolved properties
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KedaConfig {
    pub enabled: Option<bool>,
    pub auto: bool,
    pub triggers: Vec<KedaTrigger>,
    /// Metadata overrides keyed by endpoint scheme
    pub auto_metadata: BTreeMap<String, BTreeMap<String, String>>,
    pub polling_interval: Option<i32>,
    pub cooldown_period: Option<i32>,
    pub idle_replica_count: Option<i32>,
    pub min_replica_count: Option<i32>,
    pub max_replica_count: Option<i32>,
}

impl KedaConfig {
    pub fn decode(props: Properties<'_>) -> Result<Self, DecodeError> {
        Ok(Self {
            enabled: props.enabled()?,
            auto: props.bool("auto")?.unwrap_or(true),
            triggers: props.deserialize("triggers")?.unwrap_or_default(),
            auto_metadata: props.deserialize("auto-metadata")?.unwrap_or_default(),
            polling_interval: props.i32("polling-interval")?,
            cooldown_period: props.i32("cooldown-period")?,
            idle_replica_count: props.i32("idle-replica-count")?,
            min_replica_count: props.i32("min-replica-count")?,
            max_replica_count: props.i32("max-replica-count")?,
        })
    }

    /// Manual triggers, followed by the discovered ones when `auto` is set
    fn triggers(&self, sources: &[String]) -> Result<Vec<KedaTrigger>, TraitError> {
        if !self.auto {
            return Ok(self.triggers.clone());
        }
        let discovered = discover_triggers(sources, &self.auto_metadata)?;
        Ok(combine_triggers(self.triggers.clone(), discovered))
    }
}

/// Scales the integration controller on external event sources
pub struct KedaTrait;

impl Trait for KedaTrait {
    fn id(&self) -> &'static str {
        ID
    }

    fn order(&self) -> i32 {
        2450
    }

    fn properties(&self) -> &'static [PropertySpec] {
        PROPERTIES
    }

    fn decode(&self, props: Properties<'_>) -> Result<(), DecodeError> {
        KedaConfig::decode(props).map(drop)
    }

    fn configure(&self, env: &mut Environment) -> Result<Configured, TraitError> {
        let config = KedaConfig::decode(env.properties(ID))?;
        match config.enabled {
            Some(false) => return Ok(Configured::disabled(EXPLICITLY_DISABLED)),
            None => return Ok(Configured::disabled("disabled by default")),
            Some(true) => {}
        }
        if !env.in_running_phases() {
            return Ok(Configured::skipped());
        }

        let triggers = config.triggers(env.sources())?;
        if triggers.is_empty() {
            return Ok(Configured::disabled("no triggers found"));
        }
        let value = serde_json::to_value(&triggers)
            .map_err(|e| TraitError::invalid(ID, e.to_string()))?;
        env.traits_config.set_property(ID, "triggers", value);
        env.traits_config
            .set_property(ID, "auto", Value::Bool(false));
        Ok(Configured::enabled())
    }

    fn apply(&self, env: &mut Environment) -> Result<(), TraitError> {
        let config = KedaConfig::decode(env.properties(ID))?;

        let integration = env.integration();
        let target = env
            .resources
            .controller(&integration.name)
            .map(|c| c.reference())
            .ok_or_else(|| TraitError::NoScaleTarget(integration.name.clone()))?;

        let scaled_object = ScaledObject {
            metadata: ObjectMeta::new(&integration.name, &integration.namespace)
                .with_label(INTEGRATION_LABEL, &integration.name),
            spec: ScaledObjectSpec {
                scale_target_ref: target,
                polling_interval: config.polling_interval,
                cooldown_period: config.cooldown_period,
                idle_replica_count: config.idle_replica_count,
                min_replica_count: config.min_replica_count,
                max_replica_count: config.max_replica_count,
                triggers: config.triggers,
            },
        };
        env.resources.add(Resource::ScaledObject(scaled_object));
        Ok(())
    }
}
