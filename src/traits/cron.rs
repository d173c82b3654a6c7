//! Runs periodic integrations as Kubernetes CronJobs
//!
//! When every consumer of the integration is a timer, quartz or cron endpoint
//! agreeing on one schedule, the integration does not need to run all the
//! time: a CronJob starts it on schedule and the runtime replaces the
//! consumers with a one-shot trigger (`CAMEL_K_CRON_OVERRIDE`).

use serde_json::Value;

use crate::cluster::{set_env_var, CronJob, CronJobSpec, ObjectMeta, PodTemplate, Resource};
use crate::cluster::INTEGRATION_LABEL;
use crate::config::properties::{PropertyKind, PropertySpec, ENABLED};
use crate::config::IntegrationPhase;
use crate::translate::cron::{global_schedule, CronInfo};
use crate::translate::uri::component;

use super::strategy::{ControllerStrategy, ControllerStrategySelector};
use super::{Configured, Environment, Trait, TraitError, EXPLICITLY_DISABLED};

pub const ID: &str = "cron";

/// Dependency replacing the CronJob when falling back to in-process scheduling
pub const FALLBACK_DEPENDENCY: &str = "camel:quartz";

const CRON_RUNTIME_DEPENDENCY: &str = "mvn:org.apache.camel.k/camel-k-runtime-cron";

const GENERIC_CRON_COMPONENT: &str = "cron";

pub const CRON_OVERRIDE_ENV: &str = "CAMEL_K_CRON_OVERRIDE";

const PROPERTIES: &[PropertySpec] = &[
    ENABLED,
    PropertySpec::new(
        "schedule",
        PropertyKind::String,
        "The CronJob schedule for the whole integration",
    ),
    PropertySpec::new(
        "components",
        PropertyKind::StringList,
        "Camel components to override with a one-shot trigger when run from a CronJob",
    ),
    PropertySpec::new(
        "fallback",
        PropertyKind::Bool,
        "Use the default Camel implementation of the cron endpoint instead of a CronJob",
    ),
    PropertySpec::new(
        "auto",
        PropertyKind::Bool,
        "Derive schedule and components from the integration endpoints",
    )
    .with_default("true"),
];

pub struct CronTrait;

impl CronTrait {
    fn global_cron(env: &Environment) -> Option<CronInfo> {
        global_schedule(env.sources(), &env.document.catalog.passive_schemes)
    }
}

impl ControllerStrategySelector for CronTrait {
    fn select_controller_strategy(&self, env: &Environment) -> Option<ControllerStrategy> {
        let props = env.properties(ID);
        if props.enabled().ok()? == Some(false) || props.bool("fallback").ok()? == Some(true) {
            return None;
        }
        if props.string("schedule").ok()?.is_some() {
            return Some(ControllerStrategy::CronJob);
        }
        if props.bool("auto").ok()?.unwrap_or(true) && Self::global_cron(env).is_some() {
            return Some(ControllerStrategy::CronJob);
        }
        None
    }

    fn selector_priority(&self) -> i32 {
        1000
    }
}

impl Trait for CronTrait {
    fn id(&self) -> &'static str {
        ID
    }

    fn order(&self) -> i32 {
        1000
    }

    fn properties(&self) -> &'static [PropertySpec] {
        PROPERTIES
    }

    fn strategy_selector(&self) -> Option<&dyn ControllerStrategySelector> {
        Some(self)
    }

    fn configure(&self, env: &mut Environment) -> Result<Configured, TraitError> {
        let props = env.properties(ID);
        if props.enabled()? == Some(false) {
            return Ok(Configured::disabled(EXPLICITLY_DISABLED));
        }
        if !env.in_phase(&[
            IntegrationPhase::Initialization,
            IntegrationPhase::Deploying,
            IntegrationPhase::Running,
        ]) {
            return Ok(Configured::skipped());
        }

        let mut schedule = props.string("schedule")?;
        let mut components = props.string_list("components")?;
        let mut fallback = props.bool("fallback")?;
        let auto = props.bool("auto")?.unwrap_or(true);

        if auto {
            if let Some(global) = Self::global_cron(env) {
                if schedule.is_none() {
                    schedule = Some(global.schedule);
                }
                for c in global.components {
                    if !components.contains(&c) {
                        components.push(c);
                    }
                }
            }
            if schedule.is_none() && components.is_empty() && fallback.is_none() {
                let has_generic_cron = env
                    .sources()
                    .iter()
                    .any(|uri| component(uri) == GENERIC_CRON_COMPONENT);
                if has_generic_cron {
                    fallback = Some(true);
                }
            }
        }

        // Derived values become part of the resolved configuration
        let config = &mut env.traits_config;
        if let Some(s) = &schedule {
            config.set_property(ID, "schedule", Value::String(s.clone()));
        }
        if !components.is_empty() {
            config.set_property(
                ID,
                "components",
                Value::Array(components.into_iter().map(Value::String).collect()),
            );
        }
        if let Some(f) = fallback {
            config.set_property(ID, "fallback", Value::Bool(f));
        }

        if fallback == Some(true) {
            return Ok(Configured::enabled());
        }

        let strategy = env.determine_controller_strategy();
        if strategy != ControllerStrategy::CronJob {
            return Ok(Configured::disabled(format!(
                "controller strategy: {}",
                strategy
            )));
        }
        if schedule.is_none() {
            return Ok(Configured::disabled("no schedule could be determined"));
        }
        Ok(Configured::enabled())
    }

    fn apply(&self, env: &mut Environment) -> Result<(), TraitError> {
        let props = env.properties(ID);
        let fallback = props.bool("fallback")?.unwrap_or(false);
        let schedule = props.string("schedule")?.unwrap_or_default();
        let components = props.string_list("components")?;

        if fallback {
            if env.in_phase(&[IntegrationPhase::Initialization]) {
                env.add_dependency(FALLBACK_DEPENDENCY);
            }
            return Ok(());
        }

        if env.in_phase(&[IntegrationPhase::Initialization]) {
            env.add_dependency(CRON_RUNTIME_DEPENDENCY);
        } else if env.in_running_phases() {
            let cron_job = cron_job_for(env, schedule);
            env.resources.add(Resource::CronJob(cron_job));
            set_env_var(&mut env.env_vars, CRON_OVERRIDE_ENV, components.join(","));
        }
        Ok(())
    }
}

fn cron_job_for(env: &Environment, schedule: String) -> CronJob {
    let integration = env.integration();
    let mut metadata = ObjectMeta::new(&integration.name, &integration.namespace)
        .with_label(INTEGRATION_LABEL, &integration.name);
    metadata.annotations = integration.annotations.clone();

    let template = PodTemplate {
        labels: metadata.labels.clone(),
        service_account_name: integration.service_account_name.clone(),
        restart_policy: Some("Never".to_string()),
        ..Default::default()
    };

    CronJob {
        metadata,
        spec: CronJobSpec { schedule, template },
    }
}
