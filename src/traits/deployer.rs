use crate::cluster::set_env_var;
use crate::config::properties::{PropertyKind, PropertySpec, ENABLED};

use super::strategy::{ControllerStrategy, ControllerStrategySelector};
use super::{Configured, Environment, Trait, TraitError, EXPLICITLY_DISABLED};

pub const ID: &str = "deployer";

const PROPERTIES: &[PropertySpec] = &[
    ENABLED,
    PropertySpec::new(
        "kind",
        PropertyKind::String,
        "Force the controller kind: deployment, knative-service or cron-job",
    ),
];

/// Lets users force the controller strategy and finalizes the pod templates
/// of whatever controller ends up being generated.
pub struct DeployerTrait;

impl DeployerTrait {
    fn kind(env: &Environment) -> Result<Option<ControllerStrategy>, TraitError> {
        let props = env.properties(ID);
        if props.enabled()? == Some(false) {
            return Ok(None);
        }
        match props.string("kind")? {
            None => Ok(None),
            Some(kind) => kind
                .parse()
                .map(Some)
                .map_err(|message| TraitError::invalid(ID, message)),
        }
    }
}

impl ControllerStrategySelector for DeployerTrait {
    fn select_controller_strategy(&self, env: &Environment) -> Option<ControllerStrategy> {
        // An invalid kind is reported by configure
        Self::kind(env).ok().flatten()
    }

    fn selector_priority(&self) -> i32 {
        0
    }
}

impl Trait for DeployerTrait {
    fn id(&self) -> &'static str {
        ID
    }

    fn order(&self) -> i32 {
        900
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
        Self::kind(env)?;
        Ok(Configured::when(env.in_running_phases()))
    }

    fn apply(&self, env: &mut Environment) -> Result<(), TraitError> {
        env.add_post_processor(Box::new(|env| {
            let name = env.integration().name.clone();
            let service_account = env.integration().service_account_name.clone();
            let vars = env.env_vars.clone();
            if let Some(template) = env
                .resources
                .controller_mut(&name)
                .and_then(|c| c.pod_template_mut())
            {
                for var in vars {
                    set_env_var(&mut template.env, &var.name, var.value);
                }
                if template.service_account_name.is_none() {
                    template.service_account_name = service_account;
                }
            }
            Ok(())
        }));
        Ok(())
    }
}
