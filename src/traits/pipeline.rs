//! Two-phase execution of the catalog against one environment

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use super::{Environment, TraitCondition, TraitError};
use crate::config::{document_layers, ConfigError, ConfigResolver};

/// Errors aborting a pipeline pass
#[derive(Error, Debug)]
pub enum ApplyError {
    #[error("invalid trait configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("configure phase of trait '{id}' failed: {source}")]
    Configure {
        id: &'static str,
        #[source]
        source: TraitError,
    },

    #[error("apply phase of trait '{id}' failed: {source}")]
    Apply {
        id: &'static str,
        #[source]
        source: TraitError,
    },

    #[error("post step processor after trait '{id}' failed: {source}")]
    PostStep {
        id: &'static str,
        #[source]
        source: TraitError,
    },

    #[error("post processor failed: {0}")]
    PostProcessor(#[source] TraitError),

    #[error("no trait can be executed because no platform was found")]
    NoApplicableTrait,
}

/// Resolve the configuration, then configure and apply every eligible trait
/// in catalog order.
///
/// The environment is consumed and only handed back on success, so a caller
/// never sees the output of a pass that failed halfway.
pub fn apply(mut env: Environment) -> Result<Environment, ApplyError> {
    let catalog = Arc::clone(env.catalog());

    let layers = document_layers(&env.document, &env.trait_options)?;
    env.traits_config = ConfigResolver::new(catalog.as_ref()).resolve(&layers)?;

    let profile = env.determine_profile();
    let has_platform = env.has_platform();
    debug!(
        "Applying traits to integration {} (profile {}, phase {:?})",
        env.integration().name,
        profile,
        env.phase()
    );

    let mut applicable = false;
    for t in catalog.for_profile(profile) {
        let id = t.id();
        if t.requires_platform() && !has_platform {
            debug!("Skipping trait {}: no platform", id);
            continue;
        }
        applicable = true;

        let configured = t
            .configure(&mut env)
            .map_err(|source| ApplyError::Configure { id, source })?;
        env.conditions.push(TraitCondition {
            trait_id: id.to_string(),
            enabled: configured.enabled,
            reason: configured.reason.clone(),
        });

        if !configured.enabled {
            match &configured.reason {
                Some(reason) => debug!("Trait {} not applied: {}", id, reason),
                None => debug!("Trait {} not applied", id),
            }
            continue;
        }

        info!("Apply trait: {}", id);
        t.apply(&mut env)
            .map_err(|source| ApplyError::Apply { id, source })?;
        env.executed_traits.push(id);

        env.run_post_step_processors()
            .map_err(|source| ApplyError::PostStep { id, source })?;
    }

    if !applicable && !has_platform {
        return Err(ApplyError::NoApplicableTrait);
    }

    env.run_post_processors()
        .map_err(ApplyError::PostProcessor)?;

    Ok(env)
}
