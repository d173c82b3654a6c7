use crate::cluster::{set_env_var, INTEGRATION_LABEL};
use crate::config::properties::{PropertyKind, PropertySpec, ENABLED};
use crate::config::IntegrationPhase;

use super::{Configured, Environment, Trait, TraitError, EXPLICITLY_DISABLED};

pub const ID: &str = "camel";

/// Runtime used when neither the trait nor the platform pins one
pub const DEFAULT_RUNTIME_VERSION: &str = "1.17.0";

const RUNTIME_DEPENDENCY: &str = "mvn:org.apache.camel.k/camel-k-runtime";

const PROPERTIES: &[PropertySpec] = &[
    ENABLED,
    PropertySpec::new(
        "runtime-version",
        PropertyKind::String,
        "The runtime version to use for the integration",
    ),
];

/// Pins the runtime and labels everything the other traits generate
pub struct CamelTrait;

impl Trait for CamelTrait {
    fn id(&self) -> &'static str {
        ID
    }

    fn order(&self) -> i32 {
        200
    }

    fn properties(&self) -> &'static [PropertySpec] {
        PROPERTIES
    }

    fn is_platform_trait(&self) -> bool {
        true
    }

    fn configure(&self, env: &mut Environment) -> Result<Configured, TraitError> {
        if env.properties(ID).enabled()? == Some(false) {
            return Ok(Configured::disabled(EXPLICITLY_DISABLED));
        }
        Ok(Configured::enabled())
    }

    fn apply(&self, env: &mut Environment) -> Result<(), TraitError> {
        let version = env
            .properties(ID)
            .string("runtime-version")?
            .or_else(|| {
                env.document
                    .platform
                    .as_ref()
                    .and_then(|p| p.runtime_version.clone())
            })
            .unwrap_or_else(|| DEFAULT_RUNTIME_VERSION.to_string());

        if env.in_phase(&[IntegrationPhase::Initialization]) {
            env.add_dependency(RUNTIME_DEPENDENCY);
        }
        set_env_var(&mut env.env_vars, "CAMEL_K_RUNTIME_VERSION", version.as_str());
        env.runtime_version = Some(version);

        // Resources added by later traits get the label as soon as they appear
        env.add_post_step_processor(Box::new(|env| {
            let name = env.integration().name.clone();
            for resource in env.resources.iter_mut() {
                resource
                    .metadata_mut()
                    .labels
                    .entry(INTEGRATION_LABEL.to_string())
                    .or_insert_with(|| name.clone());
            }
            Ok(())
        }));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{IntegrationDocument, IntegrationSpec, PlatformSpec};
    use crate::traits::Catalog;
    use std::sync::Arc;

    fn env(platform: PlatformSpec, phase: IntegrationPhase) -> Environment {
        let doc = IntegrationDocument::new(IntegrationSpec::new("it").with_phase(phase))
            .with_platform(platform);
        Environment::new(Arc::new(Catalog::new(Vec::new())), doc)
    }

    #[test]
    fn test_runtime_version_from_platform() {
        let platform = PlatformSpec {
            runtime_version: Some("3.2.0".to_string()),
            ..Default::default()
        };
        let mut e = env(platform, IntegrationPhase::Deploying);
        CamelTrait.apply(&mut e).unwrap();
        assert_eq!(e.runtime_version.as_deref(), Some("3.2.0"));
        assert_eq!(e.env_vars[0].value, "3.2.0");
        assert!(e.integration().dependencies.is_empty());
    }

    #[test]
    fn test_trait_property_wins_over_platform() {
        let platform = PlatformSpec {
            runtime_version: Some("3.2.0".to_string()),
            ..Default::default()
        };
        let mut e = env(platform, IntegrationPhase::Initialization);
        e.traits_config
            .set_property(ID, "runtime-version", serde_json::json!("3.8.1"));
        CamelTrait.apply(&mut e).unwrap();
        assert_eq!(e.runtime_version.as_deref(), Some("3.8.1"));
        assert_eq!(e.integration().dependencies, vec![RUNTIME_DEPENDENCY]);
    }

    #[test]
    fn test_default_runtime_version() {
        let mut e = env(PlatformSpec::default(), IntegrationPhase::Deploying);
        CamelTrait.apply(&mut e).unwrap();
        assert_eq!(e.runtime_version.as_deref(), Some(DEFAULT_RUNTIME_VERSION));
    }
}
