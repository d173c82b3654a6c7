use std::collections::BTreeMap;

use crate::cluster::{OwnerReference, DIGEST_ANNOTATION, INTEGRATION_LABEL};
use crate::config::properties::{PropertyKind, PropertySpec, ENABLED};

use super::{Configured, Environment, Trait, TraitError, EXPLICITLY_DISABLED};

pub const ID: &str = "owner";

pub const INTEGRATION_API_VERSION: &str = "camel.apache.org/v1";
pub const INTEGRATION_KIND: &str = "Integration";

const PROPERTIES: &[PropertySpec] = &[
    ENABLED,
    PropertySpec::new(
        "target-labels",
        PropertyKind::StringList,
        "Integration labels to copy onto the generated resources",
    ),
    PropertySpec::new(
        "target-annotations",
        PropertyKind::StringList,
        "Integration annotations to copy onto the generated resources",
    ),
];

/// Ties every generated resource back to the integration
pub struct OwnerTrait;

fn pick(source: &BTreeMap<String, String>, keys: &[String]) -> BTreeMap<String, String> {
    keys.iter()
        .filter_map(|k| source.get(k).map(|v| (k.clone(), v.clone())))
        .collect()
}

impl Trait for OwnerTrait {
    fn id(&self) -> &'static str {
        ID
    }

    fn order(&self) -> i32 {
        2500
    }

    fn properties(&self) -> &'static [PropertySpec] {
        PROPERTIES
    }

    fn configure(&self, env: &mut Environment) -> Result<Configured, TraitError> {
        if env.properties(ID).enabled()? == Some(false) {
            return Ok(Configured::disabled(EXPLICITLY_DISABLED));
        }
        Ok(Configured::when(env.in_running_phases()))
    }

    fn apply(&self, env: &mut Environment) -> Result<(), TraitError> {
        let props = env.properties(ID);
        let integration = env.integration();
        let labels = pick(&integration.labels, &props.string_list("target-labels")?);
        let annotations = pick(
            &integration.annotations,
            &props.string_list("target-annotations")?,
        );

        // Runs last so the digest covers configuration derived by every trait
        env.add_post_processor(Box::new(move |env| {
            let name = env.integration().name.clone();
            let owner = OwnerReference {
                api_version: INTEGRATION_API_VERSION.to_string(),
                kind: INTEGRATION_KIND.to_string(),
                name: name.clone(),
                uid: env.integration_uid(),
                block_owner_deletion: true,
                controller: true,
            };
            let digest = env.digest();

            for resource in env.resources.iter_mut() {
                let metadata = resource.metadata_mut();
                metadata.owner_references.retain(|r| r.uid != owner.uid);
                metadata.owner_references.push(owner.clone());
                metadata
                    .labels
                    .insert(INTEGRATION_LABEL.to_string(), name.clone());
                metadata
                    .annotations
                    .insert(DIGEST_ANNOTATION.to_string(), digest.clone());
                metadata.labels.extend(labels.clone());
                metadata.annotations.extend(annotations.clone());

                if let Some(template) = resource.pod_template_mut() {
                    template.labels.extend(labels.clone());
                    template.annotations.extend(annotations.clone());
                }
            }
            Ok(())
        }));
        Ok(())
    }
}
