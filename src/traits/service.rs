use crate::cluster::{ObjectMeta, Resource, Service, ServicePort, ServiceSpec};
use crate::cluster::INTEGRATION_LABEL;
use crate::config::properties::{PropertyKind, PropertySpec, ENABLED};
use crate::config::Profile;

use super::{Configured, Environment, Trait, TraitError, EXPLICITLY_DISABLED};

pub const ID: &str = "service";

const SERVICE_TYPES: [&str; 3] = ["ClusterIP", "NodePort", "LoadBalancer"];

const PROPERTIES: &[PropertySpec] = &[
    ENABLED,
    PropertySpec::new(
        "auto",
        PropertyKind::Bool,
        "Create the service only when the integration exposes an HTTP endpoint",
    )
    .with_default("true"),
    PropertySpec::new(
        "type",
        PropertyKind::String,
        "Kind of service: ClusterIP, NodePort or LoadBalancer",
    )
    .with_default("ClusterIP"),
    PropertySpec::new(
        "ports",
        PropertyKind::StringList,
        "Ports to expose, as name;port;container-port[;protocol]",
    ),
];

/// Exposes HTTP consumers of a deployed integration
pub struct ServiceTrait;

fn parse_port(spec: &str) -> Result<ServicePort, TraitError> {
    let parts: Vec<&str> = spec.split(';').collect();
    if parts.len() < 3 {
        return Err(TraitError::invalid(
            ID,
            format!(
                "could not parse service port {:?}: expected name;port;container-port[;protocol]",
                spec
            ),
        ));
    }
    let number = |s: &str, what: &str| {
        s.trim()
            .parse::<i32>()
            .map_err(|_| TraitError::invalid(ID, format!("invalid {} in service port {:?}", what, spec)))
    };
    Ok(ServicePort {
        name: parts[0].to_string(),
        port: number(parts[1], "port")?,
        target_port: number(parts[2], "container port")?,
        protocol: parts.get(3).unwrap_or(&"TCP").to_string(),
    })
}

fn default_port() -> ServicePort {
    ServicePort {
        name: "http".to_string(),
        port: 80,
        target_port: 8080,
        protocol: "TCP".to_string(),
    }
}

impl Trait for ServiceTrait {
    fn id(&self) -> &'static str {
        ID
    }

    fn order(&self) -> i32 {
        1500
    }

    fn properties(&self) -> &'static [PropertySpec] {
        PROPERTIES
    }

    fn is_allowed_in_profile(&self, profile: Profile) -> bool {
        profile != Profile::Knative
    }

    fn configure(&self, env: &mut Environment) -> Result<Configured, TraitError> {
        let props = env.properties(ID);
        let enabled = props.enabled()?;
        if enabled == Some(false) {
            return Ok(Configured::disabled(EXPLICITLY_DISABLED));
        }
        if !env.in_running_phases() {
            return Ok(Configured::skipped());
        }
        if env.resources.deployment(&env.integration().name).is_none() {
            return Ok(Configured::disabled("no deployment to expose"));
        }

        let has_ports = !props.string_list("ports")?.is_empty();
        let wanted = if enabled == Some(true) || has_ports {
            true
        } else if props.bool("auto")?.unwrap_or(true) {
            env.exposes_http_services()
        } else {
            false
        };
        if !wanted {
            return Ok(Configured::disabled("integration does not expose HTTP services"));
        }
        Ok(Configured::enabled())
    }

    fn apply(&self, env: &mut Environment) -> Result<(), TraitError> {
        let props = env.properties(ID);
        let service_type = props
            .string("type")?
            .unwrap_or_else(|| SERVICE_TYPES[0].to_string());
        if !SERVICE_TYPES.contains(&service_type.as_str()) {
            return Err(TraitError::invalid(
                ID,
                format!("unsupported service type: {}", service_type),
            ));
        }

        let mut ports = props
            .string_list("ports")?
            .iter()
            .map(|p| parse_port(p))
            .collect::<Result<Vec<_>, _>>()?;
        if ports.is_empty() {
            ports.push(default_port());
        }

        let integration = env.integration();
        let metadata = ObjectMeta::new(&integration.name, &integration.namespace)
            .with_label(INTEGRATION_LABEL, &integration.name);
        let selector = metadata.labels.clone();

        let service = Service {
            metadata,
            spec: ServiceSpec {
                service_type,
                selector,
                ports,
            },
        };
        env.resources.add(Resource::Service(service));
        Ok(())
    }
}
