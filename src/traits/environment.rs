//! The mutable state threaded through one pipeline pass

use std::fmt;
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::debug;
use uuid::Uuid;

use super::strategy::{self, ControllerStrategy};
use super::{Catalog, TraitCondition, TraitError};
use crate::cluster::{Collection, EnvVar};
use crate::config::{
    CapabilityConfig, IntegrationDocument, IntegrationPhase, IntegrationSpec, Profile, Properties,
};
use crate::translate::uri::component;

/// Hook run against the whole environment, registered by traits
pub type Processor = Box<dyn Fn(&mut Environment) -> Result<(), TraitError> + Send + Sync>;

/// Execution context of a single resolution pass.
///
/// Owns the input document, the resolved configuration and everything the
/// traits produce. Nothing in here is shared with other passes except the
/// read-only catalog.
pub struct Environment {
    catalog: Arc<Catalog>,

    /// Input document; traits may only append integration dependencies
    pub document: IntegrationDocument,

    /// Extra `<trait>.<property>=<value>` overrides, applied after annotations
    pub trait_options: Vec<String>,

    pub traits_config: CapabilityConfig,

    pub resources: Collection,

    /// Ids of applied traits, in execution order
    pub executed_traits: Vec<&'static str>,

    pub conditions: Vec<TraitCondition>,

    /// Variables every controller container receives
    pub env_vars: Vec<EnvVar>,

    pub runtime_version: Option<String>,

    post_step_processors: Vec<Processor>,

    post_processors: Vec<Processor>,

    controller_strategy: Option<ControllerStrategy>,
}

impl Environment {
    pub fn new(catalog: Arc<Catalog>, document: IntegrationDocument) -> Self {
        Self {
            catalog,
            document,
            trait_options: Vec::new(),
            traits_config: CapabilityConfig::new(),
            resources: Collection::new(),
            executed_traits: Vec::new(),
            conditions: Vec::new(),
            env_vars: Vec::new(),
            runtime_version: None,
            post_step_processors: Vec::new(),
            post_processors: Vec::new(),
            controller_strategy: None,
        }
    }

    pub fn with_trait_options(mut self, options: Vec<String>) -> Self {
        self.trait_options = options;
        self
    }

    pub fn catalog(&self) -> &Arc<Catalog> {
        &self.catalog
    }

    pub fn integration(&self) -> &IntegrationSpec {
        &self.document.integration
    }

    pub fn has_platform(&self) -> bool {
        self.document.platform.is_some()
    }

    pub fn phase(&self) -> IntegrationPhase {
        self.document.integration.phase
    }

    pub fn in_phase(&self, phases: &[IntegrationPhase]) -> bool {
        phases.contains(&self.phase())
    }

    /// Deploying or running, the phases in which resources are generated
    pub fn in_running_phases(&self) -> bool {
        self.phase().is_deploying_or_running()
    }

    /// Typed view over the resolved configuration of a trait
    pub fn properties<'a>(&'a self, trait_id: &'a str) -> Properties<'a> {
        self.traits_config.properties(trait_id)
    }

    /// Profile from the integration, then the kit, then the platform
    pub fn determine_profile(&self) -> Profile {
        let doc = &self.document;
        doc.integration
            .profile
            .or_else(|| doc.kit.as_ref().and_then(|k| k.profile))
            .or_else(|| doc.platform.as_ref().and_then(|p| p.profile))
            .unwrap_or(Profile::DEFAULT)
    }

    /// Strategy picked by the selector chain; computed once per pass
    pub fn determine_controller_strategy(&mut self) -> ControllerStrategy {
        if let Some(strategy) = self.controller_strategy {
            return strategy;
        }
        let catalog = Arc::clone(&self.catalog);
        let selectors = catalog.strategy_selectors(self.determine_profile(), self.has_platform());
        let strategy = strategy::choose(selectors, self);
        debug!(
            "Controller strategy for integration {}: {}",
            self.document.integration.name, strategy
        );
        self.controller_strategy = Some(strategy);
        strategy
    }

    /// Cached strategy, if already determined
    pub fn controller_strategy(&self) -> Option<ControllerStrategy> {
        self.controller_strategy
    }

    /// Endpoint URIs the integration consumes from
    pub fn sources(&self) -> &[String] {
        &self.document.integration.sources
    }

    /// Whether any consumer exposes an HTTP endpoint
    pub fn exposes_http_services(&self) -> bool {
        let http = &self.document.catalog.http_schemes;
        self.sources().iter().any(|uri| http.contains(component(uri)))
    }

    /// Whether every consumer only reacts to incoming requests
    pub fn passive_endpoints(&self) -> bool {
        let catalog = &self.document.catalog;
        self.sources().iter().all(|uri| {
            let scheme = component(uri);
            catalog.http_schemes.contains(scheme) || catalog.passive_schemes.contains(scheme)
        })
    }

    pub fn add_dependency(&mut self, dependency: impl Into<String>) {
        self.document.integration.add_dependency(dependency);
    }

    /// Hook run after every applied trait, in registration order
    pub fn add_post_step_processor(&mut self, processor: Processor) {
        self.post_step_processors.push(processor);
    }

    /// Hook run once after all traits, in registration order
    pub fn add_post_processor(&mut self, processor: Processor) {
        self.post_processors.push(processor);
    }

    pub fn run_post_step_processors(&mut self) -> Result<(), TraitError> {
        let processors = std::mem::take(&mut self.post_step_processors);
        let result = processors.iter().try_for_each(|p| p(self));
        let added = std::mem::replace(&mut self.post_step_processors, processors);
        self.post_step_processors.extend(added);
        result
    }

    pub fn run_post_processors(&mut self) -> Result<(), TraitError> {
        let processors = std::mem::take(&mut self.post_processors);
        let result = processors.iter().try_for_each(|p| p(self));
        let added = std::mem::replace(&mut self.post_processors, processors);
        self.post_processors.extend(added);
        result
    }

    /// UID of the integration, derived from its name when not set
    pub fn integration_uid(&self) -> Uuid {
        let integration = &self.document.integration;
        integration.uid.unwrap_or_else(|| {
            let key = format!("{}/{}", integration.namespace, integration.name);
            Uuid::new_v5(&Uuid::NAMESPACE_OID, key.as_bytes())
        })
    }

    /// SHA-256 over the integration identity, its sources and the resolved
    /// trait configuration
    pub fn digest(&self) -> String {
        let integration = &self.document.integration;
        let mut hasher = Sha256::new();
        hasher.update(integration.namespace.as_bytes());
        hasher.update(b"/");
        hasher.update(integration.name.as_bytes());
        for source in &integration.sources {
            hasher.update(b"\n");
            hasher.update(source.as_bytes());
        }
        hasher.update(b"\n");
        hasher.update(serde_json::to_vec(&self.traits_config).unwrap_or_default());
        let hash = hasher.finalize();
        format!("v{:x}", hash)
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("integration", &self.document.integration.name)
            .field("traits_config", &self.traits_config)
            .field("resources", &self.resources.len())
            .field("executed_traits", &self.executed_traits)
            .field("post_step_processors", &self.post_step_processors.len())
            .field("post_processors", &self.post_processors.len())
            .field("controller_strategy", &self.controller_strategy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{KitSpec, PlatformSpec};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn env(integration: IntegrationSpec) -> Environment {
        Environment::new(
            Arc::new(Catalog::default()),
            IntegrationDocument::new(integration),
        )
    }

    #[test]
    fn test_profile_precedence() {
        let mut e = env(IntegrationSpec::new("x"));
        assert_eq!(e.determine_profile(), Profile::Kubernetes);

        e.document.platform = Some(PlatformSpec {
            profile: Some(Profile::OpenShift),
            ..Default::default()
        });
        assert_eq!(e.determine_profile(), Profile::OpenShift);

        e.document.kit = Some(KitSpec {
            profile: Some(Profile::Knative),
            ..Default::default()
        });
        assert_eq!(e.determine_profile(), Profile::Knative);

        e.document.integration.profile = Some(Profile::Kubernetes);
        assert_eq!(e.determine_profile(), Profile::Kubernetes);
    }

    #[test]
    fn test_http_detection() {
        let e = env(IntegrationSpec::new("x").with_source("platform-http:/hello"));
        assert!(e.exposes_http_services());
        assert!(e.passive_endpoints());

        let e = env(
            IntegrationSpec::new("x")
                .with_source("platform-http:/hello")
                .with_source("kafka:orders"),
        );
        assert!(e.exposes_http_services());
        assert!(!e.passive_endpoints());
    }

    #[test]
    fn test_processors_run_in_order_and_survive() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);
        let mut e = env(IntegrationSpec::new("x"));
        e.add_post_step_processor(Box::new(|env| {
            CALLS.fetch_add(1, Ordering::SeqCst);
            env.add_dependency("a");
            Ok(())
        }));
        e.add_post_step_processor(Box::new(|env| {
            env.add_dependency("b");
            Ok(())
        }));

        e.run_post_step_processors().unwrap();
        e.run_post_step_processors().unwrap();
        assert_eq!(CALLS.load(Ordering::SeqCst), 2);
        assert_eq!(e.integration().dependencies, vec!["a", "b"]);
    }

    #[test]
    fn test_processor_error_stops_the_chain() {
        let mut e = env(IntegrationSpec::new("x"));
        e.add_post_processor(Box::new(|_| Err(TraitError::invalid("t", "boom"))));
        e.add_post_processor(Box::new(|env| {
            env.add_dependency("never");
            Ok(())
        }));
        assert!(e.run_post_processors().is_err());
        assert!(e.integration().dependencies.is_empty());
    }

    #[test]
    fn test_uid_is_stable() {
        let a = env(IntegrationSpec::new("x"));
        let b = env(IntegrationSpec::new("x"));
        let c = env(IntegrationSpec::new("y"));
        assert_eq!(a.integration_uid(), b.integration_uid());
        assert_ne!(a.integration_uid(), c.integration_uid());
    }

    #[test]
    fn test_digest_tracks_configuration() {
        let a = env(IntegrationSpec::new("x"));
        let mut b = env(IntegrationSpec::new("x"));
        assert_eq!(a.digest(), b.digest());

        b.traits_config
            .set_property("cron", "schedule", serde_json::json!("0 0 * * ?"));
        assert_ne!(a.digest(), b.digest());
        assert!(a.digest().starts_with('v'));
    }
}
