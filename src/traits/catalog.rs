//! Fixed, ordered registry of traits

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::warn;

use super::pipeline::{self, ApplyError};
use super::strategy::ControllerStrategySelector;
use super::{default_traits, Environment, Trait};
use crate::config::{
    DecodeError, IntegrationDocument, Profile, Properties, PropertySpec, SchemaSource,
};

/// All known traits, sorted by `(order, id)`.
///
/// Built once and read-only afterwards, so a single catalog can be shared by
/// concurrent passes.
pub struct Catalog {
    traits: Vec<Box<dyn Trait>>,
    /// Indices of traits able to select a controller strategy, by priority
    selectors: Vec<(usize, i32)>,
}

impl Catalog {
    /// Build a catalog from an explicit list of traits. A duplicate id keeps
    /// the first trait registered under it.
    pub fn new(traits: Vec<Box<dyn Trait>>) -> Self {
        let mut seen = BTreeSet::new();
        let mut traits: Vec<Box<dyn Trait>> = traits
            .into_iter()
            .filter(|t| {
                let fresh = seen.insert(t.id());
                if !fresh {
                    warn!("Duplicate trait '{}' ignored", t.id());
                }
                fresh
            })
            .collect();
        traits.sort_by(|a, b| a.order().cmp(&b.order()).then_with(|| a.id().cmp(b.id())));

        let mut selectors: Vec<(usize, i32)> = traits
            .iter()
            .enumerate()
            .filter_map(|(i, t)| t.strategy_selector().map(|s| (i, s.selector_priority())))
            .collect();
        selectors.sort_by_key(|&(i, priority)| (priority, i));

        Self { traits, selectors }
    }

    pub fn traits(&self) -> impl Iterator<Item = &dyn Trait> {
        self.traits.iter().map(|t| t.as_ref())
    }

    pub fn len(&self) -> usize {
        self.traits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.traits.is_empty()
    }

    pub fn by_id(&self, id: &str) -> Option<&dyn Trait> {
        self.traits().find(|t| t.id() == id)
    }

    /// Traits allowed in `profile`, in execution order
    pub fn for_profile(&self, profile: Profile) -> Vec<&dyn Trait> {
        self.traits()
            .filter(|t| t.is_allowed_in_profile(profile))
            .collect()
    }

    /// Strategy selectors of the traits eligible for this pass, by priority
    pub fn strategy_selectors(
        &self,
        profile: Profile,
        has_platform: bool,
    ) -> Vec<&dyn ControllerStrategySelector> {
        self.selectors
            .iter()
            .map(|&(i, _)| self.traits[i].as_ref())
            .filter(|t| t.is_allowed_in_profile(profile))
            .filter(|t| has_platform || !t.requires_platform())
            .filter_map(|t| t.strategy_selector())
            .collect()
    }

    /// Every `<trait>.<property>` key accepted by the catalog
    pub fn compute_traits_properties(&self) -> Vec<String> {
        self.traits()
            .flat_map(|t| {
                t.properties()
                    .iter()
                    .map(move |p| format!("{}.{}", t.id(), p.name))
            })
            .collect()
    }

    /// Run the whole pipeline for one document
    pub fn apply(
        self: &Arc<Self>,
        document: IntegrationDocument,
        options: Vec<String>,
    ) -> Result<Environment, ApplyError> {
        let env = Environment::new(Arc::clone(self), document).with_trait_options(options);
        pipeline::apply(env)
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(default_traits())
    }
}

impl SchemaSource for Catalog {
    fn trait_ids(&self) -> Vec<&'static str> {
        self.traits().map(|t| t.id()).collect()
    }

    fn schema(&self, trait_id: &str) -> Option<&'static [PropertySpec]> {
        self.by_id(trait_id).map(|t| t.properties())
    }

    fn decode(&self, trait_id: &str, props: Properties<'_>) -> Result<(), DecodeError> {
        match self.by_id(trait_id) {
            Some(t) => t.decode(props),
            None => Ok(()),
        }
    }
}
