//! Output resource collection
//!
//! Owned by the [`Environment`](crate::traits::Environment) and mutated only
//! by traits while they apply. Insertion order is preserved so that output is
//! reproducible between passes.

use serde::Serialize;

use super::resources::{
    CronJob, Deployment, KnativeService, Resource, ResourceKind, ResourceList, ScaledObject,
    Service,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Collection {
    items: Vec<Resource>,
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, resource: Resource) {
        self.items.push(resource);
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Resource> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Resource> {
        self.items.iter_mut()
    }

    pub fn has_kind(&self, kind: ResourceKind) -> bool {
        self.items.iter().any(|r| r.kind() == kind)
    }

    pub fn deployment(&self, name: &str) -> Option<&Deployment> {
        self.items.iter().find_map(|r| match r {
            Resource::Deployment(d) if d.metadata.name == name => Some(d),
            _ => None,
        })
    }

    pub fn knative_service(&self, name: &str) -> Option<&KnativeService> {
        self.items.iter().find_map(|r| match r {
            Resource::KnativeService(s) if s.metadata.name == name => Some(s),
            _ => None,
        })
    }

    pub fn cron_job(&self, name: &str) -> Option<&CronJob> {
        self.items.iter().find_map(|r| match r {
            Resource::CronJob(c) if c.metadata.name == name => Some(c),
            _ => None,
        })
    }

    pub fn service(&self, name: &str) -> Option<&Service> {
        self.items.iter().find_map(|r| match r {
            Resource::Service(s) if s.metadata.name == name => Some(s),
            _ => None,
        })
    }

    pub fn scaled_object(&self, name: &str) -> Option<&ScaledObject> {
        self.items.iter().find_map(|r| match r {
            Resource::ScaledObject(s) if s.metadata.name == name => Some(s),
            _ => None,
        })
    }

    /// The controller running the named integration, whatever its kind
    pub fn controller(&self, name: &str) -> Option<&Resource> {
        self.items
            .iter()
            .find(|r| r.kind().is_controller() && r.name() == name)
    }

    pub fn controller_mut(&mut self, name: &str) -> Option<&mut Resource> {
        self.items
            .iter_mut()
            .find(|r| r.kind().is_controller() && r.name() == name)
    }

    /// Wrap a copy of the items for printing
    pub fn to_list(&self) -> ResourceList<Resource> {
        ResourceList::new(self.items.clone())
    }
}
