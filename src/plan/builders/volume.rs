// ABOUTME: Builder for named volumes scoped to one host.

use super::{Dependency, resolve_dependencies, validate_name};
use crate::plan::error::ValidationError;
use crate::plan::resource::{Host, Resource, ResourceKind, Volume};
use crate::plan::Plan;
use crate::types::Handle;
use std::collections::BTreeMap;

const KIND: ResourceKind = ResourceKind::Volume;

#[must_use = "builders do nothing until build() is called"]
pub struct VolumeBuilder<'p> {
    plan: &'p Plan,
    name: String,
    host: Handle<Host>,
    driver: Option<String>,
    labels: BTreeMap<String, String>,
    depends_on: Vec<Dependency>,
}

impl<'p> VolumeBuilder<'p> {
    pub(crate) fn new(plan: &'p Plan, name: impl Into<String>, host: Handle<Host>) -> Self {
        Self {
            plan,
            name: name.into(),
            host,
            driver: None,
            labels: BTreeMap::new(),
            depends_on: Vec::new(),
        }
    }

    pub fn driver(mut self, driver: impl Into<String>) -> Self {
        self.driver = Some(driver.into());
        self
    }

    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn depends_on(mut self, dependency: impl Into<Dependency>) -> Self {
        self.depends_on.push(dependency.into());
        self
    }

    pub fn build(self) -> Result<Handle<Volume>, ValidationError> {
        let plan = self.plan;
        plan.register(|_| {
            let name = validate_name(KIND, &self.name)?;
            let mut dependencies = vec![plan.check(self.host)?];
            dependencies.extend(resolve_dependencies(plan, &self.depends_on)?);
            let volume = Volume {
                name,
                host: self.host,
                driver: self.driver,
                labels: self.labels,
            };
            Ok((Resource::Volume(volume), dependencies))
        })
    }
}
