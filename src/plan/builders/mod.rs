// ABOUTME: Fluent builders for every plan resource kind.
// ABOUTME: Setters only touch the draft; build() validates, registers and returns a handle.

mod container;
mod host;
mod image;
mod network;
mod registry;
mod volume;

pub use container::{ContainerBuilder, MANAGED_LABEL, PLAN_LABEL};
pub use host::HostBuilder;
pub use image::ImageBuilder;
pub use network::NetworkBuilder;
pub use registry::RegistryBuilder;
pub use volume::VolumeBuilder;

use super::Plan;
use super::error::ValidationError;
use super::resource::{Descriptor, ResourceKind};
use crate::types::{Handle, NodeIndex, ResourceName};

/// A handle of any resource kind, accepted by `depends_on`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dependency {
    plan: u64,
    node: NodeIndex,
    kind: ResourceKind,
}

impl Dependency {
    pub fn node(&self) -> NodeIndex {
        self.node
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }
}

impl<T: Descriptor> From<Handle<T>> for Dependency {
    fn from(handle: Handle<T>) -> Self {
        Self {
            plan: handle.plan_id(),
            node: handle.node(),
            kind: T::KIND,
        }
    }
}

pub(crate) fn resolve_dependencies(
    plan: &Plan,
    dependencies: &[Dependency],
) -> Result<Vec<NodeIndex>, ValidationError> {
    dependencies
        .iter()
        .map(|d| {
            if d.plan == plan.id() {
                Ok(d.node)
            } else {
                Err(ValidationError::ForeignHandle { kind: d.kind })
            }
        })
        .collect()
}

pub(crate) fn validate_name(kind: ResourceKind, name: &str) -> Result<ResourceName, ValidationError> {
    ResourceName::new(name).map_err(|source| ValidationError::InvalidName {
        kind,
        name: name.to_string(),
        source,
    })
}
