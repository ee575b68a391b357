// ABOUTME: Builder for digest-pinned images.
// ABOUTME: An image depends on the registry of its domain when one was built before it.

use super::{Dependency, resolve_dependencies};
use crate::plan::error::ValidationError;
use crate::plan::resource::{Image, Resource, ResourceKind};
use crate::plan::Plan;
use crate::types::{Handle, ImageRef};

enum Source {
    Text(String),
    Parsed(ImageRef),
}

#[must_use = "builders do nothing until build() is called"]
pub struct ImageBuilder<'p> {
    plan: &'p Plan,
    source: Source,
    depends_on: Vec<Dependency>,
}

impl<'p> ImageBuilder<'p> {
    pub(crate) fn parse(plan: &'p Plan, reference: impl Into<String>) -> Self {
        Self {
            plan,
            source: Source::Text(reference.into()),
            depends_on: Vec::new(),
        }
    }

    pub(crate) fn from_ref(plan: &'p Plan, reference: ImageRef) -> Self {
        Self {
            plan,
            source: Source::Parsed(reference),
            depends_on: Vec::new(),
        }
    }

    pub fn depends_on(mut self, dependency: impl Into<Dependency>) -> Self {
        self.depends_on.push(dependency.into());
        self
    }

    pub fn build(self) -> Result<Handle<Image>, ValidationError> {
        let plan = self.plan;
        plan.register(|graph| {
            let reference = match self.source {
                Source::Parsed(reference) => reference,
                Source::Text(text) => {
                    ImageRef::parse(&text).map_err(|source| ValidationError::InvalidImage {
                        reference: text.clone(),
                        source,
                    })?
                }
            };
            if !reference.is_pinned() {
                return Err(ValidationError::UnpinnedImage(reference.to_string()));
            }

            let mut dependencies = resolve_dependencies(plan, &self.depends_on)?;
            dependencies.extend(graph.find(ResourceKind::Registry, None, reference.domain()));
            Ok((Resource::Image(Image { reference }), dependencies))
        })
    }
}
