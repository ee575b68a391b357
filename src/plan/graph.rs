// ABOUTME: Directed dependency graph over plan resources.
// ABOUTME: Rejects duplicates and cycles; orders nodes topologically with insertion-order ties.

use super::error::ValidationError;
use super::resource::{Resource, ResourceKind};
use crate::types::NodeIndex;
use std::collections::{BTreeSet, HashMap};

/// Uniqueness key: kind, owning host (if any) and name.
type Key = (ResourceKind, Option<NodeIndex>, String);

#[derive(Debug, Clone)]
struct Node {
    resource: Resource,
    dependencies: BTreeSet<NodeIndex>,
}

#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: Vec<Node>,
    keys: HashMap<Key, NodeIndex>,
}

fn key_of(resource: &Resource) -> Key {
    (
        resource.kind(),
        resource.host().map(|h| h.node()),
        resource.name(),
    )
}

impl Graph {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in insertion order.
    pub fn indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        (0..self.nodes.len()).map(NodeIndex)
    }

    pub fn get(&self, index: NodeIndex) -> Option<&Resource> {
        self.nodes.get(index.0).map(|n| &n.resource)
    }

    /// Indices handed out by this graph are always in range.
    pub(crate) fn resource(&self, index: NodeIndex) -> &Resource {
        &self.nodes[index.0].resource
    }

    pub fn dependencies(&self, index: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.nodes
            .get(index.0)
            .into_iter()
            .flat_map(|n| n.dependencies.iter().copied())
    }

    pub fn dependents(&self, index: NodeIndex) -> Vec<NodeIndex> {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.dependencies.contains(&index))
            .map(|(i, _)| NodeIndex(i))
            .collect()
    }

    /// The host node a resource is bound to; `None` for plan-wide resources.
    pub fn host_of(&self, index: NodeIndex) -> Option<NodeIndex> {
        self.get(index).and_then(|r| r.host()).map(|h| h.node())
    }

    pub fn find(&self, kind: ResourceKind, host: Option<NodeIndex>, name: &str) -> Option<NodeIndex> {
        self.keys.get(&(kind, host, name.to_string())).copied()
    }

    /// Register a resource with its dependencies. Nothing is recorded on error.
    pub(crate) fn insert(
        &mut self,
        resource: Resource,
        dependencies: impl IntoIterator<Item = NodeIndex>,
    ) -> Result<NodeIndex, ValidationError> {
        let key = key_of(&resource);
        if self.keys.contains_key(&key) {
            return Err(ValidationError::Duplicate {
                kind: key.0,
                name: key.2,
                host: key.1.map(|h| self.resource(h).name()),
            });
        }

        let index = NodeIndex(self.nodes.len());
        let dependencies: BTreeSet<NodeIndex> = dependencies
            .into_iter()
            .filter(|d| d.0 < index.0)
            .collect();
        self.nodes.push(Node {
            resource,
            dependencies,
        });
        self.keys.insert(key, index);
        Ok(index)
    }

    /// Add an explicit edge; refuses edges that would close a cycle.
    pub(crate) fn add_edge(
        &mut self,
        dependent: NodeIndex,
        dependency: NodeIndex,
    ) -> Result<(), ValidationError> {
        if dependent == dependency || self.reaches(dependency, dependent) {
            return Err(ValidationError::Cycle(vec![
                self.label(dependent),
                self.label(dependency),
            ]));
        }
        self.nodes[dependent.0].dependencies.insert(dependency);
        Ok(())
    }

    /// Whether `from` depends on `target`, directly or transitively.
    fn reaches(&self, from: NodeIndex, target: NodeIndex) -> bool {
        let mut stack = vec![from];
        let mut seen = BTreeSet::new();
        while let Some(current) = stack.pop() {
            if current == target {
                return true;
            }
            if seen.insert(current) {
                stack.extend(self.dependencies(current));
            }
        }
        false
    }

    fn label(&self, index: NodeIndex) -> String {
        let resource = self.resource(index);
        format!("{} '{}'", resource.kind(), resource.name())
    }

    /// Kahn's algorithm; among ready nodes the earliest registered goes first.
    pub fn topological_order(&self) -> Result<Vec<NodeIndex>, ValidationError> {
        let mut pending: Vec<usize> = self.nodes.iter().map(|n| n.dependencies.len()).collect();
        let mut dependents: Vec<Vec<NodeIndex>> = vec![Vec::new(); self.nodes.len()];
        for (i, node) in self.nodes.iter().enumerate() {
            for dep in &node.dependencies {
                dependents[dep.0].push(NodeIndex(i));
            }
        }

        let mut ready: BTreeSet<NodeIndex> = pending
            .iter()
            .enumerate()
            .filter(|(_, n)| **n == 0)
            .map(|(i, _)| NodeIndex(i))
            .collect();
        let mut order = Vec::with_capacity(self.nodes.len());

        while let Some(next) = ready.pop_first() {
            order.push(next);
            for dependent in &dependents[next.0] {
                pending[dependent.0] -= 1;
                if pending[dependent.0] == 0 {
                    ready.insert(*dependent);
                }
            }
        }

        if order.len() < self.nodes.len() {
            let stuck = pending
                .iter()
                .enumerate()
                .filter(|(_, n)| **n > 0)
                .map(|(i, _)| self.label(NodeIndex(i)))
                .collect();
            return Err(ValidationError::Cycle(stuck));
        }
        Ok(order)
    }
}
