// ABOUTME: Phantom-typed handles referencing resources registered in a plan.
// ABOUTME: Prevents passing a volume where a network is expected at compile time.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Position of a resource in its plan's dependency graph.
///
/// Indices are assigned in registration order, so comparing two indices
/// compares the order in which their resources were built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeIndex(pub(crate) usize);

impl NodeIndex {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An opaque, typed reference to a resource returned by a builder's `build()`.
///
/// A handle is only meaningful for the plan that issued it; builders reject
/// handles minted by another plan.
#[must_use = "handles reference plan resources and should not be ignored"]
pub struct Handle<T> {
    plan: u64,
    node: NodeIndex,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    pub(crate) fn new(plan: u64, node: NodeIndex) -> Self {
        Self {
            plan,
            node,
            _marker: PhantomData,
        }
    }

    pub fn node(&self) -> NodeIndex {
        self.node
    }

    pub(crate) fn plan_id(&self) -> u64 {
        self.plan
    }
}

// Manual impls: T is a marker and carries no bounds.

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("plan", &self.plan)
            .field("node", &self.node)
            .finish()
    }
}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.plan == other.plan && self.node == other.node
    }
}

impl<T> Eq for Handle<T> {}

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.plan.hash(state);
        self.node.hash(state);
    }
}
