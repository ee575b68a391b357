// ABOUTME: State shared by the workers of one plan walk.
// ABOUTME: Per-node settlement barriers, host partitioning and dependency gating.

use super::Context;
use crate::plan::{Graph, ResourceKind};
use crate::types::NodeIndex;
use std::collections::BTreeMap;
use tokio::sync::watch;

/// One barrier per node: `None` while pending, then whether it succeeded.
pub(super) struct Settlement {
    slots: Vec<watch::Sender<Option<bool>>>,
}

impl Settlement {
    pub(super) fn new(nodes: usize) -> Self {
        Self {
            slots: (0..nodes).map(|_| watch::Sender::new(None)).collect(),
        }
    }

    /// Only the first settlement of a node counts.
    pub(super) fn settle(&self, node: NodeIndex, ok: bool) {
        if let Some(slot) = self.slots.get(node.0) {
            slot.send_if_modified(|state| {
                if state.is_some() {
                    return false;
                }
                *state = Some(ok);
                true
            });
        }
    }

    pub(super) async fn wait(&self, node: NodeIndex) -> bool {
        let Some(slot) = self.slots.get(node.0) else {
            return false;
        };
        let mut rx = slot.subscribe();
        match rx.wait_for(Option::is_some).await {
            Ok(state) => *state == Some(true),
            Err(_) => false,
        }
    }
}

/// Work grouped by owner: one sequential lane per host plus the plan-wide lane.
pub(super) struct Lanes {
    /// Host node and its resources in topological order.
    pub(super) hosts: Vec<(NodeIndex, Vec<NodeIndex>)>,
    /// Registries and images in topological order.
    pub(super) globals: Vec<NodeIndex>,
}

pub(super) fn partition(graph: &Graph, order: &[NodeIndex]) -> Lanes {
    let mut hosts: BTreeMap<NodeIndex, Vec<NodeIndex>> = BTreeMap::new();
    let mut globals = Vec::new();

    for &node in order {
        match graph.resource(node).kind() {
            ResourceKind::Host => {
                hosts.entry(node).or_default();
            }
            ResourceKind::Registry | ResourceKind::Image => globals.push(node),
            _ => {
                if let Some(host) = graph.host_of(node) {
                    hosts.entry(host).or_default().push(node);
                }
            }
        }
    }

    Lanes {
        hosts: hosts.into_iter().collect(),
        globals,
    }
}

/// Waits for each node in `waiting_on` to settle and returns why the caller
/// must be skipped, if it must. `relation` names the waited-on nodes in the
/// reason ("dependency", "dependent").
pub(super) async fn blocked(
    cx: &Context<'_>,
    settlement: &Settlement,
    relation: &str,
    waiting_on: impl IntoIterator<Item = NodeIndex>,
) -> Option<String> {
    for dependency in waiting_on {
        let settled = tokio::select! {
            biased;
            _ = cx.cancel.cancelled() => return Some(CANCELLED.to_string()),
            ok = settlement.wait(dependency) => ok,
        };
        if !settled {
            let resource = cx.graph.resource(dependency);
            return Some(format!(
                "{} {} '{}' did not succeed",
                relation,
                resource.kind(),
                resource.name()
            ));
        }
    }
    if cx.cancel.is_cancelled() {
        return Some(CANCELLED.to_string());
    }
    None
}

pub(super) const CANCELLED: &str = "cancelled";
