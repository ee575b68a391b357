// ABOUTME: Destroy walk: removes containers, then volumes and networks, per host in reverse order.
// ABOUTME: Already-absent resources count as removed, so a second destroy is a no-op.

use super::Context;
use super::error::DeployError;
use super::walk::{Settlement, blocked, partition};
use crate::plan::Resource;
use crate::report::Outcome;
use crate::runtime::{ContainerError, NetworkError, RuntimeAdapter, VolumeError};
use crate::types::NodeIndex;
use futures::future::join_all;
use tracing::Instrument;

pub(crate) async fn destroy(cx: &Context<'_>) {
    let settlement = Settlement::new(cx.graph.len());
    let lanes = partition(cx.graph, cx.order);

    join_all(
        lanes
            .hosts
            .iter()
            .map(|(host, nodes)| destroy_host(cx, &settlement, *host, nodes)),
    )
    .await;
}

async fn destroy_host(cx: &Context<'_>, settlement: &Settlement, host: NodeIndex, nodes: &[NodeIndex]) {
    let Resource::Host(descriptor) = cx.graph.resource(host) else {
        return;
    };
    let span = tracing::info_span!(parent: &cx.span, "host", host = %descriptor.name());

    async {
        let runtime = match cx.connector.connect(descriptor).await {
            Ok(runtime) => {
                cx.reporter.record(host, Outcome::Ready, None);
                runtime
            }
            Err(source) => {
                let error = DeployError::Connect {
                    host: descriptor.name().to_string(),
                    source,
                };
                tracing::error!(error = %error, "host unreachable, nothing removed");
                cx.reporter.record(host, Outcome::failed(&error), None);
                for &node in nodes {
                    cx.reporter.record(node, Outcome::skipped("host unavailable"), None);
                    settlement.settle(node, false);
                }
                return;
            }
        };

        for &node in nodes.iter().rev() {
            let dependents = cx
                .graph
                .dependents(node)
                .into_iter()
                .filter(|d| cx.graph.resource(*d).kind().is_materialized());
            if let Some(reason) = blocked(cx, settlement, "dependent", dependents).await {
                tracing::warn!(resource = %cx.graph.resource(node).name(), %reason, "not removed");
                cx.reporter.record(node, Outcome::skipped(reason), None);
                settlement.settle(node, false);
                continue;
            }

            let outcome = match remove(runtime.as_ref(), cx.graph.resource(node)).await {
                Ok(outcome) => outcome,
                Err(error) => Outcome::failed(&error),
            };
            tracing::info!(resource = %cx.graph.resource(node).name(), %outcome, "destroy");
            let ok = outcome.is_success();
            cx.reporter.record(node, outcome, None);
            settlement.settle(node, ok);
        }
    }
    .instrument(span)
    .await
}

async fn remove(runtime: &dyn RuntimeAdapter, resource: &Resource) -> Result<Outcome, DeployError> {
    let name = resource.name();
    let failed = |reason: &dyn std::fmt::Display| DeployError::removal(resource.kind(), &name, reason);

    match resource {
        Resource::Container(_) => match runtime.remove_container(&name).await {
            Ok(()) => Ok(Outcome::Removed),
            Err(ContainerError::NotFound(_)) => Ok(Outcome::Absent),
            Err(e) => Err(failed(&e)),
        },
        Resource::Volume(_) => match runtime.remove_volume(&name).await {
            Ok(()) => Ok(Outcome::Removed),
            Err(VolumeError::NotFound(_)) => Ok(Outcome::Absent),
            Err(e) => Err(failed(&e)),
        },
        Resource::Network(_) => match runtime.remove_network(&name).await {
            Ok(()) => Ok(Outcome::Removed),
            Err(NetworkError::NotFound(_)) => Ok(Outcome::Absent),
            Err(e) => Err(failed(&e)),
        },
        // Host lanes only hold materialized kinds.
        _ => Ok(Outcome::Absent),
    }
}
