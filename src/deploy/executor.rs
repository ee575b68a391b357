// ABOUTME: Execute and DryRun walks: one sequential worker per host plus a plan-wide worker.
// ABOUTME: Applies the check-then-create protocol per resource kind and gates containers on health.

use super::Context;
use super::error::DeployError;
use super::health::{HealthChecker, HealthStatus};
use super::walk::{Settlement, blocked, partition};
use crate::config::Mode;
use crate::plan::{Container, Host, Image, MountSource, Network, Registry, Resource, ResourceKind, Volume};
use crate::report::Outcome;
use crate::runtime::{
    AttachmentSpec, ContainerSpec, FileError, FileSpec, MountKind, MountSpec, NetworkSpec,
    RuntimeAdapter, VolumeSpec,
};
use crate::types::NodeIndex;
use futures::future::join_all;
use std::sync::Arc;
use tracing::Instrument;

pub(crate) async fn execute(cx: &Context<'_>, mode: Mode) {
    let settlement = Settlement::new(cx.graph.len());
    let lanes = partition(cx.graph, cx.order);

    let globals = run_globals(cx, &settlement, &lanes.globals);
    let hosts = join_all(
        lanes
            .hosts
            .iter()
            .map(|(host, nodes)| run_host(cx, &settlement, mode, *host, nodes)),
    );
    futures::join!(globals, hosts);
}

/// Records the outcome and releases dependents.
fn conclude(
    cx: &Context<'_>,
    settlement: &Settlement,
    node: NodeIndex,
    outcome: Outcome,
    health: Option<HealthStatus>,
) {
    let resource = cx.graph.resource(node);
    let ok = outcome.is_success() && health.is_none_or(HealthStatus::is_healthy);
    match &outcome {
        Outcome::Failed { reason, .. } => {
            tracing::error!(kind = %resource.kind(), resource = %resource.name(), %reason, "failed");
        }
        Outcome::Skipped { reason } => {
            tracing::warn!(kind = %resource.kind(), resource = %resource.name(), %reason, "skipped");
        }
        _ => {
            tracing::info!(kind = %resource.kind(), resource = %resource.name(), %outcome, "done");
        }
    }
    cx.reporter.record(node, outcome, health);
    settlement.settle(node, ok);
}

async fn run_globals(cx: &Context<'_>, settlement: &Settlement, nodes: &[NodeIndex]) {
    for &node in nodes {
        if let Some(reason) = blocked(cx, settlement, "dependency", cx.graph.dependencies(node)).await {
            conclude(cx, settlement, node, Outcome::skipped(reason), None);
            continue;
        }
        let outcome = match cx.graph.resource(node) {
            Resource::Registry(registry) => match cx.credentials.registry_auth(registry).await {
                Ok(_) => Outcome::Ready,
                Err(source) => Outcome::failed(&DeployError::Credential {
                    registry: registry.domain().to_string(),
                    source,
                }),
            },
            // Pinned at build time; pulled per host by the containers that use it.
            Resource::Image(_) => Outcome::Ready,
            _ => continue,
        };
        conclude(cx, settlement, node, outcome, None);
    }
}

async fn run_host(
    cx: &Context<'_>,
    settlement: &Settlement,
    mode: Mode,
    host: NodeIndex,
    nodes: &[NodeIndex],
) {
    let Resource::Host(descriptor) = cx.graph.resource(host) else {
        return;
    };
    let span = tracing::info_span!(parent: &cx.span, "host", host = %descriptor.name());

    async {
        let runtime = connect(cx, settlement, host, descriptor).await;

        for &node in nodes {
            if let Some(reason) = blocked(cx, settlement, "dependency", cx.graph.dependencies(node)).await {
                conclude(cx, settlement, node, Outcome::skipped(reason), None);
                continue;
            }
            let Some(runtime) = runtime.as_deref() else {
                conclude(cx, settlement, node, Outcome::skipped("host unavailable"), None);
                continue;
            };

            let result = match cx.graph.resource(node) {
                Resource::Network(network) => ensure_network(runtime, network, mode).await.map(|o| (o, None)),
                Resource::Volume(volume) => ensure_volume(runtime, volume, mode).await.map(|o| (o, None)),
                Resource::Container(container) => ensure_container(cx, runtime, container, mode).await,
                _ => continue,
            };
            let (outcome, health) = result.unwrap_or_else(|e| (Outcome::failed(&e), None));
            conclude(cx, settlement, node, outcome, health);
        }
    }
    .instrument(span)
    .await
}

async fn connect(
    cx: &Context<'_>,
    settlement: &Settlement,
    node: NodeIndex,
    host: &Host,
) -> Option<Arc<dyn RuntimeAdapter>> {
    if let Some(reason) = blocked(cx, settlement, "dependency", cx.graph.dependencies(node)).await {
        conclude(cx, settlement, node, Outcome::skipped(reason), None);
        return None;
    }
    match cx.connector.connect(host).await {
        Ok(runtime) => {
            conclude(cx, settlement, node, Outcome::Ready, None);
            Some(runtime)
        }
        Err(source) => {
            let error = DeployError::Connect {
                host: host.name().to_string(),
                source,
            };
            conclude(cx, settlement, node, Outcome::failed(&error), None);
            None
        }
    }
}

async fn ensure_network(
    runtime: &dyn RuntimeAdapter,
    network: &Network,
    mode: Mode,
) -> Result<Outcome, DeployError> {
    let name = network.name();
    let exists = runtime
        .network_exists(name)
        .await
        .map_err(|source| DeployError::NetworkCheck {
            name: name.to_string(),
            source,
        })?;
    if exists {
        return Ok(Outcome::AlreadyExisted);
    }
    if mode == Mode::DryRun {
        return Ok(Outcome::WouldCreate);
    }

    let spec = NetworkSpec {
        name: name.to_string(),
        driver: network.driver().to_string(),
        labels: network.labels().clone(),
    };
    runtime
        .create_network(&spec)
        .await
        .map_err(|source| DeployError::NetworkCreate {
            name: name.to_string(),
            source,
        })?;
    Ok(Outcome::Created)
}

async fn ensure_volume(
    runtime: &dyn RuntimeAdapter,
    volume: &Volume,
    mode: Mode,
) -> Result<Outcome, DeployError> {
    let name = volume.name();
    let exists = runtime
        .volume_exists(name)
        .await
        .map_err(|source| DeployError::VolumeCheck {
            name: name.to_string(),
            source,
        })?;
    if exists {
        return Ok(Outcome::AlreadyExisted);
    }
    if mode == Mode::DryRun {
        return Ok(Outcome::WouldCreate);
    }

    let spec = VolumeSpec {
        name: name.to_string(),
        driver: volume.driver().map(str::to_string),
        labels: volume.labels().clone(),
    };
    runtime
        .create_volume(&spec)
        .await
        .map_err(|source| DeployError::VolumeCreate {
            name: name.to_string(),
            source,
        })?;
    Ok(Outcome::Created)
}

async fn ensure_container(
    cx: &Context<'_>,
    runtime: &dyn RuntimeAdapter,
    container: &Container,
    mode: Mode,
) -> Result<(Outcome, Option<HealthStatus>), DeployError> {
    let name = container.name();
    let exists = runtime
        .container_exists(name)
        .await
        .map_err(|source| DeployError::ContainerCheck {
            name: name.to_string(),
            source,
        })?;
    if exists {
        // A container left by an earlier run still gates its dependents.
        let health = match mode {
            Mode::DryRun => None,
            _ => check_health(cx, runtime, container).await,
        };
        return Ok((Outcome::AlreadyExisted, health));
    }
    if mode == Mode::DryRun {
        return Ok((Outcome::WouldCreate, None));
    }

    let Resource::Image(image) = cx.graph.resource(container.image().node()) else {
        return Ok((Outcome::skipped("image descriptor missing"), None));
    };
    let Resource::Host(host) = cx.graph.resource(container.host().node()) else {
        return Ok((Outcome::skipped("host descriptor missing"), None));
    };
    ensure_image(cx, runtime, image).await?;
    upload_files(runtime, host, container).await?;

    let spec = container_spec(cx, host, container, image);
    runtime
        .create_and_start_container(&spec)
        .await
        .map_err(|source| DeployError::ContainerCreate {
            name: name.to_string(),
            source,
        })?;
    tracing::debug!(container = %name, image = %image.reference(), "container started");

    Ok((Outcome::Created, check_health(cx, runtime, container).await))
}

async fn check_health(
    cx: &Context<'_>,
    runtime: &dyn RuntimeAdapter,
    container: &Container,
) -> Option<HealthStatus> {
    let probe = container.probe()?;
    Some(
        HealthChecker::new(container.name(), probe)
            .wait(runtime, &cx.cancel)
            .await,
    )
}

/// Pulls the image when the host does not have it, authenticating against
/// the plan's registry for the image's domain.
async fn ensure_image(
    cx: &Context<'_>,
    runtime: &dyn RuntimeAdapter,
    image: &Image,
) -> Result<(), DeployError> {
    let reference = image.reference();
    let pull_error = |source| DeployError::ImagePull {
        image: reference.to_string(),
        source,
    };

    if runtime.image_exists(reference).await.map_err(pull_error)? {
        return Ok(());
    }

    let registry = cx
        .graph
        .find(ResourceKind::Registry, None, image.domain())
        .and_then(|node| match cx.graph.resource(node) {
            Resource::Registry(registry) => Some(registry),
            _ => None,
        });
    let auth = match registry {
        Some(registry) => Some(registry_auth(cx, registry).await?),
        None => None,
    };

    tracing::info!(image = %reference, authenticated = auth.is_some(), "pulling image");
    runtime
        .pull_image(reference, auth.as_ref())
        .await
        .map_err(pull_error)
}

async fn registry_auth(
    cx: &Context<'_>,
    registry: &Registry,
) -> Result<crate::runtime::RegistryAuth, DeployError> {
    cx.credentials
        .registry_auth(registry)
        .await
        .map_err(|source| DeployError::Credential {
            registry: registry.domain().to_string(),
            source,
        })
}

/// Copies the container's file mounts from this machine to its host.
async fn upload_files(
    runtime: &dyn RuntimeAdapter,
    host: &Host,
    container: &Container,
) -> Result<(), DeployError> {
    let upload_error = |source: FileError| DeployError::FileUpload {
        container: container.name().to_string(),
        source,
    };
    for mount in container.mounts() {
        let MountSource::File { local, access } = &mount.source else {
            continue;
        };
        let contents = tokio::fs::read(local).await.map_err(|e| {
            upload_error(FileError::Read {
                path: local.display().to_string(),
                reason: e.to_string(),
            })
        })?;
        let file = FileSpec {
            path: host.file_path(container.name(), &mount.target),
            contents,
            mode: access.mode(),
        };
        tracing::debug!(container = %container.name(), path = %file.path, "placing file");
        runtime.upload_file(&file).await.map_err(upload_error)?;
    }
    Ok(())
}

/// Resolves every plan reference in `container` to the names the runtime knows.
fn container_spec(
    cx: &Context<'_>,
    host: &Host,
    container: &Container,
    image: &Image,
) -> ContainerSpec {
    let name_of = |node: NodeIndex| cx.graph.resource(node).name();

    let networks = container
        .networks()
        .iter()
        .map(|attachment| AttachmentSpec {
            network: name_of(attachment.network.node()),
            aliases: attachment.aliases.clone(),
        })
        .collect();

    let mounts = container
        .mounts()
        .iter()
        .map(|mount| {
            let (kind, source) = match &mount.source {
                MountSource::Volume(volume) => (MountKind::Volume, name_of(volume.node())),
                MountSource::Bind(path) => (MountKind::Bind, path.display().to_string()),
                MountSource::File { .. } => (
                    MountKind::Bind,
                    host.file_path(container.name(), &mount.target),
                ),
            };
            MountSpec {
                kind,
                source,
                target: mount.target.clone(),
                read_only: mount.read_only,
            }
        })
        .collect();

    ContainerSpec {
        name: container.name().to_string(),
        image: image.reference().clone(),
        env: container.env().clone(),
        labels: container.labels().clone(),
        ports: container.ports().to_vec(),
        mounts,
        networks,
        command: container.command().map(<[String]>::to_vec),
        restart_policy: container.restart(),
        limits: container.limits().clone(),
        read_only: container.read_only(),
        cap_add: container.cap_add().to_vec(),
        cap_drop: container.cap_drop().to_vec(),
        security_opt: container.security_opt().to_vec(),
    }
}
