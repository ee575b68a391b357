// ABOUTME: Docker Engine implementation of the runtime adapter using bollard.
// ABOUTME: Probes run inside the container through exec so no ports need publishing.

use crate::config::{Protocol, RestartPolicy};
use crate::runtime::traits::{
    ContainerError, ContainerOps, ContainerSpec, FileError, FileOps, FileSpec, ImageError,
    ImageOps, MountKind, NetworkError, NetworkOps, NetworkSpec, ProbeError, ProbeOps,
    RegistryAuth, VolumeError, VolumeOps, VolumeSpec,
};
use crate::ssh::{Session, shell_quote};
use crate::types::ImageRef;
use async_trait::async_trait;
use bollard::Docker;
use bollard::exec::{StartExecOptions, StartExecResults};
use bollard::models::{
    ContainerCreateBody, EndpointSettings, HostConfig, Mount, MountTypeEnum, NetworkConnectRequest,
    NetworkCreateRequest, NetworkingConfig, PortBinding, RestartPolicy as DockerRestartPolicy,
    RestartPolicyNameEnum, VolumeCreateRequest,
};
use bollard::query_parameters::{
    CreateContainerOptions, CreateImageOptions, InspectContainerOptions, InspectNetworkOptions,
    RemoveContainerOptions, RemoveVolumeOptions, StartContainerOptions,
};
use futures::StreamExt;
use std::collections::HashMap;
use std::path::Path;

/// Seconds bollard waits on a single engine request.
const REQUEST_TIMEOUT_SECS: u64 = 120;

/// Seconds `nc` waits for a connection during TCP/UDP probes.
const PROBE_CONNECT_SECS: &str = "2";

// =============================================================================
// Error Mapping Helpers
// =============================================================================

fn status_of(e: &bollard::errors::Error) -> Option<u16> {
    match e {
        bollard::errors::Error::DockerResponseServerError { status_code, .. } => Some(*status_code),
        _ => None,
    }
}

fn map_network_create_error(e: bollard::errors::Error, name: &str) -> NetworkError {
    match status_of(&e) {
        Some(409) => NetworkError::AlreadyExists(name.to_string()),
        _ => NetworkError::Runtime(format!("failed to create {}: {}", name, e)),
    }
}

fn map_network_remove_error(e: bollard::errors::Error, name: &str) -> NetworkError {
    match status_of(&e) {
        Some(404) => NetworkError::NotFound(name.to_string()),
        Some(403) | Some(409) => NetworkError::InUse(name.to_string()),
        _ => NetworkError::Runtime(format!("failed to remove {}: {}", name, e)),
    }
}

fn map_volume_create_error(e: bollard::errors::Error, name: &str) -> VolumeError {
    match status_of(&e) {
        Some(409) => VolumeError::AlreadyExists(name.to_string()),
        _ => VolumeError::Runtime(format!("failed to create {}: {}", name, e)),
    }
}

fn map_volume_remove_error(e: bollard::errors::Error, name: &str) -> VolumeError {
    match status_of(&e) {
        Some(404) => VolumeError::NotFound(name.to_string()),
        Some(409) => VolumeError::InUse(name.to_string()),
        _ => VolumeError::Runtime(format!("failed to remove {}: {}", name, e)),
    }
}

fn map_container_create_error(e: bollard::errors::Error, spec: &ContainerSpec) -> ContainerError {
    match status_of(&e) {
        Some(404) => ContainerError::ImageNotFound(spec.image.to_string()),
        Some(409) => ContainerError::AlreadyExists(spec.name.clone()),
        _ => ContainerError::Runtime(e.to_string()),
    }
}

fn map_container_start_error(e: bollard::errors::Error, name: &str) -> ContainerError {
    match status_of(&e) {
        Some(404) => ContainerError::NotFound(name.to_string()),
        _ => ContainerError::StartFailed(format!("{}: {}", name, e)),
    }
}

fn map_container_remove_error(e: bollard::errors::Error, name: &str) -> ContainerError {
    match status_of(&e) {
        Some(404) => ContainerError::NotFound(name.to_string()),
        _ => ContainerError::Runtime(format!("failed to remove {}: {}", name, e)),
    }
}

fn map_exec_error(e: bollard::errors::Error, container: &str) -> ProbeError {
    match status_of(&e) {
        Some(404) => ProbeError::ContainerNotFound(container.to_string()),
        Some(409) => ProbeError::NotRunning(container.to_string()),
        _ => ProbeError::Runtime(e.to_string()),
    }
}

// =============================================================================
// BollardRuntime
// =============================================================================

/// Runtime adapter backed by a Docker Engine API client.
///
/// When the engine was reached over SSH the session is kept here so its
/// socket tunnel lives exactly as long as the adapter.
pub struct BollardRuntime {
    client: Docker,
    session: Option<Session>,
}

impl std::fmt::Debug for BollardRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BollardRuntime")
            .field("session", &self.session)
            .finish()
    }
}

impl BollardRuntime {
    pub fn new(client: Docker) -> Self {
        Self {
            client,
            session: None,
        }
    }

    /// Connect to an engine socket on this machine.
    pub fn connect_unix(socket: &Path) -> Result<Self, bollard::errors::Error> {
        let client = Docker::connect_with_unix(
            &socket.to_string_lossy(),
            REQUEST_TIMEOUT_SECS,
            bollard::API_DEFAULT_VERSION,
        )?;
        Ok(Self::new(client))
    }

    /// Tunnel the remote engine socket through `session` and connect to it.
    pub async fn connect_via_session(
        session: Session,
        remote_socket: &str,
    ) -> Result<Self, crate::runtime::ConnectError> {
        use crate::runtime::error::{EngineSnafu, SshSnafu};
        use snafu::ResultExt;

        let host = session.host().to_string();
        let local = session
            .forward_socket(remote_socket)
            .await
            .context(SshSnafu { host: host.clone() })?;
        let mut runtime = Self::connect_unix(&local).context(EngineSnafu { host })?;
        runtime.session = Some(session);
        Ok(runtime)
    }

    pub async fn ping(&self) -> Result<(), bollard::errors::Error> {
        self.client.ping().await.map(|_| ())
    }

    /// Run a command in a container and report whether it exited with 0.
    async fn exec_succeeds(&self, container: &str, cmd: Vec<String>) -> Result<bool, ProbeError> {
        let created = self
            .client
            .create_exec(
                container,
                bollard::models::ExecConfig {
                    cmd: Some(cmd),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    ..Default::default()
                },
            )
            .await
            .map_err(|e| map_exec_error(e, container))?;

        let started = self
            .client
            .start_exec(
                &created.id,
                Some(StartExecOptions {
                    detach: false,
                    ..Default::default()
                }),
            )
            .await
            .map_err(|e| map_exec_error(e, container))?;

        if let StartExecResults::Attached { mut output, .. } = started {
            while let Some(item) = output.next().await {
                if let Err(e) = item {
                    return Err(ProbeError::Runtime(e.to_string()));
                }
            }
        }

        let inspected = self
            .client
            .inspect_exec(&created.id)
            .await
            .map_err(|e| map_exec_error(e, container))?;
        Ok(inspected.exit_code == Some(0))
    }

    pub async fn disconnect(self) {
        if let Some(session) = self.session
            && let Err(e) = session.disconnect().await
        {
            tracing::debug!(error = %e, "ssh disconnect failed");
        }
    }
}

fn non_empty<K, V>(map: HashMap<K, V>) -> Option<HashMap<K, V>> {
    if map.is_empty() { None } else { Some(map) }
}

fn non_empty_vec<T: Clone>(items: &[T]) -> Option<Vec<T>> {
    if items.is_empty() {
        None
    } else {
        Some(items.to_vec())
    }
}

fn restart_policy(policy: RestartPolicy) -> DockerRestartPolicy {
    let (name, maximum_retry_count) = match policy {
        RestartPolicy::No => (RestartPolicyNameEnum::NO, None),
        RestartPolicy::Always => (RestartPolicyNameEnum::ALWAYS, None),
        RestartPolicy::UnlessStopped => (RestartPolicyNameEnum::UNLESS_STOPPED, None),
        RestartPolicy::OnFailure { max_retries } => (
            RestartPolicyNameEnum::ON_FAILURE,
            max_retries.map(i64::from),
        ),
    };
    DockerRestartPolicy {
        name: Some(name),
        maximum_retry_count,
    }
}

fn host_config(spec: &ContainerSpec) -> HostConfig {
    let mounts: Vec<Mount> = spec
        .mounts
        .iter()
        .map(|m| Mount {
            source: Some(m.source.clone()),
            target: Some(m.target.clone()),
            typ: Some(match m.kind {
                MountKind::Volume => MountTypeEnum::VOLUME,
                MountKind::Bind => MountTypeEnum::BIND,
            }),
            read_only: Some(m.read_only),
            ..Default::default()
        })
        .collect();

    let mut port_bindings: HashMap<String, Option<Vec<PortBinding>>> = HashMap::new();
    for port in &spec.ports {
        port_bindings.insert(
            port_key(port.container_port, port.protocol),
            Some(vec![PortBinding {
                host_ip: port.host_ip.clone(),
                host_port: port.host_port.map(|p| p.to_string()),
            }]),
        );
    }

    let limits = &spec.limits;
    HostConfig {
        restart_policy: Some(restart_policy(spec.restart_policy)),
        mounts: non_empty_vec(&mounts),
        port_bindings: non_empty(port_bindings),
        network_mode: spec.networks.first().map(|a| a.network.clone()),
        memory: limits.memory.map(|b| b as i64),
        memory_reservation: limits.memory_reservation.map(|b| b as i64),
        nano_cpus: limits.cpus.map(|c| (c * 1_000_000_000.0) as i64),
        cpu_shares: limits.cpu_shares.map(|s| s as i64),
        pids_limit: limits.pids_limit,
        readonly_rootfs: spec.read_only.then_some(true),
        cap_add: non_empty_vec(&spec.cap_add),
        cap_drop: non_empty_vec(&spec.cap_drop),
        security_opt: non_empty_vec(&spec.security_opt),
        ..Default::default()
    }
}

fn port_key(port: u16, protocol: Protocol) -> String {
    format!("{}/{}", port, protocol)
}

fn endpoint(aliases: &[String]) -> EndpointSettings {
    EndpointSettings {
        aliases: non_empty_vec(aliases),
        ..Default::default()
    }
}

#[async_trait]
impl NetworkOps for BollardRuntime {
    async fn network_exists(&self, name: &str) -> Result<bool, NetworkError> {
        match self
            .client
            .inspect_network(name, None::<InspectNetworkOptions>)
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if status_of(&e) == Some(404) => Ok(false),
            Err(e) => Err(NetworkError::Runtime(e.to_string())),
        }
    }

    async fn create_network(&self, spec: &NetworkSpec) -> Result<(), NetworkError> {
        let request = NetworkCreateRequest {
            name: spec.name.clone(),
            driver: Some(spec.driver.clone()),
            labels: non_empty(spec.labels.clone().into_iter().collect()),
            ..Default::default()
        };
        self.client
            .create_network(request)
            .await
            .map_err(|e| map_network_create_error(e, &spec.name))?;
        Ok(())
    }

    async fn remove_network(&self, name: &str) -> Result<(), NetworkError> {
        self.client
            .remove_network(name)
            .await
            .map_err(|e| map_network_remove_error(e, name))
    }
}

#[async_trait]
impl VolumeOps for BollardRuntime {
    async fn volume_exists(&self, name: &str) -> Result<bool, VolumeError> {
        match self.client.inspect_volume(name).await {
            Ok(_) => Ok(true),
            Err(e) if status_of(&e) == Some(404) => Ok(false),
            Err(e) => Err(VolumeError::Runtime(e.to_string())),
        }
    }

    async fn create_volume(&self, spec: &VolumeSpec) -> Result<(), VolumeError> {
        let request = VolumeCreateRequest {
            name: Some(spec.name.clone()),
            driver: spec.driver.clone(),
            labels: non_empty(spec.labels.clone().into_iter().collect()),
            ..Default::default()
        };
        self.client
            .create_volume(request)
            .await
            .map_err(|e| map_volume_create_error(e, &spec.name))?;
        Ok(())
    }

    async fn remove_volume(&self, name: &str) -> Result<(), VolumeError> {
        self.client
            .remove_volume(name, None::<RemoveVolumeOptions>)
            .await
            .map_err(|e| map_volume_remove_error(e, name))
    }
}

#[async_trait]
impl ImageOps for BollardRuntime {
    async fn image_exists(&self, reference: &ImageRef) -> Result<bool, ImageError> {
        let image_name = reference.to_string();
        match self.client.inspect_image(&image_name).await {
            Ok(_) => Ok(true),
            Err(e) if status_of(&e) == Some(404) => Ok(false),
            Err(e) => Err(ImageError::Runtime(format!(
                "failed to inspect {}: {}",
                image_name, e
            ))),
        }
    }

    async fn pull_image(
        &self,
        reference: &ImageRef,
        auth: Option<&RegistryAuth>,
    ) -> Result<(), ImageError> {
        let image_name = reference.to_string();
        let opts = CreateImageOptions {
            from_image: Some(image_name.clone()),
            ..Default::default()
        };
        let credentials = auth.map(|a| bollard::auth::DockerCredentials {
            username: Some(a.username.clone()),
            password: Some(a.password.clone()),
            serveraddress: Some(a.server.clone()),
            ..Default::default()
        });

        // Progress is streamed; drain it and surface the first error.
        let mut stream = self.client.create_image(Some(opts), None, credentials);
        while let Some(progress) = stream.next().await {
            progress.map_err(|e| match status_of(&e) {
                Some(401) | Some(403) => ImageError::AuthenticationFailed(reference.domain().to_string()),
                Some(404) => ImageError::NotFound(image_name.clone()),
                _ => ImageError::PullFailed(format!("{}: {}", image_name, e)),
            })?;
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerOps for BollardRuntime {
    async fn container_exists(&self, name: &str) -> Result<bool, ContainerError> {
        match self
            .client
            .inspect_container(name, None::<InspectContainerOptions>)
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if status_of(&e) == Some(404) => Ok(false),
            Err(e) => Err(ContainerError::Runtime(e.to_string())),
        }
    }

    async fn create_and_start_container(&self, spec: &ContainerSpec) -> Result<(), ContainerError> {
        let env: Vec<String> = spec
            .env
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        let exposed_ports: Vec<String> = spec
            .ports
            .iter()
            .map(|p| port_key(p.container_port, p.protocol))
            .collect();

        // The engine accepts a single endpoint at create time; the rest are
        // connected before start.
        let networking_config = spec.networks.first().map(|primary| NetworkingConfig {
            endpoints_config: Some(HashMap::from([(
                primary.network.clone(),
                endpoint(&primary.aliases),
            )])),
        });

        let body = ContainerCreateBody {
            image: Some(spec.image.to_string()),
            env: non_empty_vec(&env),
            labels: non_empty(spec.labels.clone().into_iter().collect()),
            cmd: spec.command.clone(),
            exposed_ports: non_empty_vec(&exposed_ports),
            host_config: Some(host_config(spec)),
            networking_config,
            ..Default::default()
        };
        let opts = CreateContainerOptions {
            name: Some(spec.name.clone()),
            ..Default::default()
        };

        self.client
            .create_container(Some(opts), body)
            .await
            .map_err(|e| map_container_create_error(e, spec))?;

        for attachment in spec.networks.iter().skip(1) {
            let request = NetworkConnectRequest {
                container: spec.name.clone(),
                endpoint_config: Some(endpoint(&attachment.aliases)),
            };
            self.client
                .connect_network(&attachment.network, request)
                .await
                .map_err(|e| {
                    ContainerError::Runtime(format!(
                        "failed to attach {} to {}: {}",
                        spec.name, attachment.network, e
                    ))
                })?;
        }

        self.client
            .start_container(&spec.name, None::<StartContainerOptions>)
            .await
            .map_err(|e| map_container_start_error(e, &spec.name))
    }

    async fn remove_container(&self, name: &str) -> Result<(), ContainerError> {
        let opts = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        self.client
            .remove_container(name, Some(opts))
            .await
            .map_err(|e| map_container_remove_error(e, name))
    }
}

/// Writes a file on this machine, for engines reached through a local socket.
async fn write_local_file(file: &FileSpec) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    use tokio::io::AsyncWriteExt;

    let path = Path::new(&file.path);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let mut out = tokio::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(file.mode)
        .open(path)
        .await?;
    // `mode` only applies on creation.
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(file.mode)).await?;
    out.write_all(&file.contents).await?;
    out.flush().await
}

#[async_trait]
impl FileOps for BollardRuntime {
    async fn upload_file(&self, file: &FileSpec) -> Result<(), FileError> {
        let written = match &self.session {
            Some(session) => session
                .write_file(&file.path, &file.contents, file.mode)
                .await
                .map_err(|e| e.to_string()),
            None => write_local_file(file).await.map_err(|e| e.to_string()),
        };
        written.map_err(|reason| FileError::Write {
            path: file.path.clone(),
            reason,
        })
    }
}

#[async_trait]
impl ProbeOps for BollardRuntime {
    async fn probe_http(&self, container: &str, path: &str, port: u16) -> Result<bool, ProbeError> {
        let url = shell_quote(&format!("http://127.0.0.1:{}{}", port, path));
        let script = format!(
            "if command -v wget >/dev/null 2>&1; then wget -q -O /dev/null {url}; \
             else curl -fsS -o /dev/null {url}; fi"
        );
        self.exec_succeeds(container, vec!["sh".into(), "-c".into(), script])
            .await
    }

    async fn probe_tcp(&self, container: &str, port: u16) -> Result<bool, ProbeError> {
        let cmd = ["nc", "-z", "-w", PROBE_CONNECT_SECS, "127.0.0.1", &port.to_string()]
            .map(String::from)
            .to_vec();
        self.exec_succeeds(container, cmd).await
    }

    async fn probe_udp(&self, container: &str, port: u16) -> Result<bool, ProbeError> {
        let cmd = ["nc", "-zu", "-w", PROBE_CONNECT_SECS, "127.0.0.1", &port.to_string()]
            .map(String::from)
            .to_vec();
        self.exec_succeeds(container, cmd).await
    }
}
