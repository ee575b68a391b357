// ABOUTME: Test support utilities.
// ABOUTME: In-memory container engine shared by every fake host, with call recording and failure injection.

#![allow(dead_code)]

use async_trait::async_trait;
use hadron::Plan;
use hadron::plan::Host;
use hadron::runtime::{
    ConnectError, Connector, ContainerError, ContainerOps, ContainerSpec, FileError, FileOps,
    FileSpec, ImageError, ImageOps, NetworkError, NetworkOps, NetworkSpec, ProbeError, ProbeOps,
    RegistryAuth, RuntimeAdapter, VolumeError, VolumeOps, VolumeSpec,
};
use hadron::secrets::StaticSecretStore;
use hadron::types::ImageRef;
use parking_lot::Mutex;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Once};

pub const DIGEST: &str = "sha256:4f6c0b3f1e2d8a9c7b5e3d1f0a2c4e6b8d0f1a3c5e7b9d2f4a6c8e0b1d3f5a7c";

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env()
            .add_directive("hadron=debug".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    NetworkExists,
    CreateNetwork,
    RemoveNetwork,
    VolumeExists,
    CreateVolume,
    RemoveVolume,
    ContainerExists,
    CreateContainer,
    RemoveContainer,
    ImageExists,
    PullImage,
    UploadFile,
    Probe,
}

impl Op {
    pub fn is_mutation(self) -> bool {
        matches!(
            self,
            Op::CreateNetwork
                | Op::RemoveNetwork
                | Op::CreateVolume
                | Op::RemoveVolume
                | Op::CreateContainer
                | Op::RemoveContainer
                | Op::PullImage
                | Op::UploadFile
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub host: String,
    pub op: Op,
    pub name: String,
}

#[derive(Debug, Clone, Copy)]
enum Readiness {
    /// Probe succeeds from this attempt on (1-based).
    After(u32),
    Never,
}

#[derive(Default)]
struct State {
    networks: BTreeSet<(String, String)>,
    volumes: BTreeSet<(String, String)>,
    containers: BTreeSet<(String, String)>,
    images: BTreeSet<(String, String)>,
    specs: HashMap<String, ContainerSpec>,
    pulls: Vec<(String, Option<RegistryAuth>)>,
    files: HashMap<(String, String), FileSpec>,
    calls: Vec<Call>,
    failures: HashSet<(Op, String)>,
    unreachable: HashSet<String>,
    readiness: HashMap<String, Readiness>,
    probes: HashMap<String, u32>,
}

/// Handle on the shared fake engine state.
#[derive(Clone, Default)]
pub struct FakeEngine {
    state: Arc<Mutex<State>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connector(&self) -> FakeConnector {
        FakeConnector {
            engine: self.clone(),
        }
    }

    pub fn with_network(self, host: &str, name: &str) -> Self {
        self.state.lock().networks.insert((host.into(), name.into()));
        self
    }

    pub fn with_volume(self, host: &str, name: &str) -> Self {
        self.state.lock().volumes.insert((host.into(), name.into()));
        self
    }

    pub fn with_container(self, host: &str, name: &str) -> Self {
        self.state.lock().containers.insert((host.into(), name.into()));
        self
    }

    pub fn with_image(self, host: &str, reference: &str) -> Self {
        self.state.lock().images.insert((host.into(), reference.into()));
        self
    }

    /// Make every `op` on `name` fail with a runtime error.
    pub fn failing(self, op: Op, name: &str) -> Self {
        self.state.lock().failures.insert((op, name.into()));
        self
    }

    pub fn unreachable(self, host: &str) -> Self {
        self.state.lock().unreachable.insert(host.into());
        self
    }

    pub fn healthy_after(self, container: &str, attempts: u32) -> Self {
        self.state
            .lock()
            .readiness
            .insert(container.into(), Readiness::After(attempts));
        self
    }

    pub fn never_healthy(self, container: &str) -> Self {
        self.state
            .lock()
            .readiness
            .insert(container.into(), Readiness::Never);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(|c| c.op.is_mutation()).collect()
    }

    /// `(op, name)` pairs of mutations, in call order.
    pub fn mutation_names(&self) -> Vec<(Op, String)> {
        self.mutations().into_iter().map(|c| (c.op, c.name)).collect()
    }

    pub fn position(&self, op: Op, name: &str) -> Option<usize> {
        self.calls().iter().position(|c| c.op == op && c.name == name)
    }

    pub fn probes(&self, container: &str) -> u32 {
        self.state.lock().probes.get(container).copied().unwrap_or(0)
    }

    pub fn spec(&self, container: &str) -> Option<ContainerSpec> {
        self.state.lock().specs.get(container).cloned()
    }

    pub fn pulls(&self) -> Vec<(String, Option<RegistryAuth>)> {
        self.state.lock().pulls.clone()
    }

    /// The file uploaded to `path` on `host`, if any.
    pub fn file(&self, host: &str, path: &str) -> Option<FileSpec> {
        self.state.lock().files.get(&(host.into(), path.into())).cloned()
    }

    pub fn has_network(&self, host: &str, name: &str) -> bool {
        self.state.lock().networks.contains(&(host.into(), name.into()))
    }

    pub fn has_volume(&self, host: &str, name: &str) -> bool {
        self.state.lock().volumes.contains(&(host.into(), name.into()))
    }

    pub fn has_container(&self, host: &str, name: &str) -> bool {
        self.state.lock().containers.contains(&(host.into(), name.into()))
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }
}

pub struct FakeConnector {
    engine: FakeEngine,
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self, host: &Host) -> Result<Arc<dyn RuntimeAdapter>, ConnectError> {
        tokio::task::yield_now().await;
        if self.engine.state.lock().unreachable.contains(host.name()) {
            return Err(ConnectError::Unavailable {
                host: host.name().to_string(),
                message: "connection refused".to_string(),
            });
        }
        Ok(Arc::new(FakeRuntime {
            host: host.name().to_string(),
            engine: self.engine.clone(),
        }))
    }
}

/// One host's view of the shared engine.
pub struct FakeRuntime {
    host: String,
    engine: FakeEngine,
}

impl FakeRuntime {
    /// Records the call; returns the injected failure message, if any.
    async fn call(&self, op: Op, name: &str) -> Option<String> {
        tokio::task::yield_now().await;
        let mut state = self.engine.state.lock();
        state.calls.push(Call {
            host: self.host.clone(),
            op,
            name: name.to_string(),
        });
        state
            .failures
            .contains(&(op, name.to_string()))
            .then(|| format!("injected {:?} failure", op))
    }

    fn key(&self, name: &str) -> (String, String) {
        (self.host.clone(), name.to_string())
    }
}

#[async_trait]
impl NetworkOps for FakeRuntime {
    async fn network_exists(&self, name: &str) -> Result<bool, NetworkError> {
        if let Some(e) = self.call(Op::NetworkExists, name).await {
            return Err(NetworkError::Runtime(e));
        }
        Ok(self.engine.state.lock().networks.contains(&self.key(name)))
    }

    async fn create_network(&self, spec: &NetworkSpec) -> Result<(), NetworkError> {
        if let Some(e) = self.call(Op::CreateNetwork, &spec.name).await {
            return Err(NetworkError::Runtime(e));
        }
        if !self.engine.state.lock().networks.insert(self.key(&spec.name)) {
            return Err(NetworkError::AlreadyExists(spec.name.clone()));
        }
        Ok(())
    }

    async fn remove_network(&self, name: &str) -> Result<(), NetworkError> {
        if let Some(e) = self.call(Op::RemoveNetwork, name).await {
            return Err(NetworkError::Runtime(e));
        }
        if !self.engine.state.lock().networks.remove(&self.key(name)) {
            return Err(NetworkError::NotFound(name.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl VolumeOps for FakeRuntime {
    async fn volume_exists(&self, name: &str) -> Result<bool, VolumeError> {
        if let Some(e) = self.call(Op::VolumeExists, name).await {
            return Err(VolumeError::Runtime(e));
        }
        Ok(self.engine.state.lock().volumes.contains(&self.key(name)))
    }

    async fn create_volume(&self, spec: &VolumeSpec) -> Result<(), VolumeError> {
        if let Some(e) = self.call(Op::CreateVolume, &spec.name).await {
            return Err(VolumeError::Runtime(e));
        }
        if !self.engine.state.lock().volumes.insert(self.key(&spec.name)) {
            return Err(VolumeError::AlreadyExists(spec.name.clone()));
        }
        Ok(())
    }

    async fn remove_volume(&self, name: &str) -> Result<(), VolumeError> {
        if let Some(e) = self.call(Op::RemoveVolume, name).await {
            return Err(VolumeError::Runtime(e));
        }
        if !self.engine.state.lock().volumes.remove(&self.key(name)) {
            return Err(VolumeError::NotFound(name.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ImageOps for FakeRuntime {
    async fn image_exists(&self, reference: &ImageRef) -> Result<bool, ImageError> {
        let reference = reference.to_string();
        if let Some(e) = self.call(Op::ImageExists, &reference).await {
            return Err(ImageError::Runtime(e));
        }
        Ok(self.engine.state.lock().images.contains(&self.key(&reference)))
    }

    async fn pull_image(
        &self,
        reference: &ImageRef,
        auth: Option<&RegistryAuth>,
    ) -> Result<(), ImageError> {
        let reference = reference.to_string();
        if let Some(e) = self.call(Op::PullImage, &reference).await {
            return Err(ImageError::PullFailed(e));
        }
        let mut state = self.engine.state.lock();
        state.pulls.push((reference.clone(), auth.cloned()));
        state.images.insert(self.key(&reference));
        Ok(())
    }
}

#[async_trait]
impl ContainerOps for FakeRuntime {
    async fn container_exists(&self, name: &str) -> Result<bool, ContainerError> {
        if let Some(e) = self.call(Op::ContainerExists, name).await {
            return Err(ContainerError::Runtime(e));
        }
        Ok(self.engine.state.lock().containers.contains(&self.key(name)))
    }

    async fn create_and_start_container(&self, spec: &ContainerSpec) -> Result<(), ContainerError> {
        if let Some(e) = self.call(Op::CreateContainer, &spec.name).await {
            return Err(ContainerError::StartFailed(e));
        }
        let mut state = self.engine.state.lock();
        if !state.containers.insert(self.key(&spec.name)) {
            return Err(ContainerError::AlreadyExists(spec.name.clone()));
        }
        state.specs.insert(spec.name.clone(), spec.clone());
        Ok(())
    }

    async fn remove_container(&self, name: &str) -> Result<(), ContainerError> {
        if let Some(e) = self.call(Op::RemoveContainer, name).await {
            return Err(ContainerError::Runtime(e));
        }
        if !self.engine.state.lock().containers.remove(&self.key(name)) {
            return Err(ContainerError::NotFound(name.to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl FileOps for FakeRuntime {
    async fn upload_file(&self, file: &FileSpec) -> Result<(), FileError> {
        if let Some(reason) = self.call(Op::UploadFile, &file.path).await {
            return Err(FileError::Write {
                path: file.path.clone(),
                reason,
            });
        }
        self.engine
            .state
            .lock()
            .files
            .insert(self.key(&file.path), file.clone());
        Ok(())
    }
}

impl FakeRuntime {
    async fn probe(&self, container: &str) -> Result<bool, ProbeError> {
        if let Some(e) = self.call(Op::Probe, container).await {
            return Err(ProbeError::Runtime(e));
        }
        let mut state = self.engine.state.lock();
        if !state.containers.contains(&self.key(container)) {
            return Err(ProbeError::ContainerNotFound(container.to_string()));
        }
        let attempt = {
            let count = state.probes.entry(container.to_string()).or_insert(0);
            *count += 1;
            *count
        };
        Ok(match state.readiness.get(container) {
            Some(Readiness::After(n)) => attempt >= *n,
            Some(Readiness::Never) => false,
            None => true,
        })
    }
}

#[async_trait]
impl ProbeOps for FakeRuntime {
    async fn probe_http(&self, container: &str, _path: &str, _port: u16) -> Result<bool, ProbeError> {
        self.probe(container).await
    }

    async fn probe_tcp(&self, container: &str, _port: u16) -> Result<bool, ProbeError> {
        self.probe(container).await
    }

    async fn probe_udp(&self, container: &str, _port: u16) -> Result<bool, ProbeError> {
        self.probe(container).await
    }
}

/// A plan wired to `engine`, with a `ghcr` secret for registry logins.
pub fn plan(name: &str, engine: &FakeEngine) -> Plan {
    init_tracing();
    Plan::new(name)
        .with_connector(engine.connector())
        .with_secret_store(
            StaticSecretStore::new()
                .with_secret("ghcr", [("username", "bot"), ("password", "s3cret")]),
        )
}

pub fn image_ref(domain: &str, name: &str) -> String {
    format!("{}/{}:1.0@{}", domain, name, DIGEST)
}
