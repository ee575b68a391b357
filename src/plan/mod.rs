// ABOUTME: The Plan aggregate: resource descriptors, their dependency graph and collaborators.
// ABOUTME: Exposes builders for every resource kind and the execute, dry-run and destroy entry points.

pub mod builders;
mod error;
mod graph;
mod resource;

pub use builders::{
    ContainerBuilder, Dependency, HostBuilder, ImageBuilder, MANAGED_LABEL, NetworkBuilder,
    PLAN_LABEL, RegistryBuilder, VolumeBuilder,
};
pub use error::ValidationError;
pub use graph::Graph;
pub use resource::{
    Container, DEFAULT_DOCKER_SOCKET, DEFAULT_FILES_DIR, Descriptor, Endpoint, FileAccess, Host,
    Image, Mount, MountSource, Network, NetworkAttachment, Registry, RegistryCredentials, Resource, ResourceKind,
    ResourceLimits, SshEndpoint, Volume,
};

use crate::config::Mode;
use crate::deploy::{self, CredentialMemo};
use crate::manifest::{FileManifestSource, ManifestSource};
use crate::report::{Report, Reporter};
use crate::runtime::{Connector, DockerConnector};
use crate::secrets::{EnvSecretStore, SecretStore};
use crate::types::{Handle, ImageRef, NodeIndex};
use parking_lot::RwLock;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

static NEXT_PLAN_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Default)]
struct PlanState {
    graph: Graph,
    /// First build failure; a plan that has one never executes.
    error: Option<ValidationError>,
}

/// A deployment plan.
///
/// Resources are registered through builders borrowed from the plan and
/// referenced by the typed handles those builders return. Descriptors are
/// append-only: running the plan changes remote state, never the plan.
pub struct Plan {
    id: u64,
    name: String,
    state: RwLock<PlanState>,
    span: tracing::Span,
    connector: Arc<dyn Connector>,
    credentials: Arc<CredentialMemo>,
    manifests: Arc<dyn ManifestSource>,
    deadline: Option<Duration>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("Plan")
            .field("name", &self.name)
            .field("resources", &state.graph.len())
            .field("error", &state.error)
            .field("deadline", &self.deadline)
            .finish()
    }
}

impl Plan {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let span = tracing::info_span!("plan", plan = %name);
        Self {
            id: NEXT_PLAN_ID.fetch_add(1, Ordering::Relaxed),
            name,
            state: RwLock::new(PlanState::default()),
            span,
            connector: Arc::new(DockerConnector),
            credentials: Arc::new(CredentialMemo::new(Arc::new(EnvSecretStore::default()))),
            manifests: Arc::new(FileManifestSource),
            deadline: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Parent span for every event emitted while running this plan.
    pub fn with_span(mut self, span: tracing::Span) -> Self {
        self.span = span;
        self
    }

    pub fn with_connector(mut self, connector: impl Connector + 'static) -> Self {
        self.connector = Arc::new(connector);
        self
    }

    pub fn with_secret_store(mut self, store: impl SecretStore + 'static) -> Self {
        self.credentials = Arc::new(CredentialMemo::new(Arc::new(store)));
        self
    }

    pub fn with_manifest_source(mut self, source: impl ManifestSource + 'static) -> Self {
        self.manifests = Arc::new(source);
        self
    }

    /// Stop dispatching new operations once a run has taken this long.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Runs stop dispatching new operations once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.state.read().graph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The first build error, if any builder failed.
    pub fn validation_error(&self) -> Option<ValidationError> {
        self.state.read().error.clone()
    }

    pub fn get<T: Descriptor + Clone>(&self, handle: Handle<T>) -> Option<T> {
        if handle.plan_id() != self.id {
            return None;
        }
        self.state
            .read()
            .graph
            .get(handle.node())
            .and_then(T::from_resource)
            .cloned()
    }

    /// Snapshot of the dependency graph.
    pub fn graph(&self) -> Graph {
        self.state.read().graph.clone()
    }

    /// Order in which Execute dispatches resources.
    pub fn execution_order(&self) -> Result<Vec<NodeIndex>, ValidationError> {
        self.state.read().graph.topological_order()
    }

    pub fn host(&self, name: impl Into<String>) -> HostBuilder<'_> {
        HostBuilder::new(self, name)
    }

    pub fn network(&self, name: impl Into<String>, host: Handle<Host>) -> NetworkBuilder<'_> {
        NetworkBuilder::new(self, name, host)
    }

    pub fn volume(&self, name: impl Into<String>, host: Handle<Host>) -> VolumeBuilder<'_> {
        VolumeBuilder::new(self, name, host)
    }

    pub fn registry(&self, domain: impl Into<String>) -> RegistryBuilder<'_> {
        RegistryBuilder::new(self, domain)
    }

    /// An image from a reference such as `ghcr.io/acme/api:1.4@sha256:...`.
    pub fn image(&self, reference: impl Into<String>) -> ImageBuilder<'_> {
        ImageBuilder::parse(self, reference)
    }

    pub fn image_ref(&self, reference: ImageRef) -> ImageBuilder<'_> {
        ImageBuilder::from_ref(self, reference)
    }

    pub fn container(
        &self,
        name: impl Into<String>,
        host: Handle<Host>,
        image: Handle<Image>,
    ) -> ContainerBuilder<'_> {
        ContainerBuilder::new(self, name, host, image)
    }

    pub fn find_registry(&self, domain: &str) -> Option<Handle<Registry>> {
        self.find(ResourceKind::Registry, &domain.to_ascii_lowercase())
    }

    pub fn find_image(&self, reference: &ImageRef) -> Option<Handle<Image>> {
        self.find(ResourceKind::Image, &reference.to_string())
    }

    fn find<T>(&self, kind: ResourceKind, name: &str) -> Option<Handle<T>> {
        self.state
            .read()
            .graph
            .find(kind, None, name)
            .map(|node| Handle::new(self.id, node))
    }

    /// Add an explicit edge: `dependent` runs only after `dependency` succeeded.
    pub fn add_dependency(
        &self,
        dependent: impl Into<Dependency>,
        dependency: impl Into<Dependency>,
    ) -> Result<(), ValidationError> {
        let mut state = self.state.write();
        let resolved = builders::resolve_dependencies(self, &[dependent.into(), dependency.into()])
            .and_then(|nodes| state.graph.add_edge(nodes[0], nodes[1]));
        if let Err(ref e) = resolved {
            state.error.get_or_insert_with(|| e.clone());
        }
        resolved
    }

    pub(crate) fn id(&self) -> u64 {
        self.id
    }

    pub(crate) fn check<T: Descriptor>(&self, handle: Handle<T>) -> Result<NodeIndex, ValidationError> {
        if handle.plan_id() == self.id {
            Ok(handle.node())
        } else {
            Err(ValidationError::ForeignHandle { kind: T::KIND })
        }
    }

    /// Validate and insert a descriptor under the write lock. Failures are
    /// remembered so the plan refuses to run.
    pub(crate) fn register<T>(
        &self,
        assemble: impl FnOnce(&Graph) -> Result<(Resource, Vec<NodeIndex>), ValidationError>,
    ) -> Result<Handle<T>, ValidationError> {
        let mut state = self.state.write();
        let inserted = assemble(&state.graph)
            .and_then(|(resource, dependencies)| state.graph.insert(resource, dependencies));
        match inserted {
            Ok(node) => {
                tracing::trace!(parent: &self.span, node = %node, "resource registered");
                Ok(Handle::new(self.id, node))
            }
            Err(e) => {
                state.error.get_or_insert_with(|| e.clone());
                Err(e)
            }
        }
    }

    pub(crate) fn credentials(&self) -> &Arc<CredentialMemo> {
        &self.credentials
    }

    pub(crate) fn manifests(&self) -> &Arc<dyn ManifestSource> {
        &self.manifests
    }

    /// Create and start everything that is missing.
    pub async fn execute(&self) -> Report {
        self.run(Mode::Execute).await
    }

    /// Report what `execute` would do without changing remote state.
    pub async fn dry_run(&self) -> Report {
        self.run(Mode::DryRun).await
    }

    /// Remove remote resources in reverse dependency order.
    pub async fn destroy(&self) -> Report {
        self.run(Mode::Destroy).await
    }

    pub async fn run(&self, mode: Mode) -> Report {
        let (graph, error) = {
            let state = self.state.read();
            (state.graph.clone(), state.error.clone())
        };
        let reporter = Reporter::new(&self.name, mode, &graph);

        if let Some(e) = error {
            tracing::error!(parent: &self.span, error = %e, "plan failed validation");
            return reporter.abort(e.to_string());
        }
        let order = match graph.topological_order() {
            Ok(order) => order,
            Err(e) => {
                tracing::error!(parent: &self.span, error = %e, "plan has a dependency cycle");
                return reporter.abort(e.to_string());
            }
        };

        let cancel = self.cancel.child_token();
        let context = deploy::Context {
            graph: &graph,
            order: &order,
            reporter: &reporter,
            connector: self.connector.as_ref(),
            credentials: &self.credentials,
            cancel: cancel.clone(),
            span: self.span.clone(),
        };

        {
            let walk = async {
                tracing::info!(mode = %mode, resources = graph.len(), "plan started");
                match mode {
                    Mode::Execute | Mode::DryRun => deploy::execute(&context, mode).await,
                    Mode::Destroy => deploy::destroy(&context).await,
                }
            }
            .instrument(self.span.clone());
            tokio::pin!(walk);

            match self.deadline {
                Some(deadline) => tokio::select! {
                    _ = &mut walk => {}
                    _ = tokio::time::sleep(deadline) => {
                        tracing::warn!(parent: &self.span, ?deadline, "deadline reached, cancelling");
                        cancel.cancel();
                        walk.await;
                    }
                },
                None => walk.await,
            }
        }

        let report = reporter.finish();
        tracing::info!(parent: &self.span, status = %report.status(), "plan finished");
        report
    }

    /// Run in the mode selected by `HADRON_DRY_RUN` / `HADRON_DESTROY`,
    /// cancelling on Ctrl-C.
    pub async fn run_from_env(&self) -> Report {
        let mode = Mode::from_env();
        let cancel = self.cancel.clone();
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted, no further operations will start");
                cancel.cancel();
            }
        });
        let report = self.run(mode).await;
        interrupt.abort();
        report
    }
}
