// ABOUTME: Immutable resource descriptors produced by plan builders.
// ABOUTME: Host, Network, Volume, Registry, Image and Container, plus the Resource sum type.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::config::{HealthProbe, PortMapping, RestartPolicy};
use crate::types::{Handle, ImageRef, ResourceName};

/// Default Docker engine socket on a target host.
pub const DEFAULT_DOCKER_SOCKET: &str = "/var/run/docker.sock";

/// Directory on a target host that receives files mounted from this machine.
pub const DEFAULT_FILES_DIR: &str = "/var/lib/hadron/files";

/// Kinds of resources a plan can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    Host,
    Network,
    Volume,
    Registry,
    Image,
    Container,
}

impl ResourceKind {
    /// Kinds that exist as objects on a container engine and are therefore
    /// created by Execute and removed by Destroy.
    pub fn is_materialized(self) -> bool {
        matches!(
            self,
            ResourceKind::Network | ResourceKind::Volume | ResourceKind::Container
        )
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResourceKind::Host => "host",
            ResourceKind::Network => "network",
            ResourceKind::Volume => "volume",
            ResourceKind::Registry => "registry",
            ResourceKind::Image => "image",
            ResourceKind::Container => "container",
        };
        f.write_str(s)
    }
}

/// How hadron reaches the container engine of a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Forward the remote engine socket over SSH.
    Ssh(SshEndpoint),
    /// Talk to an engine socket on this machine.
    Local { socket: PathBuf },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SshEndpoint {
    pub address: String,
    pub port: u16,
    pub user: Option<String>,
    pub identity: Option<PathBuf>,
    pub known_hosts: Option<PathBuf>,
    pub trust_first_connection: bool,
    pub socket: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Host {
    pub(crate) name: ResourceName,
    pub(crate) endpoint: Endpoint,
    pub(crate) files_dir: String,
}

impl Host {
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn files_dir(&self) -> &str {
        &self.files_dir
    }

    /// Where a file mounted at `target` in `container` is stored on this host.
    pub fn file_path(&self, container: &str, target: &str) -> String {
        format!("{}/{}{}", self.files_dir.trim_end_matches('/'), container, target)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Network {
    pub(crate) name: ResourceName,
    pub(crate) host: Handle<Host>,
    pub(crate) driver: String,
    pub(crate) labels: BTreeMap<String, String>,
}

impl Network {
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn host(&self) -> Handle<Host> {
        self.host
    }

    pub fn driver(&self) -> &str {
        &self.driver
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Volume {
    pub(crate) name: ResourceName,
    pub(crate) host: Handle<Host>,
    pub(crate) driver: Option<String>,
    pub(crate) labels: BTreeMap<String, String>,
}

impl Volume {
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn host(&self) -> Handle<Host> {
        self.host
    }

    pub fn driver(&self) -> Option<&str> {
        self.driver.as_deref()
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }
}

/// Where registry credentials come from.
#[derive(Clone, PartialEq, Eq)]
pub enum RegistryCredentials {
    Inline { username: String, password: String },
    /// Resolved through the plan's secret store at execution time.
    Secret { reference: String },
}

impl fmt::Debug for RegistryCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryCredentials::Inline { username, .. } => f
                .debug_struct("Inline")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            RegistryCredentials::Secret { reference } => f
                .debug_struct("Secret")
                .field("reference", reference)
                .finish(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Registry {
    pub(crate) domain: String,
    pub(crate) credentials: RegistryCredentials,
}

impl Registry {
    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn credentials(&self) -> &RegistryCredentials {
        &self.credentials
    }
}

/// A digest-pinned image.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub(crate) reference: ImageRef,
}

impl Image {
    pub fn reference(&self) -> &ImageRef {
        &self.reference
    }

    pub fn domain(&self) -> &str {
        self.reference.domain()
    }

    pub fn name(&self) -> &str {
        self.reference.name()
    }

    pub fn version(&self) -> Option<&str> {
        self.reference.version()
    }

    pub fn digest(&self) -> &str {
        // Builders refuse unpinned references.
        self.reference.digest().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NetworkAttachment {
    pub network: Handle<Network>,
    pub aliases: Vec<String>,
}

/// Permission bits given to a file copied onto a host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FileAccess {
    /// Readable by everyone (0644).
    #[default]
    Public,
    /// Readable by the owner only (0600).
    Secret,
}

impl FileAccess {
    pub fn mode(self) -> u32 {
        match self {
            FileAccess::Public => 0o644,
            FileAccess::Secret => 0o600,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MountSource {
    Volume(Handle<Volume>),
    /// Absolute path on the target host.
    Bind(PathBuf),
    /// File on this machine, copied to the host before the container is created.
    File { local: PathBuf, access: FileAccess },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mount {
    pub source: MountSource,
    pub target: String,
    pub read_only: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceLimits {
    /// Bytes.
    pub memory: Option<u64>,
    /// Bytes.
    pub memory_reservation: Option<u64>,
    pub cpu_shares: Option<u64>,
    pub cpus: Option<f64>,
    pub pids_limit: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    pub(crate) name: ResourceName,
    pub(crate) host: Handle<Host>,
    pub(crate) image: Handle<Image>,
    pub(crate) networks: Vec<NetworkAttachment>,
    pub(crate) mounts: Vec<Mount>,
    pub(crate) env: BTreeMap<String, String>,
    pub(crate) labels: BTreeMap<String, String>,
    pub(crate) ports: Vec<PortMapping>,
    pub(crate) limits: ResourceLimits,
    pub(crate) probe: Option<HealthProbe>,
    pub(crate) restart: RestartPolicy,
    pub(crate) read_only: bool,
    pub(crate) cap_add: Vec<String>,
    pub(crate) cap_drop: Vec<String>,
    pub(crate) security_opt: Vec<String>,
    pub(crate) command: Option<Vec<String>>,
}

impl Container {
    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn host(&self) -> Handle<Host> {
        self.host
    }

    pub fn image(&self) -> Handle<Image> {
        self.image
    }

    pub fn networks(&self) -> &[NetworkAttachment] {
        &self.networks
    }

    pub fn mounts(&self) -> &[Mount] {
        &self.mounts
    }

    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.env
    }

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    pub fn ports(&self) -> &[PortMapping] {
        &self.ports
    }

    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }

    pub fn probe(&self) -> Option<&HealthProbe> {
        self.probe.as_ref()
    }

    pub fn restart(&self) -> RestartPolicy {
        self.restart
    }

    pub fn read_only(&self) -> bool {
        self.read_only
    }

    pub fn cap_add(&self) -> &[String] {
        &self.cap_add
    }

    pub fn cap_drop(&self) -> &[String] {
        &self.cap_drop
    }

    pub fn security_opt(&self) -> &[String] {
        &self.security_opt
    }

    pub fn command(&self) -> Option<&[String]> {
        self.command.as_deref()
    }
}

/// Any descriptor stored in a plan's graph.
#[derive(Debug, Clone, PartialEq)]
pub enum Resource {
    Host(Host),
    Network(Network),
    Volume(Volume),
    Registry(Registry),
    Image(Image),
    Container(Container),
}

impl Resource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Host(_) => ResourceKind::Host,
            Resource::Network(_) => ResourceKind::Network,
            Resource::Volume(_) => ResourceKind::Volume,
            Resource::Registry(_) => ResourceKind::Registry,
            Resource::Image(_) => ResourceKind::Image,
            Resource::Container(_) => ResourceKind::Container,
        }
    }

    /// Display name; registries are named by domain and images by reference.
    pub fn name(&self) -> String {
        match self {
            Resource::Host(h) => h.name().to_string(),
            Resource::Network(n) => n.name().to_string(),
            Resource::Volume(v) => v.name().to_string(),
            Resource::Registry(r) => r.domain().to_string(),
            Resource::Image(i) => i.reference().to_string(),
            Resource::Container(c) => c.name().to_string(),
        }
    }

    /// The host a resource lives on. Hosts, registries and images are plan-wide.
    pub fn host(&self) -> Option<Handle<Host>> {
        match self {
            Resource::Network(n) => Some(n.host),
            Resource::Volume(v) => Some(v.host),
            Resource::Container(c) => Some(c.host),
            Resource::Host(_) | Resource::Registry(_) | Resource::Image(_) => None,
        }
    }
}

/// Ties a descriptor type to its [`Resource`] variant.
pub trait Descriptor: Sized {
    const KIND: ResourceKind;

    fn from_resource(resource: &Resource) -> Option<&Self>;
}

macro_rules! descriptor {
    ($ty:ident) => {
        impl Descriptor for $ty {
            const KIND: ResourceKind = ResourceKind::$ty;

            fn from_resource(resource: &Resource) -> Option<&Self> {
                match resource {
                    Resource::$ty(inner) => Some(inner),
                    _ => None,
                }
            }
        }
    };
}

descriptor!(Host);
descriptor!(Network);
descriptor!(Volume);
descriptor!(Registry);
descriptor!(Image);
descriptor!(Container);
