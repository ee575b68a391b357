// ABOUTME: Fully materialized specs handed to runtime adapters.
// ABOUTME: Container, network, volume, mount and file specs plus registry credentials.

use crate::config::{PortMapping, RestartPolicy};
use crate::plan::ResourceLimits;
use crate::types::ImageRef;
use std::collections::BTreeMap;
use std::fmt;

/// Configuration for creating a network.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkSpec {
    pub name: String,
    /// Network driver (bridge, overlay, ...).
    pub driver: String,
    pub labels: BTreeMap<String, String>,
}

/// Configuration for creating a volume.
#[derive(Debug, Clone, PartialEq)]
pub struct VolumeSpec {
    pub name: String,
    pub driver: Option<String>,
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountKind {
    /// Named volume.
    Volume,
    /// Host path.
    Bind,
}

/// A mount with its source resolved to a volume name or host path.
#[derive(Debug, Clone, PartialEq)]
pub struct MountSpec {
    pub kind: MountKind,
    pub source: String,
    pub target: String,
    pub read_only: bool,
}

/// A network attachment resolved to the network's name.
#[derive(Debug, Clone, PartialEq)]
pub struct AttachmentSpec {
    pub network: String,
    pub aliases: Vec<String>,
}

/// Configuration for creating a container, with every plan reference resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct ContainerSpec {
    pub name: String,
    pub image: ImageRef,
    pub env: BTreeMap<String, String>,
    pub labels: BTreeMap<String, String>,
    pub ports: Vec<PortMapping>,
    pub mounts: Vec<MountSpec>,
    /// The first attachment is used as the container's primary network.
    pub networks: Vec<AttachmentSpec>,
    pub command: Option<Vec<String>>,
    pub restart_policy: RestartPolicy,
    pub limits: ResourceLimits,
    pub read_only: bool,
    pub cap_add: Vec<String>,
    pub cap_drop: Vec<String>,
    pub security_opt: Vec<String>,
}

/// A file to place on the host, with its permission bits.
#[derive(Clone, PartialEq, Eq)]
pub struct FileSpec {
    /// Absolute path on the host.
    pub path: String,
    pub contents: Vec<u8>,
    pub mode: u32,
}

impl fmt::Debug for FileSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileSpec")
            .field("path", &self.path)
            .field("bytes", &self.contents.len())
            .field("mode", &format_args!("{:o}", self.mode))
            .finish()
    }
}

/// Registry authentication credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct RegistryAuth {
    pub server: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for RegistryAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryAuth")
            .field("server", &self.server)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}
