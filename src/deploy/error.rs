// ABOUTME: Error types for per-resource execution failures.
// ABOUTME: Each failure is confined to its resource and the resources downstream of it.

use crate::plan::ResourceKind;
use crate::runtime::{ConnectError, ContainerError, FileError, ImageError, NetworkError, VolumeError};
use crate::secrets::CredentialError;
use serde::Serialize;

/// A resource operation that failed during Execute, DryRun or Destroy.
#[derive(Debug, thiserror::Error)]
pub enum DeployError {
    #[error("failed to connect to host '{host}': {source}")]
    Connect {
        host: String,
        #[source]
        source: ConnectError,
    },

    #[error("existence check for network '{name}' failed: {source}")]
    NetworkCheck {
        name: String,
        #[source]
        source: NetworkError,
    },

    #[error("failed to create network '{name}': {source}")]
    NetworkCreate {
        name: String,
        #[source]
        source: NetworkError,
    },

    #[error("existence check for volume '{name}' failed: {source}")]
    VolumeCheck {
        name: String,
        #[source]
        source: VolumeError,
    },

    #[error("failed to create volume '{name}': {source}")]
    VolumeCreate {
        name: String,
        #[source]
        source: VolumeError,
    },

    #[error("existence check for container '{name}' failed: {source}")]
    ContainerCheck {
        name: String,
        #[source]
        source: ContainerError,
    },

    #[error("failed to create container '{name}': {source}")]
    ContainerCreate {
        name: String,
        #[source]
        source: ContainerError,
    },

    #[error("failed to place file for container '{container}': {source}")]
    FileUpload {
        container: String,
        #[source]
        source: FileError,
    },

    #[error("failed to pull image '{image}': {source}")]
    ImagePull {
        image: String,
        #[source]
        source: ImageError,
    },

    #[error("credentials for registry '{registry}' unavailable: {source}")]
    Credential {
        registry: String,
        #[source]
        source: CredentialError,
    },

    #[error("failed to remove {kind} '{name}': {reason}")]
    Remove {
        kind: ResourceKind,
        name: String,
        reason: String,
    },
}

/// Error category for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DeployErrorKind {
    /// Host connection failed.
    Connect,
    /// Network, volume or container existence query failed.
    ExistenceCheck,
    /// Creation failed after a confirmed absence.
    Create,
    /// Image presence check or pull failed.
    ImagePull,
    /// Registry credentials could not be resolved.
    Credential,
    /// Removal failed for a reason other than absence.
    Remove,
}

impl DeployError {
    pub fn kind(&self) -> DeployErrorKind {
        match self {
            DeployError::Connect { .. } => DeployErrorKind::Connect,
            DeployError::NetworkCheck { .. }
            | DeployError::VolumeCheck { .. }
            | DeployError::ContainerCheck { .. } => DeployErrorKind::ExistenceCheck,
            DeployError::NetworkCreate { .. }
            | DeployError::VolumeCreate { .. }
            | DeployError::ContainerCreate { .. }
            | DeployError::FileUpload { .. } => DeployErrorKind::Create,
            DeployError::ImagePull { .. } => DeployErrorKind::ImagePull,
            DeployError::Credential { .. } => DeployErrorKind::Credential,
            DeployError::Remove { .. } => DeployErrorKind::Remove,
        }
    }

    pub(crate) fn removal(kind: ResourceKind, name: &str, reason: impl ToString) -> Self {
        DeployError::Remove {
            kind,
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }
}
