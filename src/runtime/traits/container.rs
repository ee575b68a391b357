// ABOUTME: Container lifecycle operations trait.
// ABOUTME: Existence check, create-and-start, and forced removal by name.

use super::specs::ContainerSpec;
use async_trait::async_trait;

/// Container lifecycle operations.
#[async_trait]
pub trait ContainerOps: Send + Sync {
    /// Check if a container with this name exists, running or not.
    async fn container_exists(&self, name: &str) -> Result<bool, ContainerError>;

    /// Create a container, attach it to its networks and start it.
    async fn create_and_start_container(&self, spec: &ContainerSpec) -> Result<(), ContainerError>;

    /// Stop and remove a container. Returns `NotFound` when it is already gone.
    async fn remove_container(&self, name: &str) -> Result<(), ContainerError>;
}

/// Errors from container operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ContainerError {
    #[error("container not found: {0}")]
    NotFound(String),

    #[error("container already exists: {0}")]
    AlreadyExists(String),

    #[error("image not found: {0}")]
    ImageNotFound(String),

    #[error("failed to start container: {0}")]
    StartFailed(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
