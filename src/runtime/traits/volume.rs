// ABOUTME: Volume operations trait for container runtimes.
// ABOUTME: Existence check, create and remove named volumes.

use super::specs::VolumeSpec;
use async_trait::async_trait;

#[async_trait]
pub trait VolumeOps: Send + Sync {
    async fn volume_exists(&self, name: &str) -> Result<bool, VolumeError>;

    async fn create_volume(&self, spec: &VolumeSpec) -> Result<(), VolumeError>;

    /// Remove a volume. Returns `NotFound` when it is already gone.
    async fn remove_volume(&self, name: &str) -> Result<(), VolumeError>;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum VolumeError {
    #[error("volume not found: {0}")]
    NotFound(String),

    #[error("volume already exists: {0}")]
    AlreadyExists(String),

    #[error("volume in use, cannot remove: {0}")]
    InUse(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
