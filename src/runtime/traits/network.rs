// ABOUTME: Network operations trait for container runtimes.
// ABOUTME: Existence check, create and remove by name.

use super::specs::NetworkSpec;
use async_trait::async_trait;

/// Network operations: check, create, remove.
#[async_trait]
pub trait NetworkOps: Send + Sync {
    /// Check if a network exists.
    async fn network_exists(&self, name: &str) -> Result<bool, NetworkError>;

    /// Create a network.
    async fn create_network(&self, spec: &NetworkSpec) -> Result<(), NetworkError>;

    /// Remove a network. Returns `NotFound` when it is already gone.
    async fn remove_network(&self, name: &str) -> Result<(), NetworkError>;
}

/// Errors from network operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum NetworkError {
    #[error("network not found: {0}")]
    NotFound(String),

    #[error("network already exists: {0}")]
    AlreadyExists(String),

    #[error("network in use, cannot remove: {0}")]
    InUse(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
