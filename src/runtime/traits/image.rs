// ABOUTME: Image operations trait for container runtimes.
// ABOUTME: Check for a local image and pull with optional registry authentication.

use super::specs::RegistryAuth;
use crate::types::ImageRef;
use async_trait::async_trait;

/// Image operations: check and pull.
#[async_trait]
pub trait ImageOps: Send + Sync {
    /// Check if an image exists locally on the host.
    async fn image_exists(&self, reference: &ImageRef) -> Result<bool, ImageError>;

    /// Pull an image from a registry.
    async fn pull_image(
        &self,
        reference: &ImageRef,
        auth: Option<&RegistryAuth>,
    ) -> Result<(), ImageError>;
}

/// Errors from image operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ImageError {
    #[error("image not found: {0}")]
    NotFound(String),

    #[error("authentication failed for registry: {0}")]
    AuthenticationFailed(String),

    #[error("pull failed: {0}")]
    PullFailed(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
