// ABOUTME: File operations trait for container hosts.
// ABOUTME: Places files from this machine on the host so containers can bind-mount them.

use super::specs::FileSpec;
use async_trait::async_trait;

#[async_trait]
pub trait FileOps: Send + Sync {
    /// Write `file` on the host, creating missing parent directories and
    /// replacing any previous content. The mode applies to existing files too.
    async fn upload_file(&self, file: &FileSpec) -> Result<(), FileError>;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum FileError {
    #[error("cannot read local file {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("failed to write {path}: {reason}")]
    Write { path: String, reason: String },
}
