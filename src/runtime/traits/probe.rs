// ABOUTME: Readiness probes executed against a running container.
// ABOUTME: Each call is a single attempt; retrying is the health checker's job.

use async_trait::async_trait;

/// Single-shot readiness probes. `Ok(false)` means the probe ran and the
/// service was not ready; `Err` means the probe itself could not run.
#[async_trait]
pub trait ProbeOps: Send + Sync {
    async fn probe_http(&self, container: &str, path: &str, port: u16) -> Result<bool, ProbeError>;

    async fn probe_tcp(&self, container: &str, port: u16) -> Result<bool, ProbeError>;

    async fn probe_udp(&self, container: &str, port: u16) -> Result<bool, ProbeError>;
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ProbeError {
    #[error("container not found: {0}")]
    ContainerNotFound(String),

    #[error("container not running: {0}")]
    NotRunning(String),

    #[error("runtime error: {0}")]
    Runtime(String),
}
