// ABOUTME: Turns a plan Host into a live runtime adapter.
// ABOUTME: DockerConnector reaches the engine through a local socket or an SSH tunnel.

use super::bollard::BollardRuntime;
use super::error::{ConnectError, EngineSnafu, MissingUserSnafu, SshSnafu};
use super::traits::RuntimeAdapter;
use crate::plan::{Endpoint, Host, SshEndpoint};
use crate::ssh::{Session, SessionConfig};
use async_trait::async_trait;
use snafu::{OptionExt, ResultExt};
use std::sync::Arc;

/// Source of runtime adapters, one per host per plan run.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, host: &Host) -> Result<Arc<dyn RuntimeAdapter>, ConnectError>;
}

/// Connects to Docker Engine hosts with bollard.
#[derive(Debug, Clone, Copy, Default)]
pub struct DockerConnector;

impl DockerConnector {
    async fn connect_ssh(&self, host: &str, ssh: &SshEndpoint) -> Result<BollardRuntime, ConnectError> {
        let user = ssh
            .user
            .clone()
            .or_else(|| std::env::var("USER").ok())
            .context(MissingUserSnafu { host })?;

        let mut config = SessionConfig::new(ssh.address.clone(), user)
            .port(ssh.port)
            .trust_on_first_use(ssh.trust_first_connection);
        if let Some(ref key) = ssh.identity {
            config = config.key_path(key);
        }
        if let Some(ref known_hosts) = ssh.known_hosts {
            config = config.known_hosts_path(known_hosts);
        }

        let session = Session::connect(config).await.context(SshSnafu { host })?;
        BollardRuntime::connect_via_session(session, &ssh.socket).await
    }
}

#[async_trait]
impl Connector for DockerConnector {
    async fn connect(&self, host: &Host) -> Result<Arc<dyn RuntimeAdapter>, ConnectError> {
        let name = host.name();
        let runtime = match host.endpoint() {
            Endpoint::Local { socket } => {
                BollardRuntime::connect_unix(socket).context(EngineSnafu { host: name })?
            }
            Endpoint::Ssh(ssh) => self.connect_ssh(name, ssh).await?,
        };

        runtime.ping().await.context(EngineSnafu { host: name })?;
        tracing::debug!(host = %name, "container engine reachable");
        Ok(Arc::new(runtime))
    }
}
