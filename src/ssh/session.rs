// ABOUTME: SSH session establishment with russh.
// ABOUTME: Resolves credentials, verifies the host key, owns the socket tunnels and writes remote files.

use super::error::{Error, Result};
use super::tunnel::{self, Tunnel};
use parking_lot::Mutex;
use russh::client::{self, Config, Handle};
use russh::ChannelMsg;
use russh::keys::agent::client::AgentClient;
use russh::keys::known_hosts::{
    check_known_hosts, check_known_hosts_path, learn_known_hosts, learn_known_hosts_path,
};
use russh::keys::{PrivateKeyWithHashAlg, load_secret_key, ssh_key};
use russh::Disconnect;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UnixStream;

/// Parameters for one SSH connection.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    /// Private key; when absent the agent is tried, then ~/.ssh defaults.
    pub key_path: Option<PathBuf>,
    /// Accept and record host keys missing from known_hosts.
    pub trust_on_first_use: bool,
    pub known_hosts_path: Option<PathBuf>,
}

impl SessionConfig {
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: 22,
            user: user.into(),
            key_path: None,
            trust_on_first_use: false,
            known_hosts_path: None,
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn key_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.key_path = Some(path.into());
        self
    }

    pub fn trust_on_first_use(mut self, tofu: bool) -> Self {
        self.trust_on_first_use = tofu;
        self
    }

    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }
}

pub(crate) struct HostKeyVerifier {
    host: String,
    port: u16,
    trust_on_first_use: bool,
    known_hosts_path: Option<PathBuf>,
}

impl HostKeyVerifier {
    fn learn(&self, key: &ssh_key::PublicKey) {
        let learned = match &self.known_hosts_path {
            Some(path) => learn_known_hosts_path(&self.host, self.port, key, path),
            None => learn_known_hosts(&self.host, self.port, key),
        };
        if let Err(e) = learned {
            tracing::warn!(host = %self.host, error = %e, "could not record host key");
        }
    }
}

impl client::Handler for HostKeyVerifier {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        let known = match &self.known_hosts_path {
            Some(path) => check_known_hosts_path(&self.host, self.port, server_public_key, path),
            None => check_known_hosts(&self.host, self.port, server_public_key),
        };

        match known {
            Ok(true) => Ok(true),
            Err(russh::keys::Error::KeyChanged { line }) => {
                tracing::error!(
                    host = %self.host,
                    line,
                    "host key does not match known_hosts"
                );
                Ok(false)
            }
            Ok(false) | Err(_) if self.trust_on_first_use => {
                tracing::warn!(
                    host = %self.host,
                    port = self.port,
                    "trusting unknown host key on first use"
                );
                self.learn(server_public_key);
                Ok(true)
            }
            Ok(false) | Err(_) => Ok(false),
        }
    }
}

enum Credentials {
    Agent(AgentClient<UnixStream>),
    Key(Arc<ssh_key::PrivateKey>),
}

/// An authenticated SSH session. Tunnels opened through it close with it.
pub struct Session {
    config: SessionConfig,
    handle: Arc<Handle<HostKeyVerifier>>,
    tunnels: Mutex<Vec<Tunnel>>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("tunnels", &self.tunnels.lock().len())
            .finish()
    }
}

impl Session {
    pub async fn connect(config: SessionConfig) -> Result<Self> {
        let credentials = resolve_credentials(config.key_path.as_deref()).await?;

        let russh_config = Config {
            inactivity_timeout: Some(Duration::from_secs(30)),
            ..Default::default()
        };
        let verifier = HostKeyVerifier {
            host: config.host.clone(),
            port: config.port,
            trust_on_first_use: config.trust_on_first_use,
            known_hosts_path: config.known_hosts_path.clone(),
        };

        let mut handle = client::connect(
            Arc::new(russh_config),
            (config.host.as_str(), config.port),
            verifier,
        )
        .await
        .map_err(|e| Error::Connection {
            host: config.host.clone(),
            port: config.port,
            reason: e.to_string(),
        })?;

        if !authenticate(&mut handle, &config.user, credentials).await? {
            return Err(Error::AuthenticationFailed(config.user.clone()));
        }
        tracing::debug!(host = %config.host, user = %config.user, "ssh session established");

        Ok(Self {
            config,
            handle: Arc::new(handle),
            tunnels: Mutex::new(Vec::new()),
        })
    }

    pub fn host(&self) -> &str {
        &self.config.host
    }

    /// Expose a remote Unix socket as a local one; returns the local path.
    pub async fn forward_socket(&self, remote_socket: &str) -> Result<PathBuf> {
        let tunnel = tunnel::open(Arc::clone(&self.handle), remote_socket.to_string())?;
        let path = tunnel.local_path().to_path_buf();
        self.tunnels.lock().push(tunnel);
        Ok(path)
    }

    /// Write `contents` to `path` on the remote host with permission bits `mode`.
    ///
    /// Missing parent directories are created owner-only. Content is written
    /// under umask 077 and the mode is applied afterwards.
    pub async fn write_file(&self, path: &str, contents: &[u8], mode: u32) -> Result<()> {
        let quoted = shell_quote(path);
        let command = format!(
            "umask 077 && mkdir -p \"$(dirname {quoted})\" && cat > {quoted} && chmod {mode:o} {quoted}"
        );

        let mut channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| Error::CommandFailed(format!("failed to open channel: {}", e)))?;
        channel
            .exec(true, command)
            .await
            .map_err(|e| Error::CommandFailed(format!("failed to exec command: {}", e)))?;
        channel.data(contents).await?;
        channel.eof().await?;

        let mut stderr = Vec::new();
        loop {
            match channel.wait().await {
                Some(ChannelMsg::ExtendedData { data, ext: 1 }) => stderr.extend_from_slice(&data),
                Some(ChannelMsg::ExitStatus { exit_status: 0 }) => return Ok(()),
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    return Err(Error::CommandFailed(format!(
                        "writing {} exited with {}: {}",
                        path,
                        exit_status,
                        String::from_utf8_lossy(&stderr).trim()
                    )));
                }
                Some(ChannelMsg::Close) | None => return Err(Error::ChannelClosed),
                Some(_) => {}
            }
        }
    }

    pub async fn disconnect(self) -> Result<()> {
        let tunnels: Vec<_> = self.tunnels.lock().drain(..).collect();
        for tunnel in tunnels {
            tunnel.close().await;
        }
        self.handle
            .disconnect(Disconnect::ByApplication, "", "en")
            .await?;
        Ok(())
    }
}

/// Single-quote a value for a POSIX shell.
pub(crate) fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

async fn resolve_credentials(key_path: Option<&Path>) -> Result<Credentials> {
    if let Some(path) = key_path {
        let key = load_secret_key(path, None).map_err(|e| Error::KeyLoadFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        return Ok(Credentials::Key(Arc::new(key)));
    }

    if let Ok(agent) = AgentClient::connect_env().await {
        return Ok(Credentials::Agent(agent));
    }

    let home = std::env::var("HOME")
        .map_err(|_| Error::NoCredentials("no SSH agent and HOME is not set".to_string()))?;
    for name in ["id_ed25519", "id_ecdsa", "id_rsa"] {
        let path = Path::new(&home).join(".ssh").join(name);
        if let Ok(key) = load_secret_key(&path, None) {
            return Ok(Credentials::Key(Arc::new(key)));
        }
    }

    Err(Error::NoCredentials(
        "no SSH agent and no default keys found".to_string(),
    ))
}

async fn authenticate(
    handle: &mut Handle<HostKeyVerifier>,
    user: &str,
    credentials: Credentials,
) -> Result<bool> {
    match credentials {
        Credentials::Agent(mut agent) => {
            let identities = agent
                .request_identities()
                .await
                .map_err(|e| Error::NoCredentials(format!("agent: {}", e)))?;
            for identity in identities {
                if let Ok(result) = handle
                    .authenticate_publickey_with(user, identity, None, &mut agent)
                    .await
                    && result.success()
                {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        Credentials::Key(key) => {
            let hash_alg = handle.best_supported_rsa_hash().await?.flatten();
            let result = handle
                .authenticate_publickey(user, PrivateKeyWithHashAlg::new(key, hash_alg))
                .await?;
            Ok(result.success())
        }
    }
}
