// ABOUTME: Builder for hosts: a name plus how to reach the host's container engine.
// ABOUTME: SSH endpoints default to port 22, $USER and /var/run/docker.sock.

use super::{Dependency, resolve_dependencies, validate_name};
use crate::plan::error::ValidationError;
use crate::plan::resource::{
    DEFAULT_DOCKER_SOCKET, DEFAULT_FILES_DIR, Endpoint, Host, Resource, ResourceKind, SshEndpoint,
};
use crate::plan::Plan;
use crate::types::Handle;
use std::path::PathBuf;

const KIND: ResourceKind = ResourceKind::Host;

#[must_use = "builders do nothing until build() is called"]
pub struct HostBuilder<'p> {
    plan: &'p Plan,
    name: String,
    address: Option<String>,
    user: Option<String>,
    port: u16,
    identity: Option<PathBuf>,
    known_hosts: Option<PathBuf>,
    trust_first_connection: bool,
    socket: Option<String>,
    local: Option<PathBuf>,
    files_dir: Option<String>,
    depends_on: Vec<Dependency>,
}

impl<'p> HostBuilder<'p> {
    pub(crate) fn new(plan: &'p Plan, name: impl Into<String>) -> Self {
        Self {
            plan,
            name: name.into(),
            address: None,
            user: None,
            port: 22,
            identity: None,
            known_hosts: None,
            trust_first_connection: false,
            socket: None,
            local: None,
            files_dir: None,
            depends_on: Vec::new(),
        }
    }

    /// Reach the engine over SSH at this hostname or IP address.
    pub fn ssh(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Private key used instead of the SSH agent.
    pub fn identity(mut self, path: impl Into<PathBuf>) -> Self {
        self.identity = Some(path.into());
        self
    }

    pub fn known_hosts(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts = Some(path.into());
        self
    }

    /// Accept and remember an unknown host key on first connection.
    pub fn trust_first_connection(mut self, trust: bool) -> Self {
        self.trust_first_connection = trust;
        self
    }

    /// Engine socket path on the remote host.
    pub fn socket(mut self, path: impl Into<String>) -> Self {
        self.socket = Some(path.into());
        self
    }

    /// Use the engine socket of this machine.
    pub fn local(self) -> Self {
        self.local_socket(DEFAULT_DOCKER_SOCKET)
    }

    pub fn local_socket(mut self, path: impl Into<PathBuf>) -> Self {
        self.local = Some(path.into());
        self
    }

    /// Directory that receives mounted files from this machine. Defaults to
    /// `/var/lib/hadron/files`. The SSH user, or this process for a local host,
    /// must be able to write it.
    pub fn files_dir(mut self, path: impl Into<String>) -> Self {
        self.files_dir = Some(path.into());
        self
    }

    pub fn depends_on(mut self, dependency: impl Into<Dependency>) -> Self {
        self.depends_on.push(dependency.into());
        self
    }

    pub fn build(self) -> Result<Handle<Host>, ValidationError> {
        let plan = self.plan;
        plan.register(|_| {
            let name = validate_name(KIND, &self.name)?;
            let endpoint = match (self.local, self.address) {
                (Some(_), Some(_)) => {
                    return Err(ValidationError::field(
                        KIND,
                        &self.name,
                        "endpoint",
                        "a host is either local or reached over ssh, not both",
                    ));
                }
                (Some(socket), None) => Endpoint::Local { socket },
                (None, Some(address)) => {
                    if address.trim().is_empty() {
                        return Err(ValidationError::field(KIND, &self.name, "address", "empty"));
                    }
                    if self.port == 0 {
                        return Err(ValidationError::field(KIND, &self.name, "port", "must be non-zero"));
                    }
                    Endpoint::Ssh(SshEndpoint {
                        address,
                        port: self.port,
                        user: self.user,
                        identity: self.identity,
                        known_hosts: self.known_hosts,
                        trust_first_connection: self.trust_first_connection,
                        socket: self.socket.unwrap_or_else(|| DEFAULT_DOCKER_SOCKET.to_string()),
                    })
                }
                (None, None) => {
                    return Err(ValidationError::MissingField {
                        kind: KIND,
                        name: self.name.clone(),
                        field: "address",
                    });
                }
            };
            let files_dir = self.files_dir.unwrap_or_else(|| DEFAULT_FILES_DIR.to_string());
            if !files_dir.starts_with('/') {
                return Err(ValidationError::field(
                    KIND,
                    &self.name,
                    "files_dir",
                    "must be an absolute path",
                ));
            }
            let dependencies = resolve_dependencies(plan, &self.depends_on)?;
            let host = Host {
                name,
                endpoint,
                files_dir,
            };
            Ok((Resource::Host(host), dependencies))
        })
    }
}
