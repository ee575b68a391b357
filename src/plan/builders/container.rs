// ABOUTME: Builder for containers, the richest resource kind.
// ABOUTME: Attachments record graph edges immediately; string settings are validated at build().

use super::{Dependency, resolve_dependencies, validate_name};
use crate::config::{HealthProbe, PortMapping, RestartPolicy, parse_cpus, parse_env_file, parse_memory};
use crate::plan::error::ValidationError;
use crate::plan::graph::Graph;
use crate::plan::resource::{
    Container, FileAccess, Host, Image, Mount, MountSource, Network, NetworkAttachment,
    Resource, ResourceKind, ResourceLimits, Volume,
};
use crate::plan::Plan;
use crate::types::{Handle, NodeIndex};
use std::collections::BTreeMap;
use std::path::PathBuf;

const KIND: ResourceKind = ResourceKind::Container;

/// Label carrying the owning plan's name.
pub const PLAN_LABEL: &str = "hadron.plan";
/// Label marking containers created by hadron.
pub const MANAGED_LABEL: &str = "hadron.managed";

#[must_use = "builders do nothing until build() is called"]
pub struct ContainerBuilder<'p> {
    plan: &'p Plan,
    name: String,
    host: Handle<Host>,
    image: Handle<Image>,
    networks: Vec<NetworkAttachment>,
    mounts: Vec<Mount>,
    env: BTreeMap<String, String>,
    env_files: Vec<PathBuf>,
    labels: BTreeMap<String, String>,
    ports: Vec<String>,
    memory: Option<String>,
    memory_reservation: Option<String>,
    cpus: Option<String>,
    cpu_shares: Option<u64>,
    pids_limit: Option<i64>,
    probe: Option<HealthProbe>,
    restart: RestartPolicy,
    read_only: bool,
    cap_add: Vec<String>,
    cap_drop: Vec<String>,
    security_opt: Vec<String>,
    command: Option<Vec<String>>,
    depends_on: Vec<Dependency>,
}

impl<'p> ContainerBuilder<'p> {
    pub(crate) fn new(
        plan: &'p Plan,
        name: impl Into<String>,
        host: Handle<Host>,
        image: Handle<Image>,
    ) -> Self {
        Self {
            plan,
            name: name.into(),
            host,
            image,
            networks: Vec::new(),
            mounts: Vec::new(),
            env: BTreeMap::new(),
            env_files: Vec::new(),
            labels: BTreeMap::new(),
            ports: Vec::new(),
            memory: None,
            memory_reservation: None,
            cpus: None,
            cpu_shares: None,
            pids_limit: None,
            probe: None,
            restart: RestartPolicy::default(),
            read_only: false,
            cap_add: Vec::new(),
            cap_drop: Vec::new(),
            security_opt: Vec::new(),
            command: None,
            depends_on: Vec::new(),
        }
    }

    /// Attach to a network on the same host. The first network is the primary one.
    pub fn network(self, network: Handle<Network>) -> Self {
        self.network_with_aliases(network, Vec::<String>::new())
    }

    pub fn network_with_aliases<I, S>(mut self, network: Handle<Network>, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.networks.push(NetworkAttachment {
            network,
            aliases: aliases.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Mount a volume from the same host at `target`.
    pub fn volume(mut self, volume: Handle<Volume>, target: impl Into<String>) -> Self {
        self.mounts.push(Mount {
            source: MountSource::Volume(volume),
            target: target.into(),
            read_only: false,
        });
        self
    }

    pub fn volume_read_only(mut self, volume: Handle<Volume>, target: impl Into<String>) -> Self {
        self.mounts.push(Mount {
            source: MountSource::Volume(volume),
            target: target.into(),
            read_only: true,
        });
        self
    }

    /// Bind an absolute path of the target host.
    pub fn bind(mut self, source: impl Into<PathBuf>, target: impl Into<String>, read_only: bool) -> Self {
        self.mounts.push(Mount {
            source: MountSource::Bind(source.into()),
            target: target.into(),
            read_only,
        });
        self
    }

    /// Copy a file from this machine to the host and mount it read-only at
    /// `target`. Relative paths resolve against the current directory.
    pub fn file(self, local: impl Into<PathBuf>, target: impl Into<String>) -> Self {
        self.file_with_access(local, target, FileAccess::Public)
    }

    /// Like [`file`](Self::file), but only the owner can read the host copy.
    pub fn secret_file(self, local: impl Into<PathBuf>, target: impl Into<String>) -> Self {
        self.file_with_access(local, target, FileAccess::Secret)
    }

    pub fn file_with_access(
        mut self,
        local: impl Into<PathBuf>,
        target: impl Into<String>,
        access: FileAccess,
    ) -> Self {
        self.mounts.push(Mount {
            source: MountSource::File {
                local: local.into(),
                access,
            },
            target: target.into(),
            read_only: true,
        });
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Read KEY=VALUE lines from a local file; explicit `env` entries win.
    pub fn env_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.env_files.push(path.into());
        self
    }

    pub fn label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Publish a port: "80", "8080:80", "127.0.0.1:53:53/udp".
    pub fn port(mut self, mapping: impl Into<String>) -> Self {
        self.ports.push(mapping.into());
        self
    }

    /// Memory limit such as "512m" or "1g".
    pub fn memory(mut self, limit: impl Into<String>) -> Self {
        self.memory = Some(limit.into());
        self
    }

    pub fn memory_reservation(mut self, reservation: impl Into<String>) -> Self {
        self.memory_reservation = Some(reservation.into());
        self
    }

    /// Fractional CPU limit such as "0.5".
    pub fn cpus(mut self, cpus: impl Into<String>) -> Self {
        self.cpus = Some(cpus.into());
        self
    }

    pub fn cpu_shares(mut self, shares: u64) -> Self {
        self.cpu_shares = Some(shares);
        self
    }

    pub fn pids_limit(mut self, limit: i64) -> Self {
        self.pids_limit = Some(limit);
        self
    }

    pub fn probe(mut self, probe: HealthProbe) -> Self {
        self.probe = Some(probe);
        self
    }

    pub fn restart(mut self, policy: RestartPolicy) -> Self {
        self.restart = policy;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn cap_add(mut self, capability: impl Into<String>) -> Self {
        self.cap_add.push(capability.into());
        self
    }

    pub fn cap_drop(mut self, capability: impl Into<String>) -> Self {
        self.cap_drop.push(capability.into());
        self
    }

    pub fn security_opt(mut self, option: impl Into<String>) -> Self {
        self.security_opt.push(option.into());
        self
    }

    pub fn command<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command = Some(args.into_iter().map(Into::into).collect());
        self
    }

    pub fn depends_on(mut self, dependency: impl Into<Dependency>) -> Self {
        self.depends_on.push(dependency.into());
        self
    }

    pub fn build(self) -> Result<Handle<Container>, ValidationError> {
        let plan = self.plan;
        plan.register(|graph| self.assemble(graph))
    }

    fn invalid(&self, field: &'static str, reason: impl Into<String>) -> ValidationError {
        ValidationError::field(KIND, &self.name, field, reason)
    }

    fn same_host(
        &self,
        graph: &Graph,
        kind: ResourceKind,
        node: NodeIndex,
        host: Handle<Host>,
    ) -> Result<(), ValidationError> {
        let resource = graph.resource(node);
        if resource.host() == Some(host) {
            return Ok(());
        }
        let host_name = |h: Option<Handle<Host>>| {
            h.map(|h| graph.resource(h.node()).name())
                .unwrap_or_default()
        };
        Err(ValidationError::CrossHost {
            container: self.name.clone(),
            container_host: host_name(Some(host)),
            kind,
            resource: resource.name(),
            resource_host: host_name(resource.host()),
        })
    }

    fn limits(&self) -> Result<ResourceLimits, ValidationError> {
        let memory = |value: &Option<String>, field| {
            value
                .as_deref()
                .map(parse_memory)
                .transpose()
                .map_err(|reason| self.invalid(field, reason))
        };
        let limits = ResourceLimits {
            memory: memory(&self.memory, "memory")?,
            memory_reservation: memory(&self.memory_reservation, "memory_reservation")?,
            cpu_shares: self.cpu_shares,
            cpus: self
                .cpus
                .as_deref()
                .map(parse_cpus)
                .transpose()
                .map_err(|reason| self.invalid("cpus", reason))?,
            pids_limit: self.pids_limit,
        };
        if let (Some(limit), Some(reservation)) = (limits.memory, limits.memory_reservation)
            && reservation > limit
        {
            return Err(self.invalid("memory_reservation", "exceeds the memory limit"));
        }
        if limits.pids_limit.is_some_and(|p| p == 0 || p < -1) {
            return Err(self.invalid("pids_limit", "must be positive or -1"));
        }
        Ok(limits)
    }

    fn environment(&self) -> Result<BTreeMap<String, String>, ValidationError> {
        let mut env = BTreeMap::new();
        for path in &self.env_files {
            let content = std::fs::read_to_string(path)
                .map_err(|e| self.invalid("env_file", format!("{}: {}", path.display(), e)))?;
            let parsed = parse_env_file(&content)
                .map_err(|e| self.invalid("env_file", format!("{}: {}", path.display(), e)))?;
            env.extend(parsed);
        }
        env.extend(self.env.clone());
        if let Some(key) = env.keys().find(|k| k.is_empty() || k.contains('=')) {
            return Err(self.invalid("env", format!("invalid variable name '{}'", key)));
        }
        Ok(env)
    }

    fn assemble(self, graph: &Graph) -> Result<(Resource, Vec<NodeIndex>), ValidationError> {
        let plan = self.plan;
        let name = validate_name(KIND, &self.name)?;

        let host = plan.check(self.host)?;
        let image = plan.check(self.image)?;
        let mut dependencies = vec![host, image];

        let mut seen_networks = Vec::new();
        for attachment in &self.networks {
            let node = plan.check(attachment.network)?;
            self.same_host(graph, ResourceKind::Network, node, self.host)?;
            if seen_networks.contains(&node) {
                return Err(self.invalid("networks", "network attached twice"));
            }
            if attachment.aliases.iter().any(|a| a.trim().is_empty()) {
                return Err(self.invalid("networks", "empty network alias"));
            }
            seen_networks.push(node);
            dependencies.push(node);
        }

        for mount in &self.mounts {
            if !mount.target.starts_with('/') {
                return Err(self.invalid(
                    "mounts",
                    format!("target '{}' must be an absolute path", mount.target),
                ));
            }
            match &mount.source {
                MountSource::Volume(volume) => {
                    let node = plan.check(*volume)?;
                    self.same_host(graph, ResourceKind::Volume, node, self.host)?;
                    dependencies.push(node);
                }
                MountSource::Bind(path) if !path.is_absolute() => {
                    return Err(self.invalid(
                        "mounts",
                        format!("bind source '{}' must be an absolute path", path.display()),
                    ));
                }
                MountSource::Bind(_) => {}
                MountSource::File { local, .. } if !local.is_file() => {
                    return Err(self.invalid(
                        "mounts",
                        format!("file '{}' does not exist or is not a regular file", local.display()),
                    ));
                }
                MountSource::File { .. } => {}
            }
        }

        let image_domain = match graph.resource(image) {
            Resource::Image(i) => Some(i.domain().to_string()),
            _ => None,
        };
        if let Some(domain) = image_domain {
            dependencies.extend(graph.find(ResourceKind::Registry, None, &domain));
        }
        dependencies.extend(resolve_dependencies(plan, &self.depends_on)?);

        let ports = self
            .ports
            .iter()
            .map(|p| PortMapping::parse(p))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|reason| self.invalid("ports", reason))?;

        if let Some(ref probe) = self.probe {
            probe.validate().map_err(|reason| self.invalid("probe", reason))?;
        }
        if self.command.as_ref().is_some_and(|c| c.is_empty()) {
            return Err(self.invalid("command", "empty command"));
        }

        let limits = self.limits()?;
        let env = self.environment()?;

        let mut labels = self.labels;
        labels.insert(PLAN_LABEL.to_string(), plan.name().to_string());
        labels.insert(MANAGED_LABEL.to_string(), "true".to_string());

        let container = Container {
            name,
            host: self.host,
            image: self.image,
            networks: self.networks,
            mounts: self.mounts,
            env,
            labels,
            ports,
            limits,
            probe: self.probe,
            restart: self.restart,
            read_only: self.read_only,
            cap_add: self.cap_add,
            cap_drop: self.cap_drop,
            security_opt: self.security_opt,
            command: self.command,
        };
        Ok((Resource::Container(container), dependencies))
    }
}
