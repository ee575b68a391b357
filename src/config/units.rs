// ABOUTME: Parsers for container port publications and memory sizes.
// ABOUTME: Accepts "80", "8080:80", "127.0.0.1:53:53/udp" and "512m", "1g", "1024".

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[default]
    Tcp,
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => f.write_str("tcp"),
            Protocol::Udp => f.write_str("udp"),
        }
    }
}

/// A published container port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortMapping {
    pub host_ip: Option<String>,
    pub host_port: Option<u16>,
    pub container_port: u16,
    pub protocol: Protocol,
}

impl PortMapping {
    pub fn parse(spec: &str) -> Result<Self, String> {
        let spec = spec.trim();
        let (ports, protocol) = match spec.split_once('/') {
            Some((ports, "tcp")) => (ports, Protocol::Tcp),
            Some((ports, "udp")) => (ports, Protocol::Udp),
            Some((_, other)) => return Err(format!("unsupported protocol '{}'", other)),
            None => (spec, Protocol::Tcp),
        };

        let port = |s: &str| {
            s.parse::<u16>()
                .ok()
                .filter(|p| *p != 0)
                .ok_or_else(|| format!("invalid port '{}' in '{}'", s, spec))
        };

        let parts: Vec<&str> = ports.split(':').collect();
        match parts.as_slice() {
            [container] => Ok(Self {
                host_ip: None,
                host_port: None,
                container_port: port(container)?,
                protocol,
            }),
            [host, container] => Ok(Self {
                host_ip: None,
                host_port: Some(port(host)?),
                container_port: port(container)?,
                protocol,
            }),
            [ip, host, container] if !ip.is_empty() => Ok(Self {
                host_ip: Some((*ip).to_string()),
                host_port: Some(port(host)?),
                container_port: port(container)?,
                protocol,
            }),
            _ => Err(format!("invalid port mapping '{}'", spec)),
        }
    }
}

impl fmt::Display for PortMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref ip) = self.host_ip {
            write!(f, "{}:", ip)?;
        }
        if let Some(host) = self.host_port {
            write!(f, "{}:", host)?;
        }
        write!(f, "{}/{}", self.container_port, self.protocol)
    }
}

/// Parse a memory size like "512m" or "1g" into bytes.
pub fn parse_memory(spec: &str) -> Result<u64, String> {
    let lower = spec.trim().to_ascii_lowercase();
    let lower = lower.strip_suffix('b').unwrap_or(&lower);
    let (digits, multiplier) = match lower.char_indices().last() {
        Some((i, 'k')) => (&lower[..i], 1024),
        Some((i, 'm')) => (&lower[..i], 1024 * 1024),
        Some((i, 'g')) => (&lower[..i], 1024 * 1024 * 1024),
        _ => (lower, 1),
    };

    digits
        .parse::<u64>()
        .ok()
        .filter(|n| *n > 0)
        .and_then(|n| n.checked_mul(multiplier))
        .ok_or_else(|| format!("invalid memory size '{}'", spec))
}

/// Parse a fractional CPU count like "0.25".
pub fn parse_cpus(spec: &str) -> Result<f64, String> {
    spec.trim()
        .parse::<f64>()
        .ok()
        .filter(|c| c.is_finite() && *c > 0.0)
        .ok_or_else(|| format!("invalid cpu count '{}'", spec))
}
