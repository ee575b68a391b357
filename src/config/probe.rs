// ABOUTME: Readiness probe declaration for containers (HTTP, TCP or UDP).
// ABOUTME: Carries the cumulative timeout, poll interval and consecutive-failure budget.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// What a readiness probe targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProbeTarget {
    Http { path: String, port: u16 },
    Tcp { port: u16 },
    Udp { port: u16 },
}

impl fmt::Display for ProbeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeTarget::Http { path, port } => write!(f, "http :{}{}", port, path),
            ProbeTarget::Tcp { port } => write!(f, "tcp :{}", port),
            ProbeTarget::Udp { port } => write!(f, "udp :{}", port),
        }
    }
}

/// A container readiness probe.
///
/// `timeout` bounds the whole probing phase, not a single attempt.
/// `retries` is the number of consecutive failed attempts that mark the
/// container unhealthy; `None` leaves the decision to `timeout` alone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthProbe {
    #[serde(flatten)]
    pub target: ProbeTarget,

    #[serde(default = "default_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,

    #[serde(default)]
    pub retries: Option<u32>,
}

fn default_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_interval() -> Duration {
    Duration::from_secs(5)
}

impl HealthProbe {
    fn with_target(target: ProbeTarget) -> Self {
        Self {
            target,
            timeout: default_timeout(),
            interval: default_interval(),
            retries: None,
        }
    }

    /// Probe an HTTP endpoint inside the container; any 2xx/3xx response passes.
    pub fn http(path: impl Into<String>, port: u16) -> Self {
        let path = path.into();
        let path = if path.starts_with('/') {
            path
        } else {
            format!("/{}", path)
        };
        Self::with_target(ProbeTarget::Http { path, port })
    }

    pub fn tcp(port: u16) -> Self {
        Self::with_target(ProbeTarget::Tcp { port })
    }

    pub fn udp(port: u16) -> Self {
        Self::with_target(ProbeTarget::Udp { port })
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    /// Reject budgets that could never produce a verdict.
    pub fn validate(&self) -> Result<(), String> {
        if self.timeout.is_zero() {
            return Err("probe timeout must be greater than zero".to_string());
        }
        if self.interval.is_zero() {
            return Err("probe interval must be greater than zero".to_string());
        }
        if self.retries == Some(0) {
            return Err("probe retries must be at least 1".to_string());
        }
        let port = match &self.target {
            ProbeTarget::Http { port, .. } | ProbeTarget::Tcp { port } | ProbeTarget::Udp { port } => {
                *port
            }
        };
        if port == 0 {
            return Err("probe port must be non-zero".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_probe_normalizes_path() {
        let probe = HealthProbe::http("health", 8080);
        assert_eq!(
            probe.target,
            ProbeTarget::Http {
                path: "/health".to_string(),
                port: 8080
            }
        );
    }

    #[test]
    fn defaults_leave_retries_unbounded() {
        let probe = HealthProbe::tcp(5432);
        assert_eq!(probe.timeout, Duration::from_secs(60));
        assert_eq!(probe.interval, Duration::from_secs(5));
        assert_eq!(probe.retries, None);
    }

    #[test]
    fn zero_budgets_are_rejected() {
        assert!(HealthProbe::udp(53).with_retries(0).validate().is_err());
        assert!(HealthProbe::udp(53).with_interval(Duration::ZERO).validate().is_err());
        assert!(HealthProbe::udp(0).validate().is_err());
        assert!(HealthProbe::udp(53).with_retries(3).validate().is_ok());
    }

    #[test]
    fn deserializes_with_humantime_durations() {
        let probe: HealthProbe =
            serde_yaml::from_str("kind: http\npath: /health\nport: 8080\ntimeout: 30s\ninterval: 2s\n")
                .unwrap();
        assert_eq!(probe.timeout, Duration::from_secs(30));
        assert_eq!(probe.interval, Duration::from_secs(2));
        assert!(matches!(probe.target, ProbeTarget::Http { port: 8080, .. }));
    }
}
