// ABOUTME: Connection error types with SNAFU pattern.
// ABOUTME: Covers SSH transport, engine handshake and endpoint configuration failures.

use snafu::Snafu;

/// Failure to obtain a runtime adapter for a host.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConnectError {
    #[snafu(display("ssh connection to {host} failed: {source}"))]
    Ssh { host: String, source: crate::ssh::Error },

    #[snafu(display("container engine on {host} is unreachable: {source}"))]
    Engine {
        host: String,
        source: bollard::errors::Error,
    },

    #[snafu(display("no ssh user for {host}: set one on the host or export USER"))]
    MissingUser { host: String },

    #[snafu(display("host {host} is unavailable: {message}"))]
    Unavailable { host: String, message: String },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectErrorKind {
    /// SSH transport or authentication failed.
    Ssh,
    /// The engine socket could not be opened or did not answer a ping.
    Engine,
    /// The host's endpoint is incomplete.
    Configuration,
    /// The connector refused the host for another reason.
    Unavailable,
}

impl ConnectError {
    pub fn kind(&self) -> ConnectErrorKind {
        match self {
            ConnectError::Ssh { .. } => ConnectErrorKind::Ssh,
            ConnectError::Engine { .. } => ConnectErrorKind::Engine,
            ConnectError::MissingUser { .. } => ConnectErrorKind::Configuration,
            ConnectError::Unavailable { .. } => ConnectErrorKind::Unavailable,
        }
    }

    pub fn host(&self) -> &str {
        match self {
            ConnectError::Ssh { host, .. }
            | ConnectError::Engine { host, .. }
            | ConnectError::MissingUser { host }
            | ConnectError::Unavailable { host, .. } => host,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_and_host() {
        let err = ConnectError::MissingUser {
            host: "web-1".to_string(),
        };
        assert_eq!(err.kind(), ConnectErrorKind::Configuration);
        assert_eq!(err.host(), "web-1");
        assert!(err.to_string().contains("export USER"));
    }
}
