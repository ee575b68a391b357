// ABOUTME: SSH-specific error types.
// ABOUTME: Covers connection, authentication, host key, tunnel and remote command failures.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("connection to {host}:{port} failed: {reason}")]
    Connection {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("authentication failed for user '{0}'")]
    AuthenticationFailed(String),

    #[error("no usable credentials: {0}")]
    NoCredentials(String),

    #[error("failed to load key from {}: {reason}", path.display())]
    KeyLoadFailed { path: PathBuf, reason: String },

    #[error("socket tunnel failed: {0}")]
    Tunnel(String),

    #[error("remote command failed: {0}")]
    CommandFailed(String),

    #[error("channel closed before the command reported an exit status")]
    ChannelClosed,

    #[error("SSH protocol error: {0}")]
    Protocol(#[from] russh::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
