// ABOUTME: SSH transport used to reach container engines on remote hosts.
// ABOUTME: Agent or key authentication, known_hosts verification, socket tunnels and file writes.

mod error;
mod session;
mod tunnel;

pub use error::{Error, Result};
pub(crate) use session::shell_quote;
pub use session::{Session, SessionConfig};
pub use tunnel::Tunnel;
