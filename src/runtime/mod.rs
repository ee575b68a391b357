// ABOUTME: Runtime adapter layer: capability traits, the bollard engine client
// ABOUTME: and the connector that turns plan hosts into adapters.

pub mod bollard;
mod connect;
pub(crate) mod error;
pub mod traits;

pub use self::bollard::BollardRuntime;
pub use connect::{Connector, DockerConnector};
pub use error::{ConnectError, ConnectErrorKind};
pub use traits::*;
